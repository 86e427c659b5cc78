//! Small filesystem helpers shared by the checkpoint store and emitters

use std::fs::File;
use std::io;
use std::path::Path;

/// Write `target` through a temp file in the same directory, then rename.
///
/// Readers never observe a half-written file; a failed write leaves the
/// previous content untouched.
pub fn write_atomically<F>(target: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Sibling path `<dir>/<prefix><file name><suffix>`
pub fn sibling_path(path: &Path, prefix: &str, suffix: &str) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{prefix}{name}{suffix}"))
}
