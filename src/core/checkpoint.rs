//! Durable record of completed translations, keyed to the input book

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::utils::{sibling_path, write_atomically};

const FORMAT_VERSION: u32 = 1;

/// On-disk checkpoint body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Layout version of this file
    pub version: u32,
    /// File name of the book this checkpoint belongs to
    pub source: String,
    /// When the checkpoint was last written
    pub updated_at: DateTime<Utc>,
    /// Translated text per segment, in segment order
    pub translations: Vec<String>,
}

/// Loads and saves the checkpoint that sits next to an input book
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    source: String,
}

impl CheckpointStore {
    /// Store for `book`: `<dir>/.<file name>.checkpoint.json`
    pub fn for_book(book: &Path) -> Self {
        Self {
            path: sibling_path(book, ".", ".checkpoint.json"),
            source: book
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Location of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a checkpoint has been written for this book
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the saved translations.
    ///
    /// A missing, unreadable or corrupt file is `CheckpointUnavailable`.
    pub fn load(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.unavailable(e))?;
        let file: CheckpointFile = serde_json::from_str(&content).map_err(|e| self.unavailable(e))?;

        if file.version != FORMAT_VERSION {
            return Err(self.unavailable(format!(
                "unsupported checkpoint version {}",
                file.version
            )));
        }

        if file.source != self.source {
            return Err(self.unavailable(format!(
                "checkpoint belongs to '{}', not '{}'",
                file.source, self.source
            )));
        }

        info!(
            "Loaded checkpoint {} with {} translations (saved {})",
            self.path.display(),
            file.translations.len(),
            file.updated_at.to_rfc3339()
        );

        Ok(file.translations)
    }

    /// Overwrite the checkpoint with `translations`
    pub fn save(&self, translations: &[String]) -> Result<()> {
        let file = CheckpointFile {
            version: FORMAT_VERSION,
            source: self.source.clone(),
            updated_at: Utc::now(),
            translations: translations.to_vec(),
        };

        let body = serde_json::to_vec_pretty(&file)?;
        write_atomically(&self.path, |f| f.write_all(&body)).map_err(|e| {
            TranslationError::CheckpointWrite {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        debug!(
            "Saved {} translations to {}",
            translations.len(),
            self.path.display()
        );
        Ok(())
    }

    pub(crate) fn unavailable(&self, err: impl std::fmt::Display) -> TranslationError {
        TranslationError::CheckpointUnavailable {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_hidden_sibling() {
        let store = CheckpointStore::for_book(Path::new("/books/novel.epub"));
        assert_eq!(store.path(), Path::new("/books/.novel.epub.checkpoint.json"));
    }

    #[test]
    fn test_save_then_load_preserves_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_book(&dir.path().join("book.txt"));
        let translations = vec![
            "第一行\n第二行".to_string(),
            String::new(),
            "\"quoted\" \\ back".to_string(),
        ];

        store.save(&translations).unwrap();
        assert_eq!(store.load().unwrap(), translations);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_book(&dir.path().join("book.txt"));
        store.save(&["a".to_string(), "b".to_string()]).unwrap();
        store.save(&["c".to_string()]).unwrap();
        assert_eq!(store.load().unwrap(), vec!["c".to_string()]);
    }

    #[test]
    fn test_missing_checkpoint_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_book(&dir.path().join("book.txt"));
        assert!(!store.exists());
        assert!(matches!(
            store.load(),
            Err(TranslationError::CheckpointUnavailable { .. })
        ));
    }

    #[test]
    fn test_corrupt_checkpoint_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_book(&dir.path().join("book.txt"));
        std::fs::write(store.path(), "line one\nline two").unwrap();
        assert!(matches!(
            store.load(),
            Err(TranslationError::CheckpointUnavailable { .. })
        ));
    }

    #[test]
    fn test_checkpoint_for_other_book_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_book(&dir.path().join("book.txt"));
        store.save(&["x".to_string()]).unwrap();

        let renamed = dir.path().join(".other.txt.checkpoint.json");
        std::fs::rename(store.path(), &renamed).unwrap();
        let other = CheckpointStore::for_book(&dir.path().join("other.txt"));
        assert!(matches!(
            other.load(),
            Err(TranslationError::CheckpointUnavailable { .. })
        ));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let store = CheckpointStore::for_book(Path::new("/nonexistent-dir/book.txt"));
        assert!(matches!(
            store.save(&["x".to_string()]),
            Err(TranslationError::CheckpointWrite { .. })
        ));
    }
}
