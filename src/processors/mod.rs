//! Document formats: segment discovery and bilingual emission

pub mod epub;
pub mod segment;
pub mod text;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, TranslationError};
use segment::{Segment, TextUnit};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// ePub container
    Epub,
    /// Plain text, one paragraph per line
    Text,
}

impl DocumentFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "epub" => Ok(DocumentFormat::Epub),
            "txt" => Ok(DocumentFormat::Text),
            _ => Err(TranslationError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// A source document the pipeline can translate
pub trait Document: Send + Sync + Debug {
    /// Path the document was read from
    fn source(&self) -> &Path;

    /// Format of this document
    fn format(&self) -> DocumentFormat;

    /// Every candidate text unit in document order, unfiltered.
    ///
    /// Must yield the same sequence on every call.
    fn units(&self) -> Box<dyn Iterator<Item = TextUnit> + '_>;

    /// Write the bilingual artifact to `output`.
    ///
    /// Segments without a translation are left as they are in the source.
    fn emit(&self, segments: &[Segment], output: &Path) -> Result<()>;
}

/// Open `path` with the reader matching its extension
pub fn open_document(path: &Path) -> Result<Box<dyn Document>> {
    let format = DocumentFormat::from_path(path)?;

    if !path.is_file() {
        return Err(TranslationError::Configuration {
            message: format!("input file not found: {}", path.display()),
        });
    }

    match format {
        DocumentFormat::Epub => Ok(Box::new(epub::EpubBook::open(path)?)),
        DocumentFormat::Text => Ok(Box::new(text::TextBook::open(path)?)),
    }
}

/// `<dir>/<stem>_bilingual.<ext>`
pub fn bilingual_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match input.extension() {
        Some(ext) => format!("{}_bilingual.{}", stem, ext.to_string_lossy()),
        None => format!("{}_bilingual", stem),
    };

    input.with_file_name(name)
}

pub(crate) fn emit_error(output: &Path, err: impl std::fmt::Display) -> TranslationError {
    TranslationError::Emit {
        path: output.display().to_string(),
        message: err.to_string(),
    }
}
