//! Plain-text books: one candidate unit per line

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::processors::segment::{Anchor, Segment, TextUnit};
use crate::processors::{emit_error, Document, DocumentFormat};
use crate::utils::write_atomically;

/// A `.txt` book held in memory as lines
#[derive(Debug, Clone)]
pub struct TextBook {
    path: PathBuf,
    lines: Vec<String>,
}

impl TextBook {
    /// Read a UTF-8 text file
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TranslationError::InvalidDocument {
            message: format!("{}: {}", path.display(), e),
        })?;

        let book = Self::from_content(path, &content);
        info!("Loaded text book {} ({} lines)", path.display(), book.lines.len());
        Ok(book)
    }

    /// Book over in-memory `content`, attributed to `path`
    pub fn from_content(path: &Path, content: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: content.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect(),
        }
    }

    /// Output body: translated lines in segment order
    pub fn render(segments: &[Segment]) -> String {
        segments
            .iter()
            .filter_map(|s| s.translated.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Document for TextBook {
    fn source(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn units(&self) -> Box<dyn Iterator<Item = TextUnit> + '_> {
        Box::new(self.lines.iter().enumerate().map(|(i, line)| {
            TextUnit::new(
                line.clone(),
                Anchor {
                    part: 0,
                    start: i,
                    end: i + 1,
                },
            )
        }))
    }

    fn emit(&self, segments: &[Segment], output: &Path) -> Result<()> {
        let body = Self::render(segments);
        debug!("Writing {} bytes to {}", body.len(), output.display());

        write_atomically(output, |file| file.write_all(body.as_bytes()))
            .map_err(|e| emit_error(output, e))
    }
}
