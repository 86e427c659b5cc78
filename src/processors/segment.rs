//! Segment extraction: ordered, filtered translatable units

use serde::{Deserialize, Serialize};

/// Position of a text unit inside its document.
///
/// `part` selects a chapter (EPUB) or is zero (plain text); `start..end` is
/// a byte range (EPUB) or a line number range (plain text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Chapter index
    pub part: usize,
    /// First byte or line
    pub start: usize,
    /// One past the last byte or line
    pub end: usize,
}

/// Candidate text unit produced by a document, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Raw text of the unit
    pub text: String,
    /// Where the unit sits in its document
    pub anchor: Anchor,
}

impl TextUnit {
    /// Unit with `text` at `anchor`
    pub fn new(text: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            text: text.into(),
            anchor,
        }
    }
}

/// One translatable unit of text, numbered in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position among accepted segments
    pub index: usize,
    /// Source text
    pub original: String,
    /// Translated text, once known
    pub translated: Option<String>,
    /// Where the segment sits in its document
    pub anchor: Anchor,
}

/// Empty, digit-only and whitespace-only text is never sent to an engine.
///
/// Only decimal digits count: numeral letters such as `Ⅻ` or `①` are text.
pub fn is_translatable(text: &str) -> bool {
    !text.is_empty()
        && !text.chars().all(|c| c.is_ascii_digit())
        && !text.chars().all(char::is_whitespace)
}

/// Turns a document's text units into numbered segments
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentExtractor {
    limit: Option<usize>,
}

impl SegmentExtractor {
    /// Extractor without a segment cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `limit` accepted segments across the whole document
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self { limit }
    }

    /// Segment cap, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Lazily number the translatable units of `units`
    pub fn extract<I>(&self, units: I) -> Segments<I::IntoIter>
    where
        I: IntoIterator<Item = TextUnit>,
    {
        Segments {
            units: units.into_iter(),
            next_index: 0,
            limit: self.limit,
        }
    }
}

/// Lazy segment iterator returned by [`SegmentExtractor::extract`]
#[derive(Debug)]
pub struct Segments<I> {
    units: I,
    next_index: usize,
    limit: Option<usize>,
}

impl<I> Iterator for Segments<I>
where
    I: Iterator<Item = TextUnit>,
{
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.limit.is_some_and(|limit| self.next_index >= limit) {
            return None;
        }

        loop {
            let unit = self.units.next()?;
            if !is_translatable(&unit.text) {
                continue;
            }

            let segment = Segment {
                index: self.next_index,
                original: unit.text,
                translated: None,
                anchor: unit.anchor,
            };
            self.next_index += 1;
            return Some(segment);
        }
    }
}
