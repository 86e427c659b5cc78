//! ePub books: paragraph discovery in spine order and bilingual rewriting

use epub::doc::EpubDoc;
use quick_xml::escape::{partial_escape, resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::errors::{Result, TranslationError};
use crate::processors::segment::{Anchor, Segment, TextUnit};
use crate::processors::{emit_error, Document, DocumentFormat};
use crate::utils::write_atomically;

/// A leaf `<p>` element inside a chapter
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paragraph {
    /// Byte range of the whole element, open tag to close tag
    start: usize,
    end: usize,
    /// Attributes for the translated copy: the original's, minus `id`
    copy_attrs: String,
    text: String,
}

/// A `<p>` whose close tag has not been seen yet
#[derive(Debug)]
struct OpenParagraph {
    start: usize,
    copy_attrs: String,
    text: String,
    /// Another `<p>` opened inside this one
    nested: bool,
}

/// A spine document with its raw markup
#[derive(Debug, Clone)]
struct Chapter {
    /// Entry name inside the zip container
    name: String,
    content: String,
    paragraphs: Vec<Paragraph>,
}

impl Chapter {
    fn new(name: String, content: String) -> Self {
        let paragraphs = match find_paragraphs(&content) {
            Ok(paragraphs) => paragraphs,
            Err(e) => {
                warn!("Cannot parse {}: {}, leaving it untouched", name, e);
                Vec::new()
            }
        };

        Self {
            name,
            content,
            paragraphs,
        }
    }

    /// Markup with each translated paragraph inserted after its original
    fn render(&self, translations: &[(&Anchor, &str)]) -> String {
        let mut out = String::with_capacity(self.content.len() * 2);
        let mut cursor = 0;

        for (anchor, translation) in translations {
            let Some(paragraph) = self
                .paragraphs
                .iter()
                .find(|p| p.start == anchor.start && p.end == anchor.end)
            else {
                warn!(
                    "No paragraph at {}..{} in {}, skipping",
                    anchor.start, anchor.end, self.name
                );
                continue;
            };

            out.push_str(&self.content[cursor..paragraph.end]);
            out.push_str("<p");
            out.push_str(&paragraph.copy_attrs);
            out.push('>');
            out.push_str(&partial_escape(*translation));
            out.push_str("</p>");
            cursor = paragraph.end;
        }

        out.push_str(&self.content[cursor..]);
        out
    }
}

fn is_named(name: &[u8], expected: &[u8]) -> bool {
    name.eq_ignore_ascii_case(expected)
}

/// Leaf `<p>` elements in document order.
///
/// A `<p>` with another `<p>` inside is skipped in favour of the inner one.
/// Inline markup inside a paragraph is flattened into its text. Comments,
/// processing instructions and unclosed paragraphs yield nothing.
fn find_paragraphs(content: &str) -> std::result::Result<Vec<Paragraph>, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut paragraphs = Vec::new();
    let mut open: Vec<OpenParagraph> = Vec::new();

    loop {
        let event = reader.read_event()?;
        let pos = reader.buffer_position() as usize;

        match event {
            Event::Start(tag) if is_named(tag.local_name().as_ref(), b"p") => {
                if let Some(outer) = open.last_mut() {
                    outer.nested = true;
                }
                // `tag` holds everything between `<` and `>`
                open.push(OpenParagraph {
                    start: pos - tag.len() - 2,
                    copy_attrs: copy_attributes(&tag),
                    text: String::new(),
                    nested: false,
                });
            }
            Event::End(tag) if is_named(tag.local_name().as_ref(), b"p") => {
                if let Some(paragraph) = open.pop().filter(|p| !p.nested) {
                    paragraphs.push(Paragraph {
                        start: paragraph.start,
                        end: pos,
                        copy_attrs: paragraph.copy_attrs,
                        text: collapse_whitespace(&paragraph.text),
                    });
                }
            }
            Event::Empty(tag) if is_named(tag.local_name().as_ref(), b"br") => {
                if let Some(paragraph) = open.last_mut() {
                    paragraph.text.push(' ');
                }
            }
            Event::Text(text) => {
                if let Some(paragraph) = open.last_mut() {
                    paragraph.text.push_str(&decode_text(&text));
                }
            }
            Event::CData(data) => {
                if let Some(paragraph) = open.last_mut() {
                    paragraph.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Attributes of `tag` rendered for the translated copy, `id` dropped
fn copy_attributes(tag: &BytesStart) -> String {
    let mut out = String::new();

    for attr in tag.html_attributes().map_while(|a| a.ok()) {
        if is_named(attr.key.local_name().as_ref(), b"id") {
            continue;
        }

        let key = String::from_utf8_lossy(attr.key.as_ref());
        let value = String::from_utf8_lossy(&attr.value);
        let quote = if value.contains('"') { '\'' } else { '"' };
        out.push_str(&format!(" {}={}{}{}", key, quote, value, quote));
    }

    out
}

/// Entity-decoded text; input that does not decode is kept as written
fn decode_text(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    unescape_with(&raw, resolve_html5_entity)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn zip_io(err: zip::result::ZipError) -> io::Error {
    io::Error::other(err)
}

/// Zip entry names of the spine documents, in reading order
fn spine_entries(path: &Path) -> Result<Vec<String>> {
    let mut doc = EpubDoc::new(path).map_err(|e| TranslationError::InvalidDocument {
        message: format!("{}: {}", path.display(), e),
    })?;

    let mut entries: Vec<String> = Vec::new();
    loop {
        if let Some(resource) = doc.get_current_path() {
            let name = resource.to_string_lossy().replace('\\', "/");
            if !entries.contains(&name) {
                entries.push(name);
            }
        }

        if !doc.go_next() {
            break;
        }
    }

    Ok(entries)
}

/// An ePub book loaded for translation
#[derive(Debug, Clone)]
pub struct EpubBook {
    path: PathBuf,
    chapters: Vec<Chapter>,
}

impl EpubBook {
    /// Open an ePub and index the paragraphs of every spine document
    pub fn open(path: &Path) -> Result<Self> {
        let spine = spine_entries(path)?;
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut chapters = Vec::with_capacity(spine.len());

        for name in spine {
            let mut entry = match archive.by_name(&name) {
                Ok(entry) => entry,
                Err(zip::result::ZipError::FileNotFound) => {
                    warn!("Spine item {} is missing from the container", name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;

            match String::from_utf8(bytes) {
                Ok(content) => chapters.push(Chapter::new(name, content)),
                Err(_) => warn!("Spine item {} is not UTF-8, leaving it untouched", name),
            }
        }

        let paragraphs: usize = chapters.iter().map(|c| c.paragraphs.len()).sum();
        info!(
            "Loaded ePub {} ({} chapters, {} paragraphs)",
            path.display(),
            chapters.len(),
            paragraphs
        );

        Ok(Self {
            path: path.to_path_buf(),
            chapters,
        })
    }

    /// Rewritten markup for every chapter that received a translation
    fn rewritten_chapters(&self, segments: &[Segment]) -> HashMap<&str, String> {
        let mut by_part: HashMap<usize, Vec<(&Anchor, &str)>> = HashMap::new();
        for segment in segments {
            if let Some(translation) = segment.translated.as_deref() {
                by_part
                    .entry(segment.anchor.part)
                    .or_default()
                    .push((&segment.anchor, translation));
            }
        }

        by_part
            .into_iter()
            .filter_map(|(part, mut translations)| {
                let chapter = self.chapters.get(part)?;
                translations.sort_by_key(|(anchor, _)| anchor.start);
                Some((chapter.name.as_str(), chapter.render(&translations)))
            })
            .collect()
    }
}

impl Document for EpubBook {
    fn source(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Epub
    }

    fn units(&self) -> Box<dyn Iterator<Item = TextUnit> + '_> {
        Box::new(self.chapters.iter().enumerate().flat_map(|(part, chapter)| {
            chapter.paragraphs.iter().map(move |p| {
                TextUnit::new(
                    p.text.clone(),
                    Anchor {
                        part,
                        start: p.start,
                        end: p.end,
                    },
                )
            })
        }))
    }

    /// Copies the source container entry by entry, replacing translated
    /// chapters. Untouched entries are raw-copied so their bytes, order and
    /// timestamps are preserved.
    fn emit(&self, segments: &[Segment], output: &Path) -> Result<()> {
        let rewritten = self.rewritten_chapters(segments);
        debug!("Rewriting {} chapters into {}", rewritten.len(), output.display());

        let source = File::open(&self.path).map_err(|e| emit_error(output, e))?;
        let mut archive = ZipArchive::new(source).map_err(|e| emit_error(output, e))?;

        write_atomically(output, |file| {
            let mut writer = ZipWriter::new(file);

            for i in 0..archive.len() {
                let entry = archive.by_index_raw(i).map_err(zip_io)?;

                match rewritten.get(entry.name()) {
                    Some(content) => {
                        let name = entry.name().to_string();
                        let options = FileOptions::default()
                            .compression_method(CompressionMethod::Deflated)
                            .last_modified_time(entry.last_modified());
                        drop(entry);
                        writer.start_file(name, options).map_err(zip_io)?;
                        writer.write_all(content.as_bytes())?;
                    }
                    None => writer.raw_copy_file(entry).map_err(zip_io)?,
                }
            }

            writer.finish().map_err(zip_io)?;
            Ok(())
        })
        .map_err(|e| emit_error(output, e))?;

        info!("Wrote bilingual ePub {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="test-book"/></head>
  <docTitle><text>Test Book</text></docTitle>
  <navMap>
    <navPoint id="nav1" playOrder="1">
      <navLabel><text>Start</text></navLabel>
      <content src="chap0.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

    pub fn chapter_xhtml(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>t</title></head>\n<body>\n{}\n</body>\n</html>\n",
            body
        )
    }

    /// Write a minimal ePub whose spine lists `chapters` in the given order.
    /// Zip entries are stored in reverse order to keep container order and
    /// reading order distinct.
    pub fn write_epub(path: &Path, chapters: &[&str]) {
        let mut manifest = String::from(
            r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
        );
        let mut spine = String::new();
        for i in 0..chapters.len() {
            manifest.push_str(&format!(
                r#"<item id="chap{i}" href="chap{i}.xhtml" media-type="application/xhtml+xml"/>"#
            ));
            spine.push_str(&format!(r#"<itemref idref="chap{i}"/>"#));
        }

        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test Book</dc:title>
    <dc:identifier id="bookid">test-book</dc:identifier>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>{manifest}</manifest>
  <spine toc="ncx">{spine}</spine>
</package>"#
        );

        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file("mimetype", stored).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        writer.start_file("META-INF/container.xml", deflated).unwrap();
        writer.write_all(CONTAINER.as_bytes()).unwrap();
        writer.start_file("OEBPS/content.opf", deflated).unwrap();
        writer.write_all(opf.as_bytes()).unwrap();
        writer.start_file("OEBPS/toc.ncx", deflated).unwrap();
        writer.write_all(NCX.as_bytes()).unwrap();

        for (i, body) in chapters.iter().enumerate().rev() {
            writer
                .start_file(format!("OEBPS/chap{i}.xhtml"), deflated)
                .unwrap();
            writer.write_all(chapter_xhtml(body).as_bytes()).unwrap();
        }

        writer.finish().unwrap();
    }

    pub fn read_entry(path: &Path, name: &str) -> String {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        content
    }
}
