//! End-to-end: interrupt an ePub translation, resume it, check the bilingual output

use async_trait::async_trait;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use bilingual_book_maker::core::errors::Result;
use bilingual_book_maker::core::pipeline::InterruptReason;
use bilingual_book_maker::{
    open_document, BilingualPipeline, CheckpointStore, PipelineOptions, RunOutcome,
    TranslationEngine, TranslationError, TranslationRequest, TranslationResult,
};

/// Uppercases text; fails every call from `fail_from` on
#[derive(Debug, Default)]
struct UpperEngine {
    calls: Mutex<Vec<String>>,
    fail_from: Option<usize>,
}

#[async_trait]
impl TranslationEngine for UpperEngine {
    fn name(&self) -> &str {
        "upper"
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.text.clone());
            calls.len() - 1
        };

        if self.fail_from.is_some_and(|f| n >= f) {
            return Err(TranslationError::EngineTransient {
                message: "quota".to_string(),
            });
        }

        Ok(TranslationResult {
            translation: request.text.to_uppercase(),
            tokens_used: 0,
            model_used: "upper".to_string(),
            degraded: false,
        })
    }
}

fn write_book(path: &Path) {
    let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
    let opf = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Resume</dc:title><dc:identifier id="id">resume</dc:identifier><dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="one" href="one.xhtml" media-type="application/xhtml+xml"/>
    <item id="two" href="two.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx"><itemref idref="one"/><itemref idref="two"/></spine>
</package>"#;
    let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="resume"/></head>
  <docTitle><text>Resume</text></docTitle>
  <navMap><navPoint id="n1" playOrder="1"><navLabel><text>One</text></navLabel><content src="one.xhtml"/></navPoint></navMap>
</ncx>"#;
    let one = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><h1>Title</h1><p>12</p><p>first</p><p>second</p></body></html>"#;
    let two = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>third</p><p> </p><p>fourth</p></body></html>"#;

    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body, options) in [
        ("mimetype", "application/epub+zip", stored),
        ("META-INF/container.xml", container, deflated),
        ("content.opf", opf, deflated),
        ("toc.ncx", ncx, deflated),
        ("one.xhtml", one, deflated),
        ("two.xhtml", two, deflated),
    ] {
        writer.start_file(name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

fn read_entry(path: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn interrupted_epub_run_resumes_to_full_bilingual_book() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("novel.epub");
    write_book(&book);

    let failing = Arc::new(UpperEngine {
        fail_from: Some(3),
        ..Default::default()
    });
    let mut first = BilingualPipeline::new(
        failing.clone(),
        open_document(&book).unwrap(),
        PipelineOptions::default(),
    );
    let outcome = first.run(std::future::pending()).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Interrupted {
            reason: InterruptReason::EngineFailure { index: 3, .. },
            saved: 3,
            ..
        }
    ));
    assert!(!dir.path().join("novel_bilingual.epub").exists());
    assert_eq!(
        CheckpointStore::for_book(&book).load().unwrap(),
        vec!["FIRST", "SECOND", "THIRD"]
    );

    let engine = Arc::new(UpperEngine::default());
    let mut resumed = BilingualPipeline::new(
        engine.clone(),
        open_document(&book).unwrap(),
        PipelineOptions {
            resume: true,
            ..Default::default()
        },
    );
    let outcome = resumed.run(std::future::pending()).await.unwrap();

    let summary = match outcome {
        RunOutcome::Completed(summary) => summary,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(summary.reused, 3);
    assert_eq!(summary.translated, 1);
    assert_eq!(*engine.calls.lock().unwrap(), vec!["fourth"]);

    let output = dir.path().join("novel_bilingual.epub");
    assert_eq!(summary.output, output);
    let one = read_entry(&output, "one.xhtml");
    assert!(one.contains("<p>12</p><p>first</p><p>FIRST</p><p>second</p><p>SECOND</p>"));
    let two = read_entry(&output, "two.xhtml");
    assert!(two.contains("<p>third</p><p>THIRD</p><p> </p><p>fourth</p><p>FOURTH</p>"));
    assert_eq!(read_entry(&output, "content.opf"), read_entry(&book, "content.opf"));
}

#[tokio::test]
async fn unsupported_format_is_rejected_before_translation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.pdf");
    std::fs::write(&path, b"%PDF-1.7").unwrap();

    assert!(matches!(
        open_document(&path),
        Err(TranslationError::UnsupportedFormat { .. })
    ));
}
