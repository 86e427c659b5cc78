//! Bilingual Book Maker - resumable book translation library
//!
//! This library splits ePub and plain-text books into translatable segments,
//! sends each one to a remote translation engine and writes a bilingual
//! edition, checkpointing progress so an interrupted run can resume.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod processors;
pub mod cli;
pub mod utils;

// Re-export key types for convenience
pub use crate::core::{
    checkpoint::CheckpointStore,
    config::TranslatorConfig,
    engine::{build_engine, FailurePolicy, PolicyEngine, TranslationEngine},
    errors::TranslationError,
    models::{EngineKind, Language, TranslationRequest, TranslationResult},
    pipeline::{BilingualPipeline, PipelineOptions, PipelineState, RunOutcome},
};

pub use crate::processors::{
    epub::EpubBook,
    open_document,
    segment::{Segment, SegmentExtractor},
    text::TextBook,
    Document,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
