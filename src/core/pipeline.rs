//! Bilingual pipeline: resumable, sequential translation of a document
//!
//! The pipeline walks the document's segments in order, reuses checkpointed
//! translations when resuming, calls the engine for the rest and records every
//! result in the in-memory checkpoint as soon as it arrives. Every way out of
//! the run loop persists that checkpoint: normal completion, cancellation,
//! a fatal engine error, and the pipeline being dropped mid-run.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::checkpoint::CheckpointStore;
use crate::core::config::TranslatorConfig;
use crate::core::engine::TranslationEngine;
use crate::core::errors::Result;
use crate::core::models::{Language, TranslationRequest};
use crate::processors::segment::{Segment, SegmentExtractor};
use crate::processors::{bilingual_output_path, Document};

/// Per-run options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Target language
    pub language: Language,
    /// Reuse the saved checkpoint; a missing one is fatal
    pub resume: bool,
    /// Translate at most this many segments (test mode)
    pub test_limit: Option<usize>,
    /// Flush the checkpoint after this many new translations (0 disables)
    pub save_every: usize,
}

impl PipelineOptions {
    /// Options taken from `config`, plus the per-run flags
    pub fn from_config(config: &TranslatorConfig, resume: bool, test_limit: Option<usize>) -> Self {
        Self {
            language: config.language,
            resume,
            test_limit,
            save_every: config.save_every,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            language: Language::default(),
            resume: false,
            test_limit: None,
            save_every: 0,
        }
    }
}

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Loading the document and checkpoint
    Initializing,
    /// Translating segments
    Running,
    /// Output written
    Completed,
    /// Stopped early; the checkpoint was saved
    Interrupted,
    /// Unrecoverable error
    Failed,
}

/// Why a run stopped before the end of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptReason {
    /// Operator cancellation (Ctrl-C)
    Cancelled,
    /// The engine gave up on a segment
    EngineFailure {
        /// Segment that could not be translated
        index: usize,
        /// Engine error
        message: String,
    },
}

/// Counters for a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Bilingual file that was written
    pub output: PathBuf,
    /// Segments in the output
    pub segments: usize,
    /// Segments sent to the engine this run
    pub translated: usize,
    /// Segments taken from the checkpoint
    pub reused: usize,
    /// Segments left in the source language after an engine error
    pub degraded: usize,
    /// Tokens billed this run
    pub tokens_used: usize,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every segment translated and the output written
    Completed(RunSummary),
    /// Run stopped early, no output written
    Interrupted {
        /// What stopped the run
        reason: InterruptReason,
        /// Checkpoint file holding the saved progress
        checkpoint: PathBuf,
        /// Number of translations saved
        saved: usize,
    },
}

/// Drives one document through one engine
#[derive(Debug)]
pub struct BilingualPipeline {
    engine: Arc<dyn TranslationEngine>,
    document: Box<dyn Document>,
    store: CheckpointStore,
    options: PipelineOptions,
    state: PipelineState,
    checkpoint: Vec<String>,
}

impl BilingualPipeline {
    /// Pipeline translating `document` with `engine`
    pub fn new(
        engine: Arc<dyn TranslationEngine>,
        document: Box<dyn Document>,
        options: PipelineOptions,
    ) -> Self {
        let store = CheckpointStore::for_book(document.source());
        Self {
            engine,
            document,
            store,
            options,
            state: PipelineState::Initializing,
            checkpoint: Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Translations recorded so far, one per segment in order
    pub fn checkpoint(&self) -> &[String] {
        &self.checkpoint
    }

    /// Location of the checkpoint for this document
    pub fn checkpoint_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    /// Where the bilingual output is written
    pub fn output_path(&self) -> PathBuf {
        bilingual_output_path(self.document.source())
    }

    /// Run to completion, or until `cancel` resolves or the engine fails.
    pub async fn run<F>(&mut self, cancel: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        self.state = PipelineState::Initializing;
        self.checkpoint = match self.initialize() {
            Ok(loaded) => loaded,
            Err(e) => {
                self.state = PipelineState::Failed;
                return Err(e);
            }
        };

        let resume_len = self.checkpoint.len();
        self.state = PipelineState::Running;
        if resume_len > 0 {
            info!("Resuming after {} checkpointed segments", resume_len);
        }

        let extractor = SegmentExtractor::with_limit(self.options.test_limit);
        let target_lang = self.options.language.name();
        let mut summary = RunSummary {
            output: self.output_path(),
            ..Default::default()
        };
        let mut segments: Vec<Segment> = Vec::new();
        let mut stop: Option<InterruptReason> = None;
        let mut called = false;

        tokio::pin!(cancel);

        for mut segment in extractor.extract(self.document.units()) {
            if segment.index < resume_len {
                segment.translated = Some(self.checkpoint[segment.index].clone());
                summary.reused += 1;
                segments.push(segment);
                continue;
            }

            // Pacing sits between requests, after the previous result was recorded
            if called {
                let paced = tokio::select! {
                    biased;
                    _ = &mut cancel => false,
                    _ = self.engine.pace() => true,
                };
                if !paced {
                    stop = Some(InterruptReason::Cancelled);
                    break;
                }
            }
            called = true;

            let request = TranslationRequest::new(segment.original.clone(), target_lang);
            let outcome = tokio::select! {
                biased;
                _ = &mut cancel => None,
                result = self.engine.translate(&request) => Some(result),
            };

            let result = match outcome {
                None => {
                    stop = Some(InterruptReason::Cancelled);
                    break;
                }
                Some(Err(e)) => {
                    error!("Segment {} failed: {}", segment.index, e);
                    stop = Some(InterruptReason::EngineFailure {
                        index: segment.index,
                        message: e.to_string(),
                    });
                    break;
                }
                Some(Ok(result)) => result,
            };

            debug_assert_eq!(self.checkpoint.len(), segment.index);
            self.checkpoint.push(result.translation.clone());
            summary.translated += 1;
            summary.tokens_used += result.tokens_used;
            if result.degraded {
                summary.degraded += 1;
            }
            debug!("Segment {} translated", segment.index);

            segment.translated = Some(result.translation);
            segments.push(segment);

            if self.options.save_every > 0 && summary.translated % self.options.save_every == 0 {
                if let Err(e) = self.store.save(&self.checkpoint) {
                    warn!("Periodic checkpoint save failed: {}", e);
                }
            }
        }

        if let Some(reason) = stop {
            return self.interrupt(reason);
        }

        summary.segments = segments.len();
        self.complete(&segments, summary)
    }

    /// Load the checkpoint when resuming and check it still fits the document
    fn initialize(&self) -> Result<Vec<String>> {
        let total = SegmentExtractor::new().extract(self.document.units()).count();
        info!(
            "{} has {} translatable segments{}",
            self.document.source().display(),
            total,
            self.options
                .test_limit
                .map(|n| format!(" (test mode: first {})", n))
                .unwrap_or_default()
        );

        if !self.options.resume {
            return Ok(Vec::new());
        }

        let loaded = self.store.load()?;
        if loaded.len() > total {
            return Err(self.store.unavailable(format!(
                "checkpoint has {} entries but the document only has {} segments",
                loaded.len(),
                total
            )));
        }

        Ok(loaded)
    }

    fn interrupt(&mut self, reason: InterruptReason) -> Result<RunOutcome> {
        warn!(
            "Run interrupted ({:?}), saving {} translations",
            reason,
            self.checkpoint.len()
        );
        if let Err(e) = self.store.save(&self.checkpoint) {
            self.state = PipelineState::Failed;
            return Err(e);
        }
        self.state = PipelineState::Interrupted;

        Ok(RunOutcome::Interrupted {
            reason,
            checkpoint: self.checkpoint_path(),
            saved: self.checkpoint.len(),
        })
    }

    fn complete(&mut self, segments: &[Segment], summary: RunSummary) -> Result<RunOutcome> {
        if let Err(e) = self.store.save(&self.checkpoint) {
            self.state = PipelineState::Failed;
            return Err(e);
        }

        if let Err(e) = self.document.emit(segments, &summary.output) {
            self.state = PipelineState::Failed;
            return Err(e);
        }

        self.state = PipelineState::Completed;
        info!(
            "Completed: {} segments ({} translated, {} reused, {} degraded) -> {}",
            summary.segments,
            summary.translated,
            summary.reused,
            summary.degraded,
            summary.output.display()
        );

        Ok(RunOutcome::Completed(summary))
    }
}

impl Drop for BilingualPipeline {
    fn drop(&mut self) {
        if self.state != PipelineState::Running {
            return;
        }

        warn!(
            "Pipeline dropped mid-run, saving {} translations",
            self.checkpoint.len()
        );
        if let Err(e) = self.store.save(&self.checkpoint) {
            error!("{}", e);
        }
    }
}
