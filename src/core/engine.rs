//! Translation engines: failure policy and pacing on top of a backend

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::client::{ChatBackend, CompletionApiBackend, CompletionBackend};
use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{EngineKind, TranslationRequest, TranslationResult};

/// Single-text-in, single-text-out translation
#[async_trait]
pub trait TranslationEngine: Send + Sync + Debug {
    /// Registry name of this engine
    fn name(&self) -> &str;

    /// Translate one unit of text.
    ///
    /// `request.text` is expected to be non-empty and carry translatable
    /// content; filtering happens upstream.
    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult>;

    /// Wait out the engine's usage limit before the next request.
    ///
    /// Kept apart from `translate` so a returned result can be recorded
    /// before the wait starts. The default does not wait.
    async fn pace(&self) {}
}

/// What an engine does when a remote call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Wait, retry exactly once, then surface the error
    RetryOnce {
        /// Wait before the retry
        cooldown: Duration,
    },
    /// Return the source text as a degraded result
    FallbackToSource,
}

/// Engine combining a backend with a failure policy and optional throttle
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    name: String,
    backend: Arc<dyn CompletionBackend>,
    policy: FailurePolicy,
    throttle: Option<Duration>,
}

impl PolicyEngine {
    /// Engine named `name` sending requests through `backend`
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn CompletionBackend>,
        policy: FailurePolicy,
        throttle: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            backend,
            policy,
            throttle,
        }
    }

    /// Failure policy of this engine
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Pause applied between requests, if any
    pub fn throttle(&self) -> Option<Duration> {
        self.throttle
    }
}

#[async_trait]
impl TranslationEngine for PolicyEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        debug!("[{}] request: {}", self.name, request.text);

        let first = self.backend.send(request).await;

        let result = match (first, self.policy) {
            (Ok(result), _) => result,
            (Err(e), FailurePolicy::FallbackToSource) => {
                warn!("[{}] request failed: {}, keeping source text", self.name, e);
                return Ok(TranslationResult::fallback(request, self.backend.model_id()));
            }
            (Err(e), FailurePolicy::RetryOnce { cooldown }) => {
                warn!(
                    "[{}] request failed: {}, retrying once in {:?}",
                    self.name, e, cooldown
                );
                sleep(cooldown).await;

                match self.backend.send(request).await {
                    Ok(result) => {
                        info!("[{}] retry succeeded", self.name);
                        result
                    }
                    Err(retry_err) => {
                        warn!("[{}] retry failed: {}", self.name, retry_err);
                        return Err(TranslationError::EngineTransient {
                            message: retry_err.to_string(),
                        });
                    }
                }
            }
        };

        debug!("[{}] response: {}", self.name, result.translation);
        Ok(result)
    }

    async fn pace(&self) {
        if let Some(delay) = self.throttle {
            debug!("[{}] sleeping {:?} to stay under the usage limit", self.name, delay);
            sleep(delay).await;
        }
    }
}

/// Build the engine registered under `config.model`
pub fn build_engine(config: &TranslatorConfig) -> Result<Arc<dyn TranslationEngine>> {
    config.validate()?;

    let engine = match config.model {
        EngineKind::ChatGpt => PolicyEngine::new(
            EngineKind::ChatGpt.name(),
            Arc::new(ChatBackend::new(config)?),
            FailurePolicy::RetryOnce {
                cooldown: config.retry_cooldown(),
            },
            config.throttle(),
        ),
        EngineKind::Gpt3 => PolicyEngine::new(
            EngineKind::Gpt3.name(),
            Arc::new(CompletionApiBackend::new(config)?),
            FailurePolicy::FallbackToSource,
            None,
        ),
    };

    info!(
        "Using engine {} (model {}, throttle {:?})",
        engine.name(),
        config.model_id(),
        engine.throttle()
    );

    Ok(Arc::new(engine))
}
