//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{EngineKind, Language};

/// Environment variable holding the OpenAI credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Prefix for environment overrides of any config field (e.g. `BBM_API_BASE`)
pub const ENV_PREFIX: &str = "BBM";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for the translation engine and pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// OpenAI API key
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,
    /// Engine variant
    pub model: EngineKind,
    /// Remote model identifier, overrides the variant's default
    pub model_id: Option<String>,
    /// Target language
    pub language: Language,
    /// Paid tier: skip the delay after each successful call
    pub no_limit: bool,
    /// Pause after each successful call, in milliseconds
    pub throttle_ms: u64,
    /// Wait before the single retry of a failed call, in milliseconds
    pub retry_cooldown_ms: u64,
    /// HTTP request timeout, in milliseconds
    pub timeout_ms: u64,
    /// Flush the checkpoint after this many new translations (0 disables)
    pub save_every: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: EngineKind::default(),
            model_id: None,
            language: Language::default(),
            no_limit: false,
            throttle_ms: 3_000,
            retry_cooldown_ms: 60_000,
            timeout_ms: 120_000,
            save_every: 10,
        }
    }
}

impl TranslatorConfig {
    /// Load defaults, then an optional config file, then `BBM_*` environment variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings = builder
            .build()
            .map_err(|e| TranslationError::config(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| TranslationError::config(e.to_string()))?;

        debug!(
            "Loaded configuration: model={}, language={}, api_base={}",
            config.model, config.language, config.api_base
        );

        Ok(config)
    }

    /// Resolve the API key: explicit value, then config, then `OPENAI_API_KEY`
    pub fn resolve_api_key(&mut self, explicit: Option<String>) -> Result<()> {
        self.resolve_api_key_with(explicit, |name| std::env::var(name).ok())
    }

    fn resolve_api_key_with<F>(&mut self, explicit: Option<String>, env: F) -> Result<()>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
            self.api_key = key;
            return Ok(());
        }

        if !self.api_key.trim().is_empty() {
            return Ok(());
        }

        match env(API_KEY_ENV) {
            Some(key) if !key.trim().is_empty() => {
                self.api_key = key;
                Ok(())
            }
            _ => Err(TranslationError::config(format!(
                "an OpenAI API key is required: pass --openai-key or set {}",
                API_KEY_ENV
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TranslationError::config("API key is required"));
        }

        if self.api_base.trim().is_empty() {
            return Err(TranslationError::config("API base URL is required"));
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(TranslationError::config(format!(
                "API base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }

        if self.timeout_ms == 0 {
            return Err(TranslationError::config("timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Remote model identifier for the selected engine
    pub fn model_id(&self) -> &str {
        self.model_id
            .as_deref()
            .unwrap_or_else(|| self.model.default_model_id())
    }

    /// Delay after each successful call, `None` when unthrottled
    pub fn throttle(&self) -> Option<Duration> {
        if self.no_limit || self.throttle_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.throttle_ms))
        }
    }

    /// Wait before retrying a failed call
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> TranslatorConfig {
        TranslatorConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_key() {
        let config = TranslatorConfig::default();
        assert!(matches!(
            config.validate(),
            Err(TranslationError::Configuration { .. })
        ));
    }

    #[test]
    fn test_config_validation_bad_base() {
        let config = TranslatorConfig {
            api_base: "api.openai.com".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut config = TranslatorConfig {
            api_key: "from_file".to_string(),
            ..Default::default()
        };
        config.resolve_api_key(Some("explicit".to_string())).unwrap();
        assert_eq!(config.api_key, "explicit");
    }

    #[test]
    fn test_configured_key_kept_without_explicit() {
        let mut config = TranslatorConfig {
            api_key: "from_file".to_string(),
            ..Default::default()
        };
        config.resolve_api_key(None).unwrap();
        assert_eq!(config.api_key, "from_file");
    }

    #[test]
    fn test_key_taken_from_environment() {
        let mut config = TranslatorConfig::default();
        config
            .resolve_api_key_with(None, |name| {
                assert_eq!(name, API_KEY_ENV);
                Some("from_env".to_string())
            })
            .unwrap();
        assert_eq!(config.api_key, "from_env");
    }

    #[test]
    fn test_missing_key_everywhere_is_configuration_error() {
        let mut config = TranslatorConfig::default();
        let err = config.resolve_api_key_with(None, |_| None).unwrap_err();
        assert!(matches!(err, TranslationError::Configuration { .. }));

        let err = config
            .resolve_api_key_with(Some("  ".to_string()), |_| Some(String::new()))
            .unwrap_err();
        assert!(matches!(err, TranslationError::Configuration { .. }));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_throttle_respects_no_limit() {
        let mut config = valid_config();
        assert_eq!(config.throttle(), Some(Duration::from_secs(3)));
        config.no_limit = true;
        assert_eq!(config.throttle(), None);
    }

    #[test]
    fn test_model_id_override() {
        let mut config = valid_config();
        assert_eq!(config.model_id(), "gpt-3.5-turbo");
        config.model = EngineKind::Gpt3;
        assert_eq!(config.model_id(), "text-davinci-003");
        config.model_id = Some("gpt-4o-mini".to_string());
        assert_eq!(config.model_id(), "gpt-4o-mini");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"model": "gpt3", "language": "jp", "no_limit": true, "throttle_ms": 10}}"#
        )
        .unwrap();

        let config = TranslatorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.model, EngineKind::Gpt3);
        assert_eq!(config.language, Language::Japanese);
        assert!(config.no_limit);
        assert_eq!(config.throttle_ms, 10);
        assert_eq!(config.retry_cooldown_ms, 60_000);
    }

    #[test]
    fn test_load_unknown_language_falls_back() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"language": "xx"}}"#).unwrap();

        let config = TranslatorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.language, Language::TraditionalChinese);
    }
}
