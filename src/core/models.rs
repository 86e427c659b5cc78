//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::TranslationError;

/// Target language for the bilingual book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// zh-cn
    SimplifiedChinese,
    /// zh-tw
    #[default]
    TraditionalChinese,
    /// jp
    Japanese,
}

impl Language {
    /// Map a short code to a language; unknown codes fall back to the default.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "zh-cn" | "zh_cn" | "zh-hans" => Language::SimplifiedChinese,
            "zh-tw" | "zh_tw" | "zh-hant" => Language::TraditionalChinese,
            "jp" | "ja" => Language::Japanese,
            _ => Language::default(),
        }
    }

    /// Short code used on the command line
    pub fn code(&self) -> &'static str {
        match self {
            Language::SimplifiedChinese => "zh-cn",
            Language::TraditionalChinese => "zh-tw",
            Language::Japanese => "jp",
        }
    }

    /// Name sent to the engine in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Language::SimplifiedChinese => "Simplified Chinese",
            Language::TraditionalChinese => "Traditional Chinese",
            Language::Japanese => "Japanese",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<String> for Language {
    fn from(code: String) -> Self {
        Language::from_code(&code)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

/// Registered translation engine variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Chat completions, retry once after a cooldown, then fail
    #[default]
    ChatGpt,
    /// Text completions, fall back to the source text on failure
    Gpt3,
}

impl EngineKind {
    /// Every registered variant
    pub const ALL: [EngineKind; 2] = [EngineKind::ChatGpt, EngineKind::Gpt3];

    /// Look up a variant by its registry name
    pub fn from_name(name: &str) -> Result<Self, TranslationError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                TranslationError::config(format!(
                    "unknown model '{}', expected one of: chatgpt, gpt3",
                    name
                ))
            })
    }

    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::ChatGpt => "chatgpt",
            EngineKind::Gpt3 => "gpt3",
        }
    }

    /// Remote model identifier used when no override is configured
    pub fn default_model_id(&self) -> &'static str {
        match self {
            EngineKind::ChatGpt => "gpt-3.5-turbo",
            EngineKind::Gpt3 => "text-davinci-003",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EngineKind {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Source text
    pub text: String,
    /// Target language name as it appears in the prompt
    pub target_lang: String,
}

impl TranslationRequest {
    /// Request to translate `text` into `target_lang`
    pub fn new(text: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_lang: target_lang.into(),
        }
    }
}

/// Translation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Translated text
    pub translation: String,
    /// Tokens billed for the call, 0 when unknown
    pub tokens_used: usize,
    /// Remote model that produced the result
    pub model_used: String,
    /// Set when the engine gave up and returned the source text
    pub degraded: bool,
}

impl TranslationResult {
    /// Result carrying the untranslated source text
    pub fn fallback(request: &TranslationRequest, model: &str) -> Self {
        Self {
            translation: request.text.clone(),
            tokens_used: 0,
            model_used: model.to_string(),
            degraded: true,
        }
    }
}
