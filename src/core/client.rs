//! HTTP backends for the OpenAI-style completion endpoints
//!
//! A backend owns one request shape and performs exactly one round-trip per
//! call. Retry, fallback and pacing live in [`crate::core::engine`].

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::debug;

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{TranslationRequest, TranslationResult};

/// A single remote text-to-text call
#[async_trait]
pub trait CompletionBackend: Send + Sync + Debug {
    /// Remote model identifier, used for logging and degraded results
    fn model_id(&self) -> &str;

    /// Send one request and parse the translated text out of the response
    async fn send(&self, request: &TranslationRequest) -> Result<TranslationResult>;
}

/// Prompt for the chat completions shape
pub fn chat_prompt(request: &TranslationRequest) -> String {
    format!(
        "Please help me to translate, `{}` to {}, please return only translated content not include the origin text",
        request.text, request.target_lang
    )
}

/// Prompt for the text completions shape
pub fn completion_prompt(request: &TranslationRequest) -> String {
    format!(
        "Please help me to translate, `{}` to {}",
        request.text, request.target_lang
    )
}

/// Shared HTTP plumbing for both request shapes
#[derive(Debug, Clone)]
struct HttpClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl HttpClient {
    fn new(config: &TranslatorConfig, path: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(2)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/{}", config.api_base.trim_end_matches('/'), path),
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TranslationError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| TranslationError::InvalidResponse {
                    message: e.to_string(),
                });
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let status_code = status.as_u16();
        let error_text = response.text().await.unwrap_or_default();

        if status_code == 429 {
            return Err(TranslationError::RateLimit { retry_after });
        }

        Err(TranslationError::Api {
            status: status_code,
            message: error_text,
        })
    }
}

fn tokens_used(json: &serde_json::Value) -> usize {
    json["usage"]["total_tokens"].as_u64().unwrap_or(0) as usize
}

/// `POST {api_base}/chat/completions`
#[derive(Debug, Clone)]
pub struct ChatBackend {
    http: HttpClient,
    model: String,
}

impl ChatBackend {
    /// Backend for `config`, with the configured timeout
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config, "chat/completions")?,
            model: config.model_id().to_string(),
        })
    }

    /// Request body for one translation
    pub fn request_body(&self, request: &TranslationRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": chat_prompt(request),
            }]
        })
    }

    /// Extract the translation from a chat completions response
    pub fn parse_response(&self, json: &serde_json::Value) -> Result<TranslationResult> {
        let translation = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| TranslationError::InvalidResponse {
                message: "No message content in chat response".to_string(),
            })?
            .trim()
            .to_string();

        Ok(TranslationResult {
            translation,
            tokens_used: tokens_used(json),
            model_used: self.model.clone(),
            degraded: false,
        })
    }
}

#[async_trait]
impl CompletionBackend for ChatBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let body = self.request_body(request);
        debug!("POST {} model={}", self.http.endpoint, self.model);
        let json = self.http.post(&body).await?;
        self.parse_response(&json)
    }
}

/// `POST {api_base}/completions`
#[derive(Debug, Clone)]
pub struct CompletionApiBackend {
    http: HttpClient,
    model: String,
}

impl CompletionApiBackend {
    /// Backend for `config`, with the configured timeout
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config, "completions")?,
            model: config.model_id().to_string(),
        })
    }

    /// Request body for one translation
    pub fn request_body(&self, request: &TranslationRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": completion_prompt(request),
            "max_tokens": 1024,
            "temperature": 1,
            "top_p": 1,
        })
    }

    /// Extract the translation from a text completions response
    pub fn parse_response(&self, json: &serde_json::Value) -> Result<TranslationResult> {
        let translation = json["choices"]
            .get(0)
            .and_then(|c| c["text"].as_str())
            .ok_or_else(|| TranslationError::InvalidResponse {
                message: "No text in completion response".to_string(),
            })?
            .trim()
            .to_string();

        Ok(TranslationResult {
            translation,
            tokens_used: tokens_used(json),
            model_used: self.model.clone(),
            degraded: false,
        })
    }
}

#[async_trait]
impl CompletionBackend for CompletionApiBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let body = self.request_body(request);
        debug!("POST {} model={}", self.http.endpoint, self.model);
        let json = self.http.post(&body).await?;
        self.parse_response(&json)
    }
}
