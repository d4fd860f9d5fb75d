//! HTTP text-completion backends behind the engine's fallback chain.
//!
//! Each request is a single non-streaming call. HTTP 429 is reported as
//! rate limiting so the chain parks the model; everything else is a plain
//! failure (which also parks it).

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use slotwise_core::{BackendError, FallbackCompleter, ModelBackend, Prompt, DEFAULT_MODELS};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::resolve_api_key;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::OpenAI => "OpenAI",
            Provider::Anthropic => "Anthropic",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAI => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => anyhow::bail!("unknown llm provider '{other}' (expected gemini, openai or anthropic)"),
        }
    }
}

pub struct HttpBackend {
    provider: Provider,
    api_key: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(
        provider: Provider,
        api_key: String,
        base_url: Option<&str>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            provider,
            api_key,
            base_url: base_url
                .unwrap_or(provider.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            client,
        })
    }

    async fn generate_async(&self, model: &str, prompt: &Prompt) -> Result<String, BackendError> {
        let url = endpoint(self.provider, &self.base_url, model);
        let body = request_body(self.provider, model, prompt, self.temperature);

        let mut req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        req = match self.provider {
            Provider::Gemini => req.header("x-goog-api-key", &self.api_key),
            Provider::OpenAI => req.header(AUTHORIZATION, format!("Bearer {}", self.api_key)),
            Provider::Anthropic => req
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
        };

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Failed(format!("{} request: {e}", self.provider.label())))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited(format!("{model}: {status}")));
        }
        if !status.is_success() {
            return Err(BackendError::Failed(format!("{model}: {status} {}", snippet(&text))));
        }

        extract_text(self.provider, &text)
    }
}

impl ModelBackend for HttpBackend {
    fn generate(&self, model: &str, prompt: &Prompt) -> Result<String, BackendError> {
        // The CLI runs under #[tokio::main]; a nested runtime would panic.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.generate_async(model, prompt)))
        } else {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| BackendError::Failed(format!("create tokio runtime: {e}")))?;
            rt.block_on(self.generate_async(model, prompt))
        }
    }
}

pub fn endpoint(provider: Provider, base_url: &str, model: &str) -> String {
    match provider {
        Provider::Gemini => format!("{base_url}/v1beta/models/{model}:generateContent"),
        Provider::OpenAI => format!("{base_url}/v1/chat/completions"),
        Provider::Anthropic => format!("{base_url}/v1/messages"),
    }
}

/// Gemma models reject a system instruction, so Gemini gets one flattened
/// user turn.
pub fn request_body(provider: Provider, model: &str, prompt: &Prompt, temperature: f32) -> Value {
    match provider {
        Provider::Gemini => json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt.flattened() }] }],
            "generationConfig": { "temperature": temperature },
        }),
        Provider::OpenAI => json!({
            "model": model,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        }),
        Provider::Anthropic => json!({
            "model": model,
            "max_tokens": 512,
            "temperature": temperature,
            "system": prompt.system,
            "messages": [{ "role": "user", "content": prompt.user }],
        }),
    }
}

pub fn extract_text(provider: Provider, body: &str) -> Result<String, BackendError> {
    #[derive(Deserialize)]
    struct GeminiResp {
        #[serde(default)]
        candidates: Vec<GeminiCandidate>,
    }
    #[derive(Deserialize)]
    struct GeminiCandidate {
        content: Option<GeminiContent>,
    }
    #[derive(Deserialize)]
    struct GeminiContent {
        #[serde(default)]
        parts: Vec<TextPart>,
    }
    #[derive(Deserialize)]
    struct TextPart {
        text: Option<String>,
    }

    #[derive(Deserialize)]
    struct OpenAiResp {
        choices: Vec<OpenAiChoice>,
    }
    #[derive(Deserialize)]
    struct OpenAiChoice {
        message: OpenAiMessage,
    }
    #[derive(Deserialize)]
    struct OpenAiMessage {
        content: Option<String>,
    }

    #[derive(Deserialize)]
    struct AnthropicResp {
        content: Vec<AnthropicBlock>,
    }
    #[derive(Deserialize)]
    struct AnthropicBlock {
        #[serde(rename = "type")]
        t: String,
        text: Option<String>,
    }

    let malformed = |e: serde_json::Error| {
        BackendError::Failed(format!("parse {} response: {e}", provider.label()))
    };

    let text = match provider {
        Provider::Gemini => {
            let resp: GeminiResp = serde_json::from_str(body).map_err(malformed)?;
            resp.candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
                .unwrap_or_default()
        }
        Provider::OpenAI => {
            let resp: OpenAiResp = serde_json::from_str(body).map_err(malformed)?;
            resp.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default()
        }
        Provider::Anthropic => {
            let resp: AnthropicResp = serde_json::from_str(body).map_err(malformed)?;
            resp.content
                .into_iter()
                .filter(|b| b.t == "text")
                .filter_map(|b| b.text)
                .collect()
        }
    };

    Ok(text.trim().to_string())
}

fn snippet(s: &str) -> String {
    slotwise_core::time::truncate_chars(s.trim(), 200, 200)
}

/// Fallback chain for the configured provider, or `None` when no API key is
/// available (the engine then runs heuristic-only).
pub fn build_completer(cfg: &Config) -> Result<Option<FallbackCompleter>> {
    let provider: Provider = cfg.llm.provider.parse()?;
    let Some(api_key) = resolve_api_key(provider)? else {
        info!(provider = provider.label(), "no API key; AI tier disabled");
        return Ok(None);
    };

    let backend = HttpBackend::new(
        provider,
        api_key,
        cfg.llm.base_url.as_deref(),
        cfg.llm.temperature,
        Duration::from_secs(cfg.llm.timeout_secs.max(1)),
    )?;

    let models: Vec<String> = if cfg.llm.models.is_empty() {
        DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        cfg.llm.models.clone()
    };
    debug!(provider = provider.label(), models = ?models, "completion chain ready");

    Ok(Some(
        FallbackCompleter::new(Arc::new(backend), models)
            .with_cooldown(Duration::from_secs(cfg.llm.cooldown_secs)),
    ))
}
