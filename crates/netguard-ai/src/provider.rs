//! LLM provider adapters (spec §4.9 step 3). Grounded on
//! `mcp-router/src/cloud_client.rs`'s `CloudClient`: a `reqwest::Client`
//! built once with a fixed timeout and user agent, a single `post(...)
//! .json(...)`, status check, then JSON decode. Generalised from one cloud
//! endpoint to a small data-driven set of provider adapters.

use std::time::Duration;

use async_trait::async_trait;
use netguard_common::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::prompt::SYSTEM_PREAMBLE;

/// Per-request timeout budget; the aggregator additionally bounds the
/// whole fallback chain to ~60 s (spec §4.9 step 3).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// One configured model in the provider priority chain.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Groq,
    OpenRouter,
}

impl ProviderConfig {
    /// Whether this entry has a usable credential. The Python original
    /// also treats the literal placeholder strings shipped in the sample
    /// config as "absent" (`ai_connector_v2.py::analyze_network_data`).
    pub fn has_key(&self) -> bool {
        match &self.api_key {
            None => false,
            Some(key) => {
                !key.is_empty()
                    && key != "YOUR_GEMINI_KEY_HERE"
                    && key != "YOUR_GROQ_KEY_HERE"
                    && key != "YOUR_OPENROUTER_KEY_HERE"
            }
        }
    }
}

/// The default priority chain (spec §4.9 step 3), used when `ai_config.json`
/// does not set an explicit `providers[]` override.
pub fn default_chain(
    gemini_key: Option<String>,
    groq_key: Option<String>,
    openrouter_key: Option<String>,
) -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "Gemini 2.0 Flash".to_string(),
            kind: ProviderKind::Gemini,
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: gemini_key,
        },
        ProviderConfig {
            name: "Groq Llama 3.3 70B".to_string(),
            kind: ProviderKind::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: groq_key,
        },
        ProviderConfig {
            name: "OpenRouter DeepSeek R1".to_string(),
            kind: ProviderKind::OpenRouter,
            model: "deepseek/deepseek-r1".to_string(),
            api_key: openrouter_key,
        },
    ]
}

/// A single LLM call: send `prompt`, get back raw response text. Kept
/// provider-agnostic so the aggregator's fallback loop doesn't need to
/// know about any one vendor's request/response shape.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn analyze(&self, prompt: &str) -> Result<String>;
}

/// HTTP-backed provider shared by all three adapters; only the request
/// body shape and endpoint URL differ per [`ProviderKind`].
pub struct HttpProvider {
    client: Client,
    config: ProviderConfig,
}

impl HttpProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("NetGuard-Pro-AI-Aggregator/0.1.0")
            .build()
            .map_err(|e| Error::AiDispatch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        match self.config.kind {
            ProviderKind::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.config.model
            ),
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1/chat/completions".to_string(),
        }
    }

    fn body(&self, prompt: &str) -> Value {
        match self.config.kind {
            ProviderKind::Gemini => json!({
                "contents": [{"parts": [{"text": format!("{SYSTEM_PREAMBLE}\n\n{prompt}")}]}],
                "generationConfig": {"temperature": 0.3, "maxOutputTokens": 4096},
            }),
            ProviderKind::Groq => json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PREAMBLE},
                    {"role": "user", "content": prompt},
                ],
                "temperature": 0.3,
                "max_tokens": 4096,
                "response_format": {"type": "json_object"},
            }),
            ProviderKind::OpenRouter => json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PREAMBLE},
                    {"role": "user", "content": prompt},
                ],
                "temperature": 0.3,
                "max_tokens": 4096,
            }),
        }
    }

    fn extract_text(&self, body: &Value) -> Result<String> {
        let text = match self.config.kind {
            ProviderKind::Gemini => body
                .pointer("/candidates/0/content/parts/0/text")
                .and_then(Value::as_str),
            ProviderKind::Groq | ProviderKind::OpenRouter => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str),
        };
        text.map(str::to_string)
            .ok_or_else(|| Error::AiDispatch(format!("{}: unexpected response shape", self.config.name)))
    }
}

#[async_trait]
impl AiProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn analyze(&self, prompt: &str) -> Result<String> {
        let mut request = self.client.post(self.endpoint()).json(&self.body(prompt));

        request = match self.config.kind {
            ProviderKind::Gemini => {
                let key = self
                    .config
                    .api_key
                    .as_deref()
                    .ok_or_else(|| Error::AiDispatch("missing API key".to_string()))?;
                request.query(&[("key", key)])
            }
            ProviderKind::Groq | ProviderKind::OpenRouter => {
                let key = self
                    .config
                    .api_key
                    .as_deref()
                    .ok_or_else(|| Error::AiDispatch("missing API key".to_string()))?;
                request.header("Authorization", format!("Bearer {key}"))
            }
        };

        debug!(provider = %self.config.name, "dispatching AI analysis request");

        let response = request
            .send()
            .await
            .map_err(|e| Error::AiDispatch(format!("{}: request failed: {e}", self.config.name)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AiDispatch(format!(
                "{}: HTTP {status}: {body}",
                self.config.name
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::AiDispatch(format!("{}: failed to parse response: {e}", self.config.name)))?;

        self.extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_keys_are_treated_as_absent() {
        let cfg = ProviderConfig {
            name: "Gemini".to_string(),
            kind: ProviderKind::Gemini,
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: Some("YOUR_GEMINI_KEY_HERE".to_string()),
        };
        assert!(!cfg.has_key());
    }

    #[test]
    fn real_key_is_usable() {
        let cfg = ProviderConfig {
            name: "Groq".to_string(),
            kind: ProviderKind::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: Some("gsk_real_key".to_string()),
        };
        assert!(cfg.has_key());
    }

    #[test]
    fn missing_key_is_absent() {
        let cfg = ProviderConfig {
            name: "OpenRouter".to_string(),
            kind: ProviderKind::OpenRouter,
            model: "deepseek/deepseek-r1".to_string(),
            api_key: None,
        };
        assert!(!cfg.has_key());
    }

    #[test]
    fn default_chain_is_priority_ordered() {
        let chain = default_chain(None, None, None);
        assert_eq!(chain[0].kind, ProviderKind::Gemini);
        assert_eq!(chain[1].kind, ProviderKind::Groq);
        assert_eq!(chain[2].kind, ProviderKind::OpenRouter);
    }

    #[test]
    fn groq_response_text_is_extracted_from_the_chat_completion_shape() {
        let provider = HttpProvider::new(ProviderConfig {
            name: "Groq".to_string(),
            kind: ProviderKind::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: Some("key".to_string()),
        })
        .unwrap();
        let body = json!({"choices": [{"message": {"content": "{\"threat_level\":\"LOW\"}"}}]});
        let text = provider.extract_text(&body).unwrap();
        assert_eq!(text, "{\"threat_level\":\"LOW\"}");
    }

    #[test]
    fn gemini_response_text_is_extracted_from_the_candidates_shape() {
        let provider = HttpProvider::new(ProviderConfig {
            name: "Gemini".to_string(),
            kind: ProviderKind::Gemini,
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: Some("key".to_string()),
        })
        .unwrap();
        let body = json!({"candidates": [{"content": {"parts": [{"text": "{\"threat_level\":\"LOW\"}"}]}}]});
        let text = provider.extract_text(&body).unwrap();
        assert_eq!(text, "{\"threat_level\":\"LOW\"}");
    }
}
