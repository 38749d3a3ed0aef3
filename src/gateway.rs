//! Thin client for an OpenAI-compatible chat-completions endpoint.
//!
//! Defaults target OpenRouter; any provider speaking the same wire shape
//! works by pointing `gateway.base_url` elsewhere. The API key comes from
//! the `OPENROUTER_API_KEY` environment variable and is never persisted.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub struct LlmGateway {
    config: GatewayConfig,
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl LlmGateway {
    /// Build from config, reading the API key from the environment.
    pub fn new(config: GatewayConfig) -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Self::with_api_key(config, api_key)
    }

    /// Build with an explicit key (or none), bypassing the environment.
    pub fn with_api_key(config: GatewayConfig, api_key: Option<String>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Whether a key is present. Callers use this to skip the network
    /// round-trip entirely when the gateway cannot possibly succeed.
    pub fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// One chat completion. No retries; the caller degrades on any error.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::NotConfigured(format!("{} is not set", API_KEY_ENV))
        })?;

        let model = self.config.resolved_model();
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(model = %model, url = %url, "calling gateway");

        let request = ChatRequest {
            model: &model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GatewayError::Malformed("response contained no message content".into()))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.ends_with("..."));
    }

    #[tokio::test]
    async fn test_without_key_is_not_configured() {
        let gateway = LlmGateway::with_api_key(GatewayConfig::default(), None);
        assert!(!gateway.configured());
        let err = gateway.complete("sys", "hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured(_)));
    }
}
