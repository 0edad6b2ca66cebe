//! OpenAI-compatible chat completion backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use triage::backend::{BackendError, FixBackend, FixRequest, GeneratedFix};
use triage::prompt::{build_fix_prompt, parse_fix_response, SYSTEM_PROMPT};

/// Sampling temperature for fix generation.
const FIX_TEMPERATURE: f64 = 0.2;
/// Completion budget; a full test file plus explanation.
const FIX_MAX_TOKENS: u32 = 3000;

/// [`FixBackend`] that posts to `{base_url}/chat/completions`.
pub struct OpenAiBackend {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl FixBackend for OpenAiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_test_fix(&self, request: &FixRequest) -> Result<GeneratedFix, BackendError> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::NotConfigured);
        }

        let request_body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_fix_prompt(request)}
            ],
            "temperature": FIX_TEMPERATURE,
            "max_tokens": FIX_MAX_TOKENS
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(BackendError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BackendError::Parse("response has no message content".into()))?;
        let tokens_used = resp_json["usage"]["total_tokens"].as_u64().unwrap_or(0);

        let parsed = parse_fix_response(content);
        tracing::debug!(
            model = %self.model,
            tokens_used,
            file = %request.test_file,
            "received generated fix"
        );

        Ok(GeneratedFix {
            fixed_code: parsed.code,
            explanation: parsed.explanation,
            tokens_used,
        })
    }
}
