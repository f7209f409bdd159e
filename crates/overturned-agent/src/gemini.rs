use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use overturned_core::{
    agent::ModelBackend,
    config::Config,
    types::{GenerateRequest, ModelReply},
};
use tracing::{info, warn};

use crate::wire::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};

/// Calls the Gemini `generateContent` REST endpoint.
///
/// Every call is single-turn: the prompt and inline files go out as one user
/// content entry and no history is kept between calls.
pub struct GeminiBackend {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl GeminiBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: 300,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.gemini_base_url, &config.api_key).with_timeout(config.request_timeout_s)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
        let model = request.profile.model.clone();
        let body = GenerateContentRequest::from(&request);
        let url = self.endpoint(&model);

        info!(
            model = %model,
            search = request.profile.search,
            thinking_budget = ?request.profile.thinking_budget,
            files = request.files.len(),
            "calling gemini generateContent"
        );

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()?;

        let response = match client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(model = %model, timeout_secs = self.timeout_secs, "gemini request timed out");
                bail!("Gemini request timed out after {}s", self.timeout_secs);
            },
            Err(e) => {
                warn!(model = %model, "gemini request failed: {}", e);
                return Err(e).context("Gemini request failed");
            },
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| format!("{} {}", env.error.status, env.error.message))
                .unwrap_or(body);
            warn!(model = %model, status = %status, "gemini returned non-200: {}", message);
            bail!("Gemini error {}: {}", status, message.trim());
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("failed to parse Gemini response")?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!(model = %model, reason = %reason, "gemini blocked the prompt");
            bail!("Gemini blocked the prompt: {reason}");
        }

        let Some(text) = parsed.text() else {
            bail!("Gemini response contained no answer");
        };
        let sources = parsed.sources();

        info!(
            model = %model,
            output_len = text.len(),
            sources = sources.as_ref().map_or(0, Vec::len),
            "gemini response received"
        );

        Ok(ModelReply { text, sources })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
