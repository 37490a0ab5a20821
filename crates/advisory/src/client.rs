use crate::parse::{parse_decision, parse_exit};
use crate::prompt::{entry_prompt, exit_prompt};
use crate::types::{GenerateRequest, GenerateResponse};
use async_trait::async_trait;
use auto_trade_core::{
    AdvisoryConfig, AdvisoryDecision, AdvisoryError, AdvisoryService, EntryRequest, ExitAdvice,
    ExitRequest,
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// [`AdvisoryService`] backed by the Gemini `generateContent` endpoint.
pub struct GeminiAdvisor {
    http_client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiAdvisor {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        model: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdvisoryError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdvisoryError::Http(e.to_string()))?;
        Ok(Self {
            http_client,
            endpoint: format!(
                "{}/models/{model}:generateContent",
                api_url.trim_end_matches('/')
            ),
            api_key: api_key.into(),
        })
    }

    /// `Ok(None)` when no API key is configured, which disables the gate.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &AdvisoryConfig) -> Result<Option<Self>, AdvisoryError> {
        let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        Self::new(
            &config.api_url,
            &config.model,
            key,
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }

    /// Sends one prompt and returns the model's text.
    async fn generate(&self, prompt: String) -> Result<String, AdvisoryError> {
        debug!(endpoint = %self.endpoint, "Advisory request");
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateRequest::json_prompt(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await.map_err(transport_error)?;
        body.first_text()
            .map(str::to_string)
            .ok_or(AdvisoryError::EmptyBody)
    }
}

fn transport_error(e: reqwest::Error) -> AdvisoryError {
    if e.is_timeout() {
        AdvisoryError::Timeout
    } else {
        AdvisoryError::Http(e.to_string())
    }
}

#[async_trait]
impl AdvisoryService for GeminiAdvisor {
    async fn approve(&self, request: &EntryRequest) -> Result<AdvisoryDecision, AdvisoryError> {
        let decision = match self.generate(entry_prompt(request)).await {
            Ok(text) => parse_decision(&text),
            Err(AdvisoryError::EmptyBody) => {
                warn!(instrument = %request.instrument_name, "Advisory returned no text");
                parse_decision("")
            }
            Err(e) => return Err(e),
        };
        info!(
            instrument = %request.instrument_name,
            direction = %request.direction,
            verdict = %decision.verdict,
            reason = %decision.reason,
            "Advisory entry decision"
        );
        Ok(decision)
    }

    async fn advise_exit(&self, request: &ExitRequest) -> Result<ExitAdvice, AdvisoryError> {
        let text = self.generate(exit_prompt(request)).await?;
        let advice = parse_exit(&text);
        debug!(instrument = %request.instrument_name, advice = ?advice, "Advisory exit advice");
        Ok(advice)
    }
}
