//! [`Translator`] backed by an OpenAI-compatible `/completions` endpoint.

use anyhow::{Context, anyhow};
use async_openai::types::chat::CompletionFinishReason;
use async_openai::types::completions::CreateCompletionResponse;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Credential, TranslationOutcome, Translator, build_prompt, classify_completion};
use crate::config::CompletionsConfig;

/// Makes sure a url has a trailing slash, so `join` appends instead of replacing the last segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let path = format!("{}/", new_url.path());
        new_url.set_path(&path);
        new_url
    }
}

/// A `length` finish reason, or usage at the token cap when the provider omits the reason.
fn is_truncated(finish_reason: Option<CompletionFinishReason>, completion_tokens: Option<u32>, max_tokens: u32) -> bool {
    finish_reason == Some(CompletionFinishReason::Length) || completion_tokens.is_some_and(|tokens| tokens >= max_tokens)
}

pub struct OpenAiTranslator {
    client: Client,
    completions_url: Url,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiTranslator {
    pub fn new(config: &CompletionsConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        let completions_url = ensure_slash(&config.base_url)
            .join("completions")
            .context("Failed to construct completions URL")?;

        Ok(Self {
            client,
            completions_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// One request to the completion endpoint, returning the text of the first choice.
    async fn complete(&self, credential: &Credential, prompt: String) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!(url = %self.completions_url, model = %self.model, "Requesting completion");

        let response = self
            .client
            .post(self.completions_url.clone())
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .context("request to the completion service failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion service returned {status}: {body}"));
        }

        let body_text = response.text().await.context("failed to read completion response")?;
        let parsed: CreateCompletionResponse =
            serde_json::from_str(&body_text).context("failed to parse completion response")?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }
        let completion_tokens = parsed.usage.as_ref().map(|usage| usage.completion_tokens);

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("completion response contained no choices"))?;
        debug!(finish_reason = ?choice.finish_reason, "Completion received");

        if is_truncated(choice.finish_reason, completion_tokens, self.max_tokens) {
            warn!(max_tokens = self.max_tokens, "Completion hit the token limit, translation may be truncated");
        }

        Ok(choice.text)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    #[instrument(skip_all, fields(source_len = source.len()))]
    async fn translate(&self, credential: &Credential, source: &str) -> TranslationOutcome {
        match self.complete(credential, build_prompt(source)).await {
            Ok(text) => classify_completion(&text),
            Err(e) => {
                warn!("Translation request failed: {e:#}");
                TranslationOutcome::failed(format!("{e:#}"))
            }
        }
    }
}
