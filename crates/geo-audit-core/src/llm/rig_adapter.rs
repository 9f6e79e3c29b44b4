use std::time::Duration;

use super::{ChatRequest, LlmClient, LlmReply, LlmSettings, ProviderKind, ResponseFormat};
use crate::error::TransportError;
use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::message::AssistantContent;
use rig::completion::CompletionModelDyn;
use rig::providers::anthropic;
use rig::OneOrMany;
use tokio::time::{sleep, timeout};

const MAX_OUTPUT_TOKENS: u64 = 2048;
const TEMPERATURE: f64 = 0.2;

/// Anthropic transport backed by `rig`. The messages API has no JSON response
/// mode, so the requested format is spelled out in the preamble instead.
///
/// Each attempt is bounded by `timeout_secs` and failed attempts are retried
/// `max_retries` times with exponential backoff.
pub struct RigLlmClient {
    client: anthropic::Client,
    provider_label: &'static str,
    max_tokens: u64,
    timeout: Duration,
    max_retries: u32,
}

impl RigLlmClient {
    pub fn new_anthropic(settings: &LlmSettings) -> Result<Self, TransportError> {
        let kind = ProviderKind::Anthropic;
        let api_key = settings.require_api_key(kind)?;

        let mut builder = anthropic::ClientBuilder::new(api_key);
        if let Some(endpoint) = settings.endpoint.as_deref() {
            builder = builder.base_url(endpoint);
        }
        if let Some(version) = settings.api_version.as_deref() {
            builder = builder.anthropic_version(version);
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::request(kind.label(), err))?;

        Ok(Self {
            client,
            provider_label: kind.label(),
            max_tokens: MAX_OUTPUT_TOKENS,
            timeout: Duration::from_secs(settings.timeout_secs.unwrap_or(60)),
            max_retries: settings.max_retries,
        })
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<LlmReply, TransportError> {
        let model: Box<dyn CompletionModelDyn + Send + Sync> =
            Box::new(self.client.completion_model(&request.model));

        let completion = model
            .completion_request(request.user.clone().into())
            .preamble(preamble_for(request))
            .max_tokens(self.max_tokens)
            .temperature(TEMPERATURE)
            .build();

        let response = model.completion(completion).await.map_err(|err| {
            TransportError::request(
                self.provider_label,
                format!("completion failed for model {}: {err}", request.model),
            )
        })?;

        let content = text_from_choice(response.choice);
        if content.is_empty() {
            return Err(TransportError::malformed(
                self.provider_label,
                "response did not include textual content",
            ));
        }
        Ok(LlmReply::Text(content))
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    fn provider(&self) -> &str {
        self.provider_label
    }

    async fn complete(&self, request: &ChatRequest) -> Result<LlmReply, TransportError> {
        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let outcome = match timeout(self.timeout, self.attempt(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::request(
                    self.provider_label,
                    format!("request timed out after {}s", self.timeout.as_secs()),
                )),
            };
            match outcome {
                Err(err @ TransportError::Request { .. }) if attempt < self.max_retries => {
                    tracing::debug!(provider = self.provider_label, attempt, error = %err, "retrying completion");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn preamble_for(request: &ChatRequest) -> String {
    match &request.format {
        ResponseFormat::JsonObject => format!(
            "{}\n\nRespond with a single JSON object and nothing else.",
            request.system
        ),
        ResponseFormat::JsonSchema { schema, .. } => format!(
            "{}\n\nRespond with a single JSON object that validates against this JSON Schema and nothing else:\n{}",
            request.system, schema
        ),
    }
}

fn text_from_choice(choice: OneOrMany<AssistantContent>) -> String {
    #[allow(unreachable_patterns)]
    let segments = choice
        .into_iter()
        .filter_map(|segment| match segment {
            AssistantContent::Text(text) => Some(text.text),
            AssistantContent::ToolCall(tool) => {
                serde_json::to_string(&tool.function.arguments).ok()
            }
            _ => None,
        })
        .filter(|value| !value.trim().is_empty())
        .collect::<Vec<_>>();
    segments.join("\n").trim().to_string()
}
