use super::{ChatRequest, LlmClient, LlmReply, LlmSettings, ResponseFormat};
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

/// OpenAI-compatible chat completions transport (OpenAI and Groq).
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    url: String,
    api_key: String,
    provider: &'static str,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, TransportError> {
        let kind = settings.kind()?;
        let api_key = settings.require_api_key(kind)?.to_string();
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| kind.default_endpoint().to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent(concat!("geo-audit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(60)))
            .build()
            .map_err(|err| TransportError::request(kind.label(), err))?;
        Ok(Self {
            http,
            url,
            api_key,
            provider: kind.label(),
            max_retries: settings.max_retries,
        })
    }

    fn payload(request: &ChatRequest) -> ChatCompletionRequest<'_> {
        let response_format = match &request.format {
            ResponseFormat::JsonObject => json!({ "type": "json_object" }),
            ResponseFormat::JsonSchema { name, schema } => json!({
                "type": "json_schema",
                "json_schema": { "name": name, "schema": schema, "strict": true }
            }),
        };
        ChatCompletionRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        self.provider
    }

    async fn complete(&self, request: &ChatRequest) -> Result<LlmReply, TransportError> {
        let payload = Self::payload(request);

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let response = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(TransportError::request(self.provider, err));
                    }
                    tracing::debug!(provider = self.provider, attempt, error = %err, "retrying chat completion");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let retryable = !status.is_client_error() || status.as_u16() == 429;
                if !retryable || attempt >= self.max_retries {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TransportError::Status {
                        provider: self.provider.to_string(),
                        status: status.as_u16(),
                        body: crate::truncate(&body, 500),
                    });
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
                attempt += 1;
                continue;
            }

            let chat: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|err| TransportError::malformed(self.provider, err.to_string()))?;
            let content = chat
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| {
                    TransportError::malformed(self.provider, "response missing message content")
                })?;

            return Ok(match request.format {
                ResponseFormat::JsonSchema { .. } => match serde_json::from_str::<Value>(&content) {
                    Ok(value) => LlmReply::Structured(value),
                    Err(_) => LlmReply::Text(content),
                },
                ResponseFormat::JsonObject => LlmReply::Text(content),
            });
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderKind;
    use httpmock::prelude::*;

    fn settings(endpoint: &str) -> LlmSettings {
        LlmSettings {
            provider: "openai".into(),
            api_key: "test-key".into(),
            endpoint: Some(endpoint.to_string()),
            model: Some("gpt-test".into()),
            timeout_secs: Some(5),
            max_retries: 0,
            api_version: None,
        }
    }

    fn request(format: ResponseFormat) -> ChatRequest {
        ChatRequest {
            system: "system".into(),
            user: "user".into(),
            model: "gpt-test".into(),
            format,
        }
    }

    fn completion(content: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[test]
    fn requires_api_key() {
        let mut settings = settings("http://localhost");
        settings.api_key.clear();
        let err = OpenAiClient::new(&settings).expect_err("missing key should error");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn groq_uses_its_default_endpoint() {
        let settings = LlmSettings {
            provider: "groq".into(),
            api_key: "gsk".into(),
            ..LlmSettings::default()
        };
        let client = OpenAiClient::new(&settings).unwrap();
        assert_eq!(client.url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(client.provider(), ProviderKind::Groq.label());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn json_object_mode_returns_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("Authorization", "Bearer test-key")
                    .json_body_partial(r#"{"response_format": {"type": "json_object"}}"#);
                then.status(200).json_body(completion("{\"brand\":\"Acme\"}"));
            })
            .await;

        let client = OpenAiClient::new(&settings(&server.base_url())).unwrap();
        let reply = client
            .complete(&request(ResponseFormat::JsonObject))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(reply, LlmReply::Text("{\"brand\":\"Acme\"}".into()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn schema_mode_returns_structured_value() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .json_body_partial(
                        r#"{"response_format": {"type": "json_schema", "json_schema": {"name": "audit_report", "strict": true}}}"#,
                    );
                then.status(200).json_body(completion("{\"score\": 12}"));
            })
            .await;

        let client = OpenAiClient::new(&settings(&server.base_url())).unwrap();
        let reply = client
            .complete(&request(ResponseFormat::JsonSchema {
                name: "audit_report".into(),
                schema: json!({"type": "object"}),
            }))
            .await
            .unwrap();
        assert_eq!(reply, LlmReply::Structured(json!({"score": 12})));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn non_success_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401).body("invalid api key");
            })
            .await;

        let client = OpenAiClient::new(&settings(&server.base_url())).unwrap();
        let err = client
            .complete(&request(ResponseFormat::JsonObject))
            .await
            .expect_err("401 should fail");
        assert!(matches!(
            err,
            TransportError::Status { status: 401, ref body, .. } if body.contains("invalid api key")
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn server_errors_are_retried() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;

        let mut settings = settings(&server.base_url());
        settings.max_retries = 2;
        let client = OpenAiClient::new(&settings).unwrap();
        let err = client
            .complete(&request(ResponseFormat::JsonObject))
            .await
            .expect_err("persistent 503 should fail");
        failing.assert_hits_async(3).await;
        assert!(matches!(err, TransportError::Status { status: 503, .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_content_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200)
                    .json_body(json!({"choices": [{"message": {"content": null}}]}));
            })
            .await;

        let client = OpenAiClient::new(&settings(&server.base_url())).unwrap();
        let err = client
            .complete(&request(ResponseFormat::JsonObject))
            .await
            .expect_err("missing content should fail");
        assert!(matches!(err, TransportError::MalformedResponse { .. }));
    }
}
