mod openai;
mod rig_adapter;
mod scripted;
mod settings;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::TransportError;
use crate::schema::{decode::decode_json, ValidationError};

pub use openai::OpenAiClient;
pub use rig_adapter::RigLlmClient;
pub use scripted::ScriptedLlmClient;
pub use settings::{LlmSettings, ProviderKind};

/// How the provider is asked to shape its answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResponseFormat {
    /// Free-form JSON object; the reply comes back as text.
    JsonObject,
    /// Schema-guided output; providers that support it return a decoded value.
    JsonSchema { name: String, schema: Value },
}

/// One chat-style request: system instruction, user instruction, model, format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub format: ResponseFormat,
}

/// What a transport hands back: raw text or an already-decoded JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    Text(String),
    Structured(Value),
}

impl LlmReply {
    /// Single decode point feeding the normalizers, whichever mode produced the reply.
    pub fn into_json(self) -> Result<Value, ValidationError> {
        match self {
            Self::Text(text) => decode_json(&text),
            Self::Structured(value) => Ok(value),
        }
    }
}

/// Client abstraction over chat-completion providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short provider label used in logs and errors.
    fn provider(&self) -> &str;

    /// Send one request and return the provider's reply.
    async fn complete(&self, request: &ChatRequest) -> Result<LlmReply, TransportError>;
}

/// Build the transport matching `settings.provider`.
pub fn build_client(settings: &LlmSettings) -> Result<Box<dyn LlmClient>, TransportError> {
    match settings.kind()? {
        ProviderKind::OpenAi | ProviderKind::Groq => Ok(Box::new(OpenAiClient::new(settings)?)),
        ProviderKind::Anthropic => Ok(Box::new(RigLlmClient::new_anthropic(settings)?)),
    }
}
