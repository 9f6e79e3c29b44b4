use thiserror::Error;

use crate::schema::ValidationError;

/// Failures talking to an LLM or search provider.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{provider} credential missing: set {env_var}")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },
    #[error("provider `{0}` is not supported")]
    UnsupportedProvider(String),
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },
    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("{provider} response malformed: {message}")]
    MalformedResponse { provider: String, message: String },
}

impl TransportError {
    pub(crate) fn request(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::Request {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Error surfaced by every LLM-backed workflow: either the call failed or the
/// reply could not be normalized.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("response failed validation: {0}")]
    Validation(#[from] ValidationError),
}

impl ExtractionError {
    /// The validation failure, if this error came from the normalizer.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transport(_) => None,
        }
    }
}
