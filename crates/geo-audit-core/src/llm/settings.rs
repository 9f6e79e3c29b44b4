use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Supported chat-completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Anthropic,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Anthropic => "anthropic",
        }
    }

    /// Provider-native variable consulted when no key is configured explicitly.
    pub fn key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Groq => "https://api.groq.com/openai",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Groq => "llama-3.3-70b-versatile",
            Self::Anthropic => "claude-3-5-sonnet-latest",
        }
    }
}

/// Connection settings for one LLM provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub api_version: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            endpoint: None,
            model: None,
            timeout_secs: None,
            max_retries: 2,
            api_version: None,
        }
    }
}

impl LlmSettings {
    pub const PREFIX: &'static str = "GEO_AUDIT";
    pub const RESEARCH_PREFIX: &'static str = "GEO_AUDIT_RESEARCH";

    /// Load settings from the process environment.
    ///
    /// * `GEO_AUDIT_PROVIDER`: `openai` (default), `groq` or `anthropic`.
    /// * `GEO_AUDIT_API_KEY`: API key; falls back to the provider-native
    ///   variable (`OPENAI_API_KEY`, `GROQ_API_KEY`, `ANTHROPIC_API_KEY`).
    /// * `GEO_AUDIT_ENDPOINT`: Optional custom base URL.
    /// * `GEO_AUDIT_MODEL`: Model identifier (`OPENAI_MODEL` also honoured).
    pub fn from_env() -> Self {
        Self::from_map(&std::env::vars().collect(), Self::PREFIX)
    }

    pub fn from_map(vars: &HashMap<String, String>, prefix: &str) -> Self {
        let mut settings = Self::default();
        settings.apply_env(vars, prefix);
        settings
    }

    /// Overlay any `<prefix>_*` variables present in `vars` onto these settings.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>, prefix: &str) {
        let get = |suffix: &str| {
            vars.get(&format!("{prefix}_{suffix}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(provider) = get("PROVIDER") {
            self.provider = provider;
        }
        if let Some(api_key) = get("API_KEY") {
            self.api_key = api_key;
        }
        if let Some(endpoint) = get("ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        let model = get("MODEL").or_else(|| {
            (prefix == Self::PREFIX && self.model.is_none())
                .then(|| vars.get("OPENAI_MODEL").cloned())
                .flatten()
                .filter(|value| !value.trim().is_empty())
        });
        if let Some(model) = model {
            self.model = Some(model);
        }
        if let Some(timeout) = get("TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.timeout_secs = Some(timeout);
        }
        if let Some(retries) = get("MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            self.max_retries = retries;
        }
        if let Some(version) = get("API_VERSION") {
            self.api_version = Some(version);
        }

        if self.api_key.trim().is_empty() {
            if let Some(kind) = ProviderKind::parse(&self.provider) {
                if let Some(key) = vars.get(kind.key_env()).filter(|v| !v.trim().is_empty()) {
                    self.api_key = key.trim().to_string();
                }
            }
        }
    }

    pub fn kind(&self) -> Result<ProviderKind, TransportError> {
        ProviderKind::parse(&self.provider)
            .ok_or_else(|| TransportError::UnsupportedProvider(self.provider.clone()))
    }

    /// Configured model, or the provider's default.
    pub fn model_id(&self) -> String {
        self.model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .or_else(|| {
                ProviderKind::parse(&self.provider).map(|kind| kind.default_model().to_string())
            })
            .unwrap_or_else(|| ProviderKind::OpenAi.default_model().to_string())
    }

    pub(crate) fn require_api_key(&self, kind: ProviderKind) -> Result<&str, TransportError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(TransportError::MissingCredential {
                provider: kind.label().to_string(),
                env_var: kind.key_env(),
            });
        }
        Ok(key)
    }
}
