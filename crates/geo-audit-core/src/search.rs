//! Live web research used to ground competitor analysis.
//!
//! Research is best-effort: a missing credential or a failed call is logged
//! and reported as `None` rather than failing the caller.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai";
const DEFAULT_MODEL: &str = "sonar-pro";
const SYSTEM_PROMPT: &str = "You are a GEO Researcher. Provide raw, cited search data.";

/// Free-text query in, raw cited findings out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Option<String>;
}

/// Search provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl SearchSettings {
    pub const API_KEY_ENV: &'static str = "PERPLEXITY_API_KEY";
    const ENDPOINT_ENV: &'static str = "GEO_AUDIT_SEARCH_ENDPOINT";
    const MODEL_ENV: &'static str = "GEO_AUDIT_SEARCH_MODEL";

    pub fn apply_env(&mut self, vars: &HashMap<String, String>) {
        let get = |name: &str| {
            vars.get(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(key) = get(Self::API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = get(Self::ENDPOINT_ENV) {
            self.endpoint = Some(endpoint);
        }
        if let Some(model) = get(Self::MODEL_ENV) {
            self.model = Some(model);
        }
    }
}

/// Perplexity chat-completions search.
#[derive(Debug, Clone)]
pub struct PerplexitySearch {
    http: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl PerplexitySearch {
    pub fn new(settings: &SearchSettings) -> anyhow::Result<Self> {
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let http = Client::builder()
            .user_agent(concat!("geo-audit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(90)))
            .build()?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key: settings
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn call(&self, api_key: &str, query: &str) -> anyhow::Result<String> {
        let payload = SearchRequest {
            model: &self.model,
            messages: vec![
                SearchMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                SearchMessage {
                    role: "user",
                    content: query,
                },
            ],
            temperature: 0.2,
        };
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResponse = response.json().await?;
        body.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("search response missing message content"))
    }
}

#[async_trait]
impl SearchProvider for PerplexitySearch {
    async fn search(&self, query: &str) -> Option<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            error!(
                "Perplexity API key missing; set {}",
                SearchSettings::API_KEY_ENV
            );
            return None;
        };
        info!(query = %crate::truncate(query, 120), "running live search");
        match self.call(api_key, query).await {
            Ok(content) => Some(content),
            Err(err) => {
                error!(error = %format!("{err:#}"), "search failed");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    model: &'a str,
    messages: Vec<SearchMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct SearchMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    choices: Vec<SearchChoice>,
}

#[derive(Deserialize)]
struct SearchChoice {
    message: SearchResponseMessage,
}

#[derive(Deserialize)]
struct SearchResponseMessage {
    content: Option<String>,
}
