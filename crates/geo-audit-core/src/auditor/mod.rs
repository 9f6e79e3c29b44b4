//! LLM-backed workflows: single-brand audit, head-to-head comparison and
//! ground-truth verification. Each call builds its request from scratch, so
//! one instance can serve a whole batch or be shared across tasks.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::ExtractionError;
use crate::llm::{ChatRequest, LlmClient, ResponseFormat};
use crate::schema::normalize::normalize_audit;
use crate::schema::AuditReport;

mod comparison;
pub mod prompts;
mod verification;

pub use comparison::{ComparisonEngine, FALLBACK_SUMMARY};
pub use verification::HallucinationChecker;

/// Structured-extraction client producing one [`AuditReport`] per call.
#[derive(Clone)]
pub struct Auditor {
    client: Arc<dyn LlmClient>,
    model: String,
    schema_mode: bool,
}

impl Auditor {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            schema_mode: false,
        }
    }

    /// Ask for schema-guided output instead of a free-form JSON object.
    pub fn with_schema_mode(mut self, enabled: bool) -> Self {
        self.schema_mode = enabled;
        self
    }

    fn format(&self) -> ResponseFormat {
        if self.schema_mode {
            ResponseFormat::JsonSchema {
                name: "audit_report".to_string(),
                schema: prompts::audit_schema(),
            }
        } else {
            ResponseFormat::JsonObject
        }
    }

    /// Audit `brand` within `niche`. Transport and validation failures are
    /// returned to the caller, which decides whether they are fatal.
    #[instrument(skip(self))]
    pub async fn audit(&self, brand: &str, niche: &str) -> Result<AuditReport, ExtractionError> {
        let request = ChatRequest {
            system: prompts::AUDIT_SYSTEM_PROMPT.to_string(),
            user: prompts::audit_user_prompt(brand, niche),
            model: self.model.clone(),
            format: self.format(),
        };
        info!(provider = self.client.provider(), model = %self.model, "requesting audit");

        let reply = self.client.complete(&request).await?;
        let report = normalize_audit(&reply.into_json()?)?;

        info!(
            brand = %report.brand_name,
            score = report.visibility_score,
            citations = report.citations.len(),
            "audit normalized"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::llm::{LlmReply, ScriptedLlmClient};
    use crate::schema::ValidationError;
    use serde_json::json;

    #[tokio::test(flavor = "current_thread")]
    async fn audit_normalizes_aliased_reply() {
        let client = Arc::new(ScriptedLlmClient::with_texts([json!({
            "company": "Acme",
            "rating": 73,
            "citations": [],
            "suggestions": ["a", "b", "c"]
        })
        .to_string()]));
        let auditor = Auditor::new(client.clone(), "gpt-test");

        let report = auditor.audit("Acme", "CRM").await.unwrap();
        assert_eq!(report.brand_name, "Acme");
        assert_eq!(report.visibility_score, 73.0);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-test");
        assert_eq!(requests[0].format, ResponseFormat::JsonObject);
        assert!(requests[0].user.contains("\"CRM\""));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn schema_mode_accepts_structured_reply() {
        let client = Arc::new(ScriptedLlmClient::with_replies([Ok(LlmReply::Structured(
            json!({
                "brand_name": "Acme",
                "visibility_score": 12.5,
                "citations": [],
                "hallucinations": [],
                "recommendations": ["Publish comparison pages"]
            }),
        ))]));
        let auditor = Auditor::new(client.clone(), "gpt-test").with_schema_mode(true);

        let report = auditor.audit("Acme", "CRM").await.unwrap();
        assert_eq!(report.hallucinations, Some(Vec::new()));
        assert!(matches!(
            client.requests()[0].format,
            ResponseFormat::JsonSchema { ref name, .. } if name == "audit_report"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn audit_surfaces_validation_errors() {
        let client = Arc::new(ScriptedLlmClient::with_texts([
            r#"{"brand_name": "Acme", "visibility_score": 180, "citations": [], "recommendations": ["x"]}"#,
        ]));
        let err = Auditor::new(client, "gpt-test")
            .audit("Acme", "CRM")
            .await
            .expect_err("score above 100 must fail");
        assert!(matches!(
            err.validation(),
            Some(ValidationError::Range { field, .. }) if field == "visibility_score"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn audit_surfaces_transport_errors() {
        let client = Arc::new(ScriptedLlmClient::with_replies([Err(
            TransportError::Status {
                provider: "openai".into(),
                status: 500,
                body: "boom".into(),
            },
        )]));
        let err = Auditor::new(client, "gpt-test")
            .audit("Acme", "CRM")
            .await
            .expect_err("transport failure must propagate");
        assert!(matches!(err, ExtractionError::Transport(_)));
    }
}
