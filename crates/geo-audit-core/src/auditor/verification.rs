use std::sync::Arc;

use tracing::{info, instrument};

use super::prompts;
use crate::error::ExtractionError;
use crate::llm::{ChatRequest, LlmClient, ResponseFormat};
use crate::schema::normalize::normalize_findings;
use crate::schema::HallucinationFinding;

/// Flags discrepancies between an AI statement and supplied ground truth.
#[derive(Clone)]
pub struct HallucinationChecker {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl HallucinationChecker {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Advisory check. An empty list means no discrepancies were found.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        ai_statement: &str,
        ground_truth: &str,
    ) -> Result<Vec<HallucinationFinding>, ExtractionError> {
        let request = ChatRequest {
            system: prompts::VERIFICATION_SYSTEM_PROMPT.to_string(),
            user: prompts::verification_user_prompt(ai_statement, ground_truth),
            model: self.model.clone(),
            format: ResponseFormat::JsonObject,
        };
        let reply = self.client.complete(&request).await?;
        let findings = normalize_findings(&reply.into_json()?)?;
        info!(findings = findings.len(), "verification complete");
        Ok(findings)
    }
}
