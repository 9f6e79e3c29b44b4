use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::prompts;
use crate::error::ExtractionError;
use crate::llm::{ChatRequest, LlmClient, ResponseFormat};
use crate::schema::normalize::normalize_comparison_summary;
use crate::schema::{AuditReport, ComparisonReport};

/// Narrative used when the provider returns no usable verdict.
pub const FALLBACK_SUMMARY: &str = "Comparison complete.";

/// Builds a [`ComparisonReport`] from two finished audits. The LLM only writes
/// `winner_summary`; both audits are moved into the result untouched.
#[derive(Clone)]
pub struct ComparisonEngine {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl ComparisonEngine {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Only a transport failure is fatal; a missing or undecodable narrative
    /// falls back to [`FALLBACK_SUMMARY`].
    #[instrument(skip_all, fields(brand_a = %report_a.brand_name, brand_b = %report_b.brand_name))]
    pub async fn compare(
        &self,
        report_a: AuditReport,
        report_b: AuditReport,
        niche: &str,
    ) -> Result<ComparisonReport, ExtractionError> {
        let request = ChatRequest {
            system: prompts::COMPARISON_SYSTEM_PROMPT.to_string(),
            user: prompts::comparison_user_prompt(&report_a, &report_b, niche),
            model: self.model.clone(),
            format: ResponseFormat::JsonObject,
        };
        let reply = self.client.complete(&request).await?;

        let summary = match reply.into_json() {
            Ok(value) => normalize_comparison_summary(&value),
            Err(err) => {
                warn!(error = %err, "comparison reply was not JSON");
                None
            }
        }
        .unwrap_or_else(|| {
            warn!("comparison narrative missing; using fallback summary");
            FALLBACK_SUMMARY.to_string()
        });

        info!("comparison assembled");
        Ok(ComparisonReport::new(report_a, report_b, niche, summary))
    }
}
