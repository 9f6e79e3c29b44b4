pub mod auditor;
pub mod batch;
pub mod config;
pub mod error;
pub mod llm;
pub mod report;
pub mod research;
pub mod schema;
pub mod search;

pub use auditor::{Auditor, ComparisonEngine, HallucinationChecker, FALLBACK_SUMMARY};
pub use batch::{load_client_list, run_batch, BatchFailure, BatchSummary, ClientRecord};
pub use config::{AgencyConfig, AgencyWorkspace, PathSettings, LOG_ROTATE_BYTES};
pub use error::{ExtractionError, TransportError};
pub use llm::{
    build_client, ChatRequest, LlmClient, LlmReply, LlmSettings, ProviderKind, ResponseFormat,
};
pub use report::{
    FileReportRenderer, OutputFormat, RenderPayload, ReportRenderer, VisibilityBand,
};
pub use research::CompetitorResearcher;
pub use schema::{
    AuditReport, Citation, ComparisonReport, CompetitorAnalysis, CompetitorMetrics,
    HallucinationFinding, RawRecord, Sentiment, Severity, ValidationError,
};
pub use search::{PerplexitySearch, SearchProvider, SearchSettings};

/// Cap `input` at `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}
