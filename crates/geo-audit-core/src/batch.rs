//! Sequential multi-brand audits with isolate-and-continue error handling.

use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auditor::Auditor;
use crate::config::AgencyWorkspace;
use crate::report::{RenderPayload, ReportRenderer};

const MAX_REASON_CHARS: usize = 160;

/// One entry of the persisted client list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub brand_name: String,
    pub niche: String,
}

/// Read a JSON array of [`ClientRecord`]s from the workspace `data/` directory.
pub fn load_client_list(workspace: &AgencyWorkspace, file_name: &str) -> Result<Vec<ClientRecord>> {
    let path = workspace.data_dir().join(file_name);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read client list at {}", path.display()))?;
    let records: Vec<ClientRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid client list structure in {}", path.display()))?;
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub brand_name: String,
    pub reason: String,
}

/// Final tally of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

/// Audit and render every record in order. A failed extraction or render is
/// recorded against its brand and the loop moves on; the batch itself never fails.
pub async fn run_batch(
    auditor: &Auditor,
    renderer: &dyn ReportRenderer,
    records: &[ClientRecord],
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for record in records {
        info!(brand = %record.brand_name, niche = %record.niche, "processing client");
        let outcome = match auditor.audit(&record.brand_name, &record.niche).await {
            Ok(report) => renderer
                .render_audit(&RenderPayload::from(&report).with_report_key(&record.brand_name))
                .await
                .map_err(|err| format!("{err:#}")),
            Err(err) => Err(err.to_string()),
        };
        match outcome {
            Ok(path) => {
                info!(brand = %record.brand_name, path = %path.display(), "client report complete");
                summary.succeeded += 1;
            }
            Err(reason) => {
                let reason = crate::truncate(&reason, MAX_REASON_CHARS);
                error!(brand = %record.brand_name, %reason, "client failed");
                summary.failed.push(BatchFailure {
                    brand_name: record.brand_name.clone(),
                    reason,
                });
            }
        }
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "batch complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgencyConfig;
    use crate::llm::{ChatRequest, LlmReply, ScriptedLlmClient};
    use crate::report::{FileReportRenderer, OutputFormat};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn workspace(dir: &std::path::Path) -> AgencyWorkspace {
        let mut config = AgencyConfig::default();
        config.paths.base_dir = dir.to_path_buf();
        config.initialize().unwrap()
    }

    fn brand_from(request: &ChatRequest) -> String {
        request
            .user
            .split('"')
            .nth(1)
            .unwrap_or_default()
            .to_string()
    }

    fn auditor_failing_on(bad_brand: &'static str) -> Auditor {
        let client = ScriptedLlmClient::from_fn(move |request| {
            let brand = brand_from(request);
            let score = if brand == bad_brand { 250 } else { 64 };
            Ok(LlmReply::Text(
                json!({
                    "brand_name": brand,
                    "visibility_score": score,
                    "citations": [],
                    "recommendations": ["Earn reviews"]
                })
                .to_string(),
            ))
        });
        Auditor::new(Arc::new(client), "gpt-test")
    }

    fn records(names: &[&str]) -> Vec<ClientRecord> {
        names
            .iter()
            .map(|name| ClientRecord {
                brand_name: name.to_string(),
                niche: "CRM".into(),
            })
            .collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn one_bad_brand_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path());
        let renderer = FileReportRenderer::new(&workspace, OutputFormat::Json);
        let auditor = auditor_failing_on("Beta");

        let summary = run_batch(&auditor, &renderer, &records(&["Alpha", "Beta", "Gamma"])).await;
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].brand_name, "Beta");
        assert!(summary.failed[0].reason.contains("visibility_score"));
        assert!(workspace.reports_dir().join("Alpha_GEO_Audit.json").exists());
        assert!(workspace.reports_dir().join("Gamma_GEO_Audit.json").exists());
        assert!(!workspace.reports_dir().join("Beta_GEO_Audit.json").exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn report_file_follows_requested_brand_not_echoed_name() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path());
        let renderer = FileReportRenderer::new(&workspace, OutputFormat::Json);
        let client = ScriptedLlmClient::from_fn(|request| {
            let echoed = format!("{} Inc.", brand_from(request));
            Ok(LlmReply::Text(
                json!({
                    "brand_name": echoed,
                    "visibility_score": 70,
                    "citations": [],
                    "recommendations": ["Earn reviews"]
                })
                .to_string(),
            ))
        });
        let auditor = Auditor::new(Arc::new(client), "gpt-test");

        let summary = run_batch(&auditor, &renderer, &records(&["Acme"])).await;
        assert_eq!(summary.succeeded, 1);
        let path = workspace.reports_dir().join("Acme_GEO_Audit.json");
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["brand_name"], "Acme Inc.");
        assert!(!workspace.reports_dir().join("Acme_Inc._GEO_Audit.json").exists());
    }

    struct FailingRenderer;

    #[async_trait]
    impl ReportRenderer for FailingRenderer {
        async fn render_audit(&self, _payload: &RenderPayload) -> Result<PathBuf> {
            Err(anyhow::anyhow!("{}", "disk full ".repeat(40)))
        }

        async fn render_battle(
            &self,
            _a: &RenderPayload,
            _b: &RenderPayload,
            _niche: &str,
            _summary: &str,
        ) -> Result<PathBuf> {
            unreachable!("batch never renders battles")
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn render_failures_are_recorded_and_truncated() {
        let auditor = auditor_failing_on("nobody");
        let summary = run_batch(&auditor, &FailingRenderer, &records(&["Alpha", "Beta"])).await;
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed.len(), 2);
        let reason = &summary.failed[0].reason;
        assert_eq!(reason.chars().count(), MAX_REASON_CHARS + 1);
        assert!(reason.ends_with('…'));
    }

    #[test]
    fn client_list_is_read_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path());
        fs::write(
            workspace.data_dir().join("clients.json"),
            r#"[{"brand_name": "Acme", "niche": "CRM"}, {"brand_name": "Zed", "niche": "ERP"}]"#,
        )
        .unwrap();

        let records = load_client_list(&workspace, "clients.json").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].niche, "ERP");
    }

    #[test]
    fn missing_client_list_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace(dir.path());
        let err = load_client_list(&workspace, "absent.json").unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }
}
