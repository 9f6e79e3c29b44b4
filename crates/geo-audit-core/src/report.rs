use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::AgencyWorkspace;
use crate::schema::fields::{
    FieldSpec, CITATION_CONTEXT, CITATION_SENTIMENT, CITATION_SOURCE, FINDING_CORRECTION,
    FINDING_FACT,
};
use crate::schema::{AuditReport, CompetitorAnalysis, CompetitorMetrics, RawRecord};

/// Format styles supported by the file renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Human => "txt",
            Self::Json => "json",
        }
    }
}

/// Headline status shown next to the visibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityBand {
    Strong,
    AtRisk,
}

impl VisibilityBand {
    pub fn from_score(score: f64) -> Self {
        if score > 50.0 {
            Self::Strong
        } else {
            Self::AtRisk
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Strong => "Strong",
            Self::AtRisk => "At Risk",
        }
    }
}

/// Plain mapping handed to renderers. Built from an [`AuditReport`], optionally
/// enriched with a competitive landscape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub brand_name: String,
    pub visibility_score: f64,
    pub citations: Vec<RawRecord>,
    pub recommendations: Vec<String>,
    pub hallucinations: Vec<RawRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<CompetitorMetrics>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citation_gaps: Vec<String>,
    /// Brand the caller asked about; names the output file. Providers may
    /// echo a different spelling in `brand_name`.
    #[serde(skip)]
    pub report_key: String,
}

impl From<&AuditReport> for RenderPayload {
    fn from(report: &AuditReport) -> Self {
        Self {
            brand_name: report.brand_name.clone(),
            visibility_score: report.visibility_score,
            citations: report.citations.clone(),
            recommendations: report.recommendations.clone(),
            hallucinations: report.hallucinations.clone().unwrap_or_default(),
            leaderboard: None,
            citation_gaps: Vec::new(),
            report_key: report.brand_name.clone(),
        }
    }
}

impl RenderPayload {
    pub fn with_report_key(mut self, requested_brand: &str) -> Self {
        self.report_key = requested_brand.to_string();
        self
    }

    pub fn with_competitors(mut self, analysis: &CompetitorAnalysis) -> Self {
        self.leaderboard = Some(analysis.leaderboard.clone());
        self.citation_gaps = analysis.citation_gaps.clone();
        self
    }

    pub fn band(&self) -> VisibilityBand {
        VisibilityBand::from_score(self.visibility_score)
    }
}

/// Output collaborator for finished audits and comparisons.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render_audit(&self, payload: &RenderPayload) -> Result<PathBuf>;
    async fn render_battle(
        &self,
        brand_a: &RenderPayload,
        brand_b: &RenderPayload,
        niche: &str,
        summary: &str,
    ) -> Result<PathBuf>;
}

/// Writes text or JSON reports into the workspace `reports/` directory.
pub struct FileReportRenderer {
    reports_dir: PathBuf,
    agency_name: String,
    format: OutputFormat,
}

impl FileReportRenderer {
    pub fn new(workspace: &AgencyWorkspace, format: OutputFormat) -> Self {
        Self {
            reports_dir: workspace.reports_dir().to_path_buf(),
            agency_name: workspace.agency_name().to_string(),
            format,
        }
    }

    fn write(&self, file_name: String, contents: &str) -> Result<PathBuf> {
        let path = self.reports_dir.join(file_name);
        fs::write(&path, contents)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
        Ok(path)
    }
}

#[async_trait]
impl ReportRenderer for FileReportRenderer {
    async fn render_audit(&self, payload: &RenderPayload) -> Result<PathBuf> {
        let contents = render_audit(payload, &self.agency_name, self.format)?;
        let name = format!(
            "{}_GEO_Audit.{}",
            file_stem(&payload.report_key),
            self.format.extension()
        );
        self.write(name, &contents)
    }

    async fn render_battle(
        &self,
        brand_a: &RenderPayload,
        brand_b: &RenderPayload,
        niche: &str,
        summary: &str,
    ) -> Result<PathBuf> {
        let contents =
            render_battle(brand_a, brand_b, niche, summary, &self.agency_name, self.format)?;
        let name = format!(
            "{}_vs_{}_Battle_Report.{}",
            file_stem(&brand_a.report_key),
            file_stem(&brand_b.report_key),
            self.format.extension()
        );
        self.write(name, &contents)
    }
}

/// Produce a single-brand report string in the desired format.
pub fn render_audit(payload: &RenderPayload, agency_name: &str, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => render_audit_human(payload, agency_name),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonAudit {
            agency_name,
            band: payload.band(),
            report: payload,
        })?),
    }
}

/// Produce a head-to-head report string in the desired format.
pub fn render_battle(
    brand_a: &RenderPayload,
    brand_b: &RenderPayload,
    niche: &str,
    summary: &str,
    agency_name: &str,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Human => render_battle_human(brand_a, brand_b, niche, summary, agency_name),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonBattle {
            agency_name,
            market_niche: niche,
            brand_a,
            brand_b,
            winner_summary: summary,
        })?),
    }
}

fn render_audit_human(payload: &RenderPayload, agency_name: &str) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{} - CONFIDENTIAL VISIBILITY AUDIT", agency_name.to_uppercase())?;
    writeln!(out)?;
    writeln!(out, "Audit: {}", payload.brand_name)?;
    writeln!(
        out,
        "Current AI Visibility Status: {:.1}% ({})",
        payload.visibility_score,
        payload.band().label()
    )?;
    writeln!(out)?;

    writeln!(out, "Strategic Recommendations:")?;
    for rec in &payload.recommendations {
        writeln!(out, "  - {}", single_line(rec))?;
    }

    writeln!(out)?;
    if payload.citations.is_empty() {
        writeln!(out, "No citations documented.")?;
    } else {
        writeln!(out, "Citations:")?;
        for citation in &payload.citations {
            writeln!(
                out,
                "  - {source} [{sentiment}]",
                source = field_text(citation, &CITATION_SOURCE),
                sentiment = field_text(citation, &CITATION_SENTIMENT),
            )?;
            writeln!(out, "    \"{}\"", field_text(citation, &CITATION_CONTEXT))?;
        }
    }

    if !payload.hallucinations.is_empty() {
        writeln!(out)?;
        writeln!(out, "Hallucinations:")?;
        for finding in &payload.hallucinations {
            writeln!(out, "  - Claim: {}", field_text(finding, &FINDING_FACT))?;
            writeln!(out, "    Correction: {}", field_text(finding, &FINDING_CORRECTION))?;
        }
    }

    if let Some(leaderboard) = &payload.leaderboard {
        writeln!(out)?;
        writeln!(out, "Competitive Landscape (AI Share of Voice):")?;
        writeln!(out, "  {:<30} {:>10} {:>16}", "Brand Name", "Citations", "Sentiment Score")?;
        for entry in leaderboard {
            writeln!(
                out,
                "  {:<30} {:>10} {:>15}%",
                entry.brand_name,
                entry.citation_count,
                (entry.sentiment_score * 100.0).round()
            )?;
        }
    }

    if !payload.citation_gaps.is_empty() {
        writeln!(out)?;
        writeln!(out, "Citation Gaps:")?;
        for gap in &payload.citation_gaps {
            writeln!(out, "  - {}", single_line(gap))?;
        }
    }

    Ok(out)
}

fn render_battle_human(
    brand_a: &RenderPayload,
    brand_b: &RenderPayload,
    niche: &str,
    summary: &str,
    agency_name: &str,
) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{} - HEAD-TO-HEAD BATTLE REPORT", agency_name.to_uppercase())?;
    writeln!(out)?;
    writeln!(out, "{} vs {}", brand_a.brand_name, brand_b.brand_name)?;
    writeln!(out, "Market: {niche}")?;
    writeln!(out)?;
    for side in [brand_a, brand_b] {
        writeln!(
            out,
            "  {:<30} {:>6.1}% ({})",
            side.brand_name,
            side.visibility_score,
            side.band().label()
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Verdict:")?;
    writeln!(out, "  {}", single_line(summary))?;

    for side in [brand_a, brand_b] {
        writeln!(out)?;
        writeln!(out, "{} Recommendations:", side.brand_name)?;
        for rec in &side.recommendations {
            writeln!(out, "  - {}", single_line(rec))?;
        }
    }
    Ok(out)
}

/// Reads a display value from a raw provider record through its alias table.
fn field_text(record: &RawRecord, spec: &FieldSpec) -> String {
    match spec.resolve(record) {
        Some((_, Value::String(text))) => single_line(text),
        Some((_, other)) => other.to_string(),
        None => "n/a".to_string(),
    }
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

fn file_stem(brand: &str) -> String {
    brand
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[derive(Serialize)]
struct JsonAudit<'a> {
    agency_name: &'a str,
    band: VisibilityBand,
    #[serde(flatten)]
    report: &'a RenderPayload,
}

#[derive(Serialize)]
struct JsonBattle<'a> {
    agency_name: &'a str,
    market_niche: &'a str,
    brand_a: &'a RenderPayload,
    brand_b: &'a RenderPayload,
    winner_summary: &'a str,
}
