use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod decode;
pub mod fields;
pub mod normalize;

use fields::FieldReader;

/// A provider-supplied JSON object kept as-is (no per-item shape enforcement).
pub type RawRecord = Map<String, Value>;

/// Structured validation failures raised while normalizing provider output.
///
/// Every variant names the canonical field (or indexed path such as
/// `citations[1].sentiment`) that caused the rejection.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("response is not valid JSON: {message}")]
    InvalidJson { message: String },
    #[error("expected a JSON object at the top level (got {found})")]
    NotAnObject { found: &'static str },
    #[error("missing required field `{field}` (accepted keys: {accepted})")]
    MissingField { field: String, accepted: String },
    #[error("field `{field}` (key `{key}`) expected {expected} (got {found})")]
    TypeMismatch {
        field: String,
        key: String,
        expected: &'static str,
        found: String,
    },
    #[error("field `{field}` must be within {min}..={max} (got {value})")]
    Range {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("field `{field}` must not be empty")]
    EmptySequence { field: String },
}

impl ValidationError {
    /// Canonical field (or path) the error refers to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. }
            | Self::TypeMismatch { field, .. }
            | Self::Range { field, .. }
            | Self::EmptySequence { field } => Some(field),
            Self::InvalidJson { .. } | Self::NotAnObject { .. } => None,
        }
    }
}

/// Tone of a documented mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// How damaging a detected factual error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    High,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.starts_with("high") || lowered.starts_with("critical") {
            Some(Self::High)
        } else if lowered.starts_with("low") || lowered.starts_with("minor") {
            Some(Self::Low)
        } else {
            None
        }
    }
}

/// One documented external mention of a brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub sentiment: Sentiment,
    pub context: String,
}

impl Citation {
    /// Strictly build a citation from a raw record; `index` is used in error paths.
    pub fn from_record(record: &RawRecord, index: usize) -> Result<Self, ValidationError> {
        let reader = FieldReader::nested(record, format!("citations[{index}]"));
        let source = reader.text(&fields::CITATION_SOURCE)?;
        let (key, value) = reader.require(&fields::CITATION_SENTIMENT)?;
        let label = reader.label(&fields::CITATION_SENTIMENT);
        let sentiment = value
            .as_str()
            .and_then(Sentiment::parse)
            .ok_or_else(|| ValidationError::TypeMismatch {
                field: label,
                key: key.to_string(),
                expected: "Positive, Neutral, or Negative",
                found: fields::describe(value),
            })?;
        let context = reader.text(&fields::CITATION_CONTEXT)?;
        Ok(Self {
            source,
            sentiment,
            context,
        })
    }
}

/// One factual error detected in AI-generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationFinding {
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub correction: String,
}

impl HallucinationFinding {
    /// Strictly build a finding from a raw record; `fact` and `correction` are required.
    pub fn from_record(record: &RawRecord, index: usize) -> Result<Self, ValidationError> {
        let reader = FieldReader::nested(record, format!("hallucinations[{index}]"));
        let fact = reader.text(&fields::FINDING_FACT)?;
        let severity = reader
            .optional(&fields::FINDING_SEVERITY)
            .and_then(|(_, value)| value.as_str())
            .and_then(Severity::parse);
        let correction = reader.text(&fields::FINDING_CORRECTION)?;
        Ok(Self {
            fact,
            severity,
            correction,
        })
    }
}

/// Per-brand visibility audit.
///
/// `citations` and `hallucinations` hold the provider's objects unchanged; use
/// [`AuditReport::strict_citations`] / [`AuditReport::strict_hallucinations`]
/// when typed items are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub brand_name: String,
    pub visibility_score: f64,
    pub citations: Vec<RawRecord>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucinations: Option<Vec<RawRecord>>,
}

impl AuditReport {
    pub fn strict_citations(&self) -> Result<Vec<Citation>, ValidationError> {
        self.citations
            .iter()
            .enumerate()
            .map(|(index, record)| Citation::from_record(record, index))
            .collect()
    }

    pub fn strict_hallucinations(&self) -> Result<Vec<HallucinationFinding>, ValidationError> {
        self.hallucinations
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(index, record)| HallucinationFinding::from_record(record, index))
            .collect()
    }
}

/// One market participant's standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorMetrics {
    pub brand_name: String,
    pub citation_count: u64,
    pub top_sources: Vec<String>,
    pub sentiment_score: f64,
}

/// Market-level comparison; leaderboard order is the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorAnalysis {
    pub market_query: String,
    pub leaderboard: Vec<CompetitorMetrics>,
    pub citation_gaps: Vec<String>,
}

/// Two independent audits plus an LLM-written verdict.
///
/// The embedded reports are only reachable by shared reference, so nothing
/// downstream of construction can alter the audited numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    brand_a: AuditReport,
    brand_b: AuditReport,
    market_niche: String,
    winner_summary: String,
}

impl ComparisonReport {
    pub fn new(
        brand_a: AuditReport,
        brand_b: AuditReport,
        market_niche: impl Into<String>,
        winner_summary: impl Into<String>,
    ) -> Self {
        Self {
            brand_a,
            brand_b,
            market_niche: market_niche.into(),
            winner_summary: winner_summary.into(),
        }
    }

    pub fn brand_a(&self) -> &AuditReport {
        &self.brand_a
    }

    pub fn brand_b(&self) -> &AuditReport {
        &self.brand_b
    }

    pub fn market_niche(&self) -> &str {
        &self.market_niche
    }

    pub fn winner_summary(&self) -> &str {
        &self.winner_summary
    }
}
