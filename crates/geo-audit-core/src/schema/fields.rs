//! Field-resolution table mapping each canonical field to the provider keys
//! accepted for it, plus the typed readers shared by every normalizer.
//!
//! Aliases are tried in declaration order; the first key present with a
//! non-null value wins. Adding a new alias is a one-line change here.

use serde_json::Value;

use super::{RawRecord, ValidationError};

/// Canonical field name plus the ordered provider keys accepted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

impl FieldSpec {
    /// First alias present (and not `null`) in `object`, with its value.
    pub fn resolve<'a>(&self, object: &'a RawRecord) -> Option<(&'static str, &'a Value)> {
        self.aliases.iter().find_map(|key| {
            object
                .get(*key)
                .filter(|value| !value.is_null())
                .map(|value| (*key, value))
        })
    }

    pub fn accepted(&self) -> String {
        self.aliases.join(", ")
    }
}

pub const BRAND_NAME: FieldSpec = FieldSpec {
    canonical: "brand_name",
    aliases: &["brand_name", "brand", "company", "name"],
};

pub const VISIBILITY_SCORE: FieldSpec = FieldSpec {
    canonical: "visibility_score",
    aliases: &["visibility_score", "score", "visibility", "rating", "ai_score"],
};

pub const CITATIONS: FieldSpec = FieldSpec {
    canonical: "citations",
    aliases: &["citations", "sources", "mentions", "references"],
};

pub const RECOMMENDATIONS: FieldSpec = FieldSpec {
    canonical: "recommendations",
    aliases: &[
        "recommendations",
        "strategic_recommendations",
        "suggestions",
        "advice",
        "next_steps",
    ],
};

pub const HALLUCINATIONS: FieldSpec = FieldSpec {
    canonical: "hallucinations",
    aliases: &[
        "hallucinations",
        "hallucination_findings",
        "factual_errors",
        "inaccuracies",
    ],
};

/// Every top-level field of an audit report, in normalization order.
pub const AUDIT_FIELDS: [FieldSpec; 5] = [
    BRAND_NAME,
    VISIBILITY_SCORE,
    CITATIONS,
    RECOMMENDATIONS,
    HALLUCINATIONS,
];

pub const CITATION_SOURCE: FieldSpec = FieldSpec {
    canonical: "source",
    aliases: &["source", "domain", "publication", "outlet", "url"],
};

pub const CITATION_SENTIMENT: FieldSpec = FieldSpec {
    canonical: "sentiment",
    aliases: &["sentiment", "tone"],
};

pub const CITATION_CONTEXT: FieldSpec = FieldSpec {
    canonical: "context",
    aliases: &["context", "snippet", "quote", "excerpt", "description"],
};

pub const FINDINGS: FieldSpec = FieldSpec {
    canonical: "findings",
    aliases: &[
        "findings",
        "discrepancies",
        "hallucinations",
        "errors",
        "issues",
    ],
};

pub const FINDING_FACT: FieldSpec = FieldSpec {
    canonical: "fact",
    aliases: &["fact", "claim", "statement", "error"],
};

pub const FINDING_SEVERITY: FieldSpec = FieldSpec {
    canonical: "severity",
    aliases: &["severity", "level", "impact"],
};

pub const FINDING_CORRECTION: FieldSpec = FieldSpec {
    canonical: "correction",
    aliases: &["correction", "truth", "correct_fact", "fix"],
};

pub const WINNER_SUMMARY: FieldSpec = FieldSpec {
    canonical: "winner_summary",
    aliases: &[
        "winner_summary",
        "summary",
        "verdict",
        "comparison",
        "narrative",
    ],
};

pub const MARKET_QUERY: FieldSpec = FieldSpec {
    canonical: "market_query",
    aliases: &["market_query", "query", "market", "niche"],
};

pub const LEADERBOARD: FieldSpec = FieldSpec {
    canonical: "leaderboard",
    aliases: &["leaderboard", "competitors", "rankings", "ranking"],
};

pub const CITATION_GAPS: FieldSpec = FieldSpec {
    canonical: "citation_gaps",
    aliases: &["citation_gaps", "topic_gaps", "gaps", "content_gaps"],
};

pub const CITATION_COUNT: FieldSpec = FieldSpec {
    canonical: "citation_count",
    aliases: &["citation_count", "citations", "mentions", "mention_count"],
};

pub const TOP_SOURCES: FieldSpec = FieldSpec {
    canonical: "top_sources",
    aliases: &["top_sources", "sources"],
};

pub const SENTIMENT_SCORE: FieldSpec = FieldSpec {
    canonical: "sentiment_score",
    aliases: &["sentiment_score", "sentiment"],
};

/// JSON type name used in error messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Short description of an offending value: quoted strings, type names otherwise.
pub fn describe(value: &Value) -> String {
    match value {
        Value::String(text) => format!("\"{}\"", crate::truncate(text, 40)),
        Value::Number(number) => number.to_string(),
        other => kind(other).to_string(),
    }
}

/// Typed access to one JSON object, producing path-qualified validation errors.
pub(crate) struct FieldReader<'a> {
    object: &'a RawRecord,
    prefix: Option<String>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn root(object: &'a RawRecord) -> Self {
        Self {
            object,
            prefix: None,
        }
    }

    pub(crate) fn nested(object: &'a RawRecord, prefix: String) -> Self {
        Self {
            object,
            prefix: Some(prefix),
        }
    }

    pub(crate) fn label(&self, spec: &FieldSpec) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{}", spec.canonical),
            None => spec.canonical.to_string(),
        }
    }

    pub(crate) fn optional(&self, spec: &FieldSpec) -> Option<(&'static str, &'a Value)> {
        spec.resolve(self.object)
    }

    pub(crate) fn require(
        &self,
        spec: &FieldSpec,
    ) -> Result<(&'static str, &'a Value), ValidationError> {
        self.optional(spec)
            .ok_or_else(|| ValidationError::MissingField {
                field: self.label(spec),
                accepted: spec.accepted(),
            })
    }

    pub(crate) fn text(&self, spec: &FieldSpec) -> Result<String, ValidationError> {
        let (key, value) = self.require(spec)?;
        as_text(&self.label(spec), key, value)
    }

    pub(crate) fn number_within(
        &self,
        spec: &FieldSpec,
        min: f64,
        max: f64,
    ) -> Result<f64, ValidationError> {
        let (key, value) = self.require(spec)?;
        as_number_within(&self.label(spec), key, value, min, max)
    }

    pub(crate) fn count(&self, spec: &FieldSpec) -> Result<u64, ValidationError> {
        let (key, value) = self.require(spec)?;
        as_count(&self.label(spec), key, value)
    }

    pub(crate) fn string_list(&self, spec: &FieldSpec) -> Result<Vec<String>, ValidationError> {
        let (key, value) = self.require(spec)?;
        as_string_list(&self.label(spec), key, value)
    }

    pub(crate) fn records(&self, spec: &FieldSpec) -> Result<Vec<RawRecord>, ValidationError> {
        let (key, value) = self.require(spec)?;
        as_records(&self.label(spec), key, value)
    }
}

fn mismatch(field: &str, key: &str, expected: &'static str, value: &Value) -> ValidationError {
    ValidationError::TypeMismatch {
        field: field.to_string(),
        key: key.to_string(),
        expected,
        found: describe(value),
    }
}

pub(crate) fn as_text(field: &str, key: &str, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        other => Err(mismatch(field, key, "a non-empty string", other)),
    }
}

/// Numbers or numeric strings (an optional trailing `%` is allowed); never clamped.
pub(crate) fn as_number_within(
    field: &str,
    key: &str,
    value: &Value,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
    .ok_or_else(|| mismatch(field, key, "a number", value))?;

    if !(min..=max).contains(&number) {
        return Err(ValidationError::Range {
            field: field.to_string(),
            value: number,
            min,
            max,
        });
    }
    Ok(number)
}

pub(crate) fn as_count(field: &str, key: &str, value: &Value) -> Result<u64, ValidationError> {
    let number = match value {
        Value::Number(number) => number
            .as_u64()
            .map(|count| count as f64)
            .or_else(|| number.as_f64()),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite() && number.fract() == 0.0)
    .ok_or_else(|| mismatch(field, key, "a whole number", value))?;

    if number < 0.0 {
        return Err(ValidationError::Range {
            field: field.to_string(),
            value: number,
            min: 0.0,
            max: u64::MAX as f64,
        });
    }
    Ok(number as u64)
}

/// Arrays of strings; a lone string is read as a one-item list.
pub(crate) fn as_string_list(
    field: &str,
    key: &str,
    value: &Value,
) -> Result<Vec<String>, ValidationError> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Ok(vec![text.trim().to_string()]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| as_text(&format!("{field}[{index}]"), key, item))
            .collect(),
        other => Err(mismatch(field, key, "an array of strings", other)),
    }
}

/// Arrays of JSON objects, kept without per-item shape checks.
pub(crate) fn as_records(
    field: &str,
    key: &str,
    value: &Value,
) -> Result<Vec<RawRecord>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(mismatch(field, key, "an array of objects", value));
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map.clone()),
            other => Err(mismatch(&format!("{field}[{index}]"), key, "an object", other)),
        })
        .collect()
}
