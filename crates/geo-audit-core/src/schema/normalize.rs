//! Normalization of heterogeneous provider JSON into canonical report types.
//!
//! Each entry point takes already-decoded JSON, so replies from plain JSON
//! mode and schema-guided mode go through the same code.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::decode::decode_json;
use super::fields::{self, FieldReader};
use super::{
    AuditReport, CompetitorAnalysis, CompetitorMetrics, HallucinationFinding, RawRecord, Severity,
    ValidationError,
};

fn as_object(value: &Value) -> Result<&RawRecord, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::NotAnObject {
        found: fields::kind(value),
    })
}

/// Resolve an [`AuditReport`] from a provider object.
///
/// Unknown keys are ignored. `citations` and `hallucinations` items must be
/// objects but their shape is not checked here.
pub fn normalize_audit(value: &Value) -> Result<AuditReport, ValidationError> {
    let object = as_object(value)?;
    let reader = FieldReader::root(object);

    let brand_name = reader.text(&fields::BRAND_NAME)?;
    let visibility_score = reader.number_within(&fields::VISIBILITY_SCORE, 0.0, 100.0)?;
    let citations = reader.records(&fields::CITATIONS)?;
    let recommendations = reader.string_list(&fields::RECOMMENDATIONS)?;
    if recommendations.is_empty() {
        return Err(ValidationError::EmptySequence {
            field: fields::RECOMMENDATIONS.canonical.to_string(),
        });
    }
    let hallucinations = match reader.optional(&fields::HALLUCINATIONS) {
        Some((key, value)) => Some(fields::as_records(
            fields::HALLUCINATIONS.canonical,
            key,
            value,
        )?),
        None => None,
    };

    Ok(AuditReport {
        brand_name,
        visibility_score,
        citations,
        recommendations,
        hallucinations,
    })
}

/// Decode `raw` text and normalize it as an audit report.
pub fn normalize_audit_json(raw: &str) -> Result<AuditReport, ValidationError> {
    normalize_audit(&decode_json(raw)?)
}

/// Extract the comparison narrative, or `None` when the provider omitted it.
///
/// A narrative delivered as a nested mapping is flattened into one readable
/// sentence of `Label: value` pairs instead of being rejected.
pub fn normalize_comparison_summary(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    let (key, narrative) = fields::WINNER_SUMMARY.resolve(object)?;
    let summary = match narrative {
        Value::String(text) => text.trim().to_string(),
        Value::Object(map) => {
            warn!(key, "comparison narrative arrived as a mapping; flattening");
            flatten_mapping(map)
        }
        Value::Array(items) => {
            warn!(key, "comparison narrative arrived as a list; joining");
            items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => flatten_mapping(map),
                    other => render_value(other),
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        other => render_value(other),
    };
    Some(summary).filter(|text| !text.is_empty())
}

/// `{"market_share": "Higher for A"}` becomes `Market share: Higher for A.`
pub fn flatten_mapping(map: &Map<String, Value>) -> String {
    let mut sentence = String::new();
    for pair in map.iter().map(|(key, value)| render_pair(key, value)) {
        if !sentence.is_empty() {
            sentence.push(' ');
        }
        sentence.push_str(&pair);
        // Values that already end a sentence keep their own punctuation.
        if !pair.ends_with('.') {
            sentence.push('.');
        }
    }
    sentence
}

fn flatten_pairs(map: &Map<String, Value>, separator: &str) -> String {
    map.iter()
        .map(|(key, value)| render_pair(key, value))
        .collect::<Vec<_>>()
        .join(separator)
}

fn render_pair(key: &str, value: &Value) -> String {
    format!("{}: {}", humanize_key(key), render_value(value))
}

fn humanize_key(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let spaced = spaced.trim();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Null => "n/a".to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => format!("({})", flatten_pairs(map, "; ")),
        other => other.to_string(),
    }
}

/// Best-effort read of verification findings.
///
/// Accepts a bare array or an object holding one under a known key. Items
/// without a recognizable claim are dropped; an empty result means no
/// discrepancies were reported.
pub fn normalize_findings(value: &Value) -> Result<Vec<HallucinationFinding>, ValidationError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(object) if object.is_empty() => return Ok(Vec::new()),
        Value::Object(object) => {
            let reader = FieldReader::root(object);
            if reader.optional(&fields::FINDING_FACT).is_some() {
                return Ok(finding_from_item(value, 0).into_iter().collect());
            }
            let (key, list) = reader.require(&fields::FINDINGS)?;
            list.as_array()
                .ok_or_else(|| ValidationError::TypeMismatch {
                    field: fields::FINDINGS.canonical.to_string(),
                    key: key.to_string(),
                    expected: "an array of objects",
                    found: fields::describe(list),
                })?
        }
        other => {
            return Err(ValidationError::NotAnObject {
                found: fields::kind(other),
            })
        }
    };

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| finding_from_item(item, index))
        .collect())
}

fn finding_from_item(item: &Value, index: usize) -> Option<HallucinationFinding> {
    let Some(object) = item.as_object() else {
        debug!(index, "skipping non-object verification finding");
        return None;
    };
    let reader = FieldReader::nested(object, format!("findings[{index}]"));
    let fact = match reader.text(&fields::FINDING_FACT) {
        Ok(fact) => fact,
        Err(err) => {
            warn!(index, error = %err, "skipping verification finding without a claim");
            return None;
        }
    };
    let severity = reader
        .optional(&fields::FINDING_SEVERITY)
        .and_then(|(_, value)| value.as_str())
        .and_then(Severity::parse);
    let correction = reader
        .optional(&fields::FINDING_CORRECTION)
        .map(|(_, value)| render_value(value))
        .unwrap_or_default();
    Some(HallucinationFinding {
        fact,
        severity,
        correction,
    })
}

/// Resolve a [`CompetitorAnalysis`]; leaderboard order is preserved as the ranking.
pub fn normalize_competitor_analysis(value: &Value) -> Result<CompetitorAnalysis, ValidationError> {
    let object = as_object(value)?;
    let reader = FieldReader::root(object);

    let market_query = reader.text(&fields::MARKET_QUERY)?;
    let leaderboard = reader
        .records(&fields::LEADERBOARD)?
        .iter()
        .enumerate()
        .map(|(index, entry)| competitor_metrics(entry, index))
        .collect::<Result<Vec<_>, _>>()?;
    let citation_gaps = match reader.optional(&fields::CITATION_GAPS) {
        Some((key, value)) => {
            fields::as_string_list(fields::CITATION_GAPS.canonical, key, value)?
        }
        None => Vec::new(),
    };

    Ok(CompetitorAnalysis {
        market_query,
        leaderboard,
        citation_gaps,
    })
}

fn competitor_metrics(entry: &RawRecord, index: usize) -> Result<CompetitorMetrics, ValidationError> {
    let reader = FieldReader::nested(entry, format!("leaderboard[{index}]"));
    let top_sources = match reader.optional(&fields::TOP_SOURCES) {
        Some(_) => reader.string_list(&fields::TOP_SOURCES)?,
        None => Vec::new(),
    };
    Ok(CompetitorMetrics {
        brand_name: reader.text(&fields::BRAND_NAME)?,
        citation_count: reader.count(&fields::CITATION_COUNT)?,
        top_sources,
        sentiment_score: reader.number_within(&fields::SENTIMENT_SCORE, 0.0, 1.0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical() -> Value {
        json!({
            "brand_name": "Acme",
            "visibility_score": 73.0,
            "citations": [
                {"source": "techcrunch.com", "sentiment": "Positive", "context": "Funding round"},
                {"source": "reddit.com", "sentiment": "Neutral", "context": "Thread"},
                {"source": "g2.com", "sentiment": "Negative", "context": "Review"}
            ],
            "recommendations": ["a", "b", "c"]
        })
    }

    #[test]
    fn normalizes_aliased_payload() {
        let report = normalize_audit(&json!({
            "company": "Acme",
            "rating": 73,
            "citations": [],
            "suggestions": ["a", "b", "c"]
        }))
        .expect("aliases should resolve");
        assert_eq!(report.brand_name, "Acme");
        assert_eq!(report.visibility_score, 73.0);
        assert_eq!(report.recommendations, vec!["a", "b", "c"]);
        assert!(report.hallucinations.is_none());
    }

    #[test]
    fn canonical_payload_round_trips_unchanged() {
        let report = normalize_audit(&canonical()).unwrap();
        let again = normalize_audit(&serde_json::to_value(&report).unwrap()).unwrap();
        assert_eq!(report, again);
    }

    #[test]
    fn missing_brand_names_canonical_field() {
        let mut payload = canonical();
        payload.as_object_mut().unwrap().remove("brand_name");
        let err = normalize_audit(&payload).expect_err("brand is required");
        assert!(matches!(
            err,
            ValidationError::MissingField { ref field, ref accepted }
                if field == "brand_name" && accepted.contains("company")
        ));
    }

    #[test]
    fn out_of_range_score_is_rejected_not_clamped() {
        let mut payload = canonical();
        payload["visibility_score"] = json!(100.5);
        assert!(matches!(
            normalize_audit(&payload),
            Err(ValidationError::Range { ref field, .. }) if field == "visibility_score"
        ));
    }

    #[test]
    fn non_numeric_score_is_a_type_mismatch() {
        let mut payload = canonical();
        payload["visibility_score"] = json!("high");
        assert!(matches!(
            normalize_audit(&payload),
            Err(ValidationError::TypeMismatch { ref key, .. }) if key == "visibility_score"
        ));
    }

    #[test]
    fn empty_recommendations_are_rejected() {
        let mut payload = canonical();
        payload["recommendations"] = json!([]);
        assert!(matches!(
            normalize_audit(&payload),
            Err(ValidationError::EmptySequence { ref field }) if field == "recommendations"
        ));
    }

    #[test]
    fn citation_items_keep_provider_shape() {
        let mut payload = canonical();
        payload["citations"] = json!([{"outlet": "Wired", "stars": 4}]);
        let report = normalize_audit(&payload).unwrap();
        assert_eq!(report.citations[0]["outlet"], "Wired");
        assert_eq!(report.citations[0]["stars"], 4);
    }

    #[test]
    fn hallucinations_are_optional_and_aliased() {
        let mut payload = canonical();
        payload["factual_errors"] = json!([{"fact": "Founded 1990", "correction": "Founded 2003"}]);
        let report = normalize_audit(&payload).unwrap();
        assert_eq!(report.hallucinations.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn top_level_array_is_not_an_object() {
        assert!(matches!(
            normalize_audit(&json!([1, 2])),
            Err(ValidationError::NotAnObject { found: "array" })
        ));
    }

    #[test]
    fn normalize_audit_json_decodes_fenced_text() {
        let raw = format!("```json\n{}\n```", canonical());
        let report = normalize_audit_json(&raw).unwrap();
        assert_eq!(report.citations.len(), 3);
    }

    #[test]
    fn summary_string_is_trimmed() {
        let summary = normalize_comparison_summary(&json!({"winner_summary": "  A wins.  "}));
        assert_eq!(summary.as_deref(), Some("A wins."));
    }

    #[test]
    fn summary_mapping_is_flattened() {
        let summary = normalize_comparison_summary(&json!({
            "winner_summary": {"authority": "Higher for A", "risk": "Lower for B"}
        }))
        .expect("mapping should be flattened");
        assert!(summary.contains("Authority: Higher for A"));
        assert!(summary.contains("Risk: Lower for B"));
    }

    #[test]
    fn summary_flattening_humanizes_keys_and_nests() {
        let summary = normalize_comparison_summary(&json!({
            "verdict": {"market_share": "A leads.", "detail": {"trust-signals": ["reviews", "press"]}}
        }))
        .unwrap();
        assert_eq!(
            summary,
            "Market share: A leads. Detail: (Trust signals: reviews, press)."
        );
    }

    #[test]
    fn summary_flattening_keeps_periods_inside_values() {
        let summary = normalize_comparison_summary(&json!({
            "winner_summary": {
                "winner": "Acme Inc.",
                "details": {"release": "v2...", "vendor": "Zed Co."},
                "note": "close race"
            }
        }))
        .unwrap();
        assert_eq!(
            summary,
            "Winner: Acme Inc. Details: (Release: v2...; Vendor: Zed Co.). Note: close race."
        );
    }

    #[test]
    fn summary_missing_or_blank_is_none() {
        assert!(normalize_comparison_summary(&json!({"other": "x"})).is_none());
        assert!(normalize_comparison_summary(&json!({"winner_summary": "   "})).is_none());
        assert!(normalize_comparison_summary(&json!("just text")).is_none());
    }

    #[test]
    fn findings_accept_bare_arrays_and_wrappers() {
        let bare = normalize_findings(&json!([
            {"fact": "CEO is Bob", "severity": "High", "correction": "CEO is Alice"}
        ]))
        .unwrap();
        assert_eq!(bare[0].severity, Some(Severity::High));

        let wrapped = normalize_findings(&json!({
            "discrepancies": [{"claim": "Founded 1990", "truth": "Founded 2003", "severity": "low"}]
        }))
        .unwrap();
        assert_eq!(wrapped[0].fact, "Founded 1990");
        assert_eq!(wrapped[0].correction, "Founded 2003");
        assert_eq!(wrapped[0].severity, Some(Severity::Low));
    }

    #[test]
    fn findings_empty_means_no_discrepancies() {
        assert!(normalize_findings(&json!({"findings": []})).unwrap().is_empty());
        assert!(normalize_findings(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn findings_skip_items_without_claims() {
        let findings = normalize_findings(&json!([
            {"correction": "orphan"},
            "noise",
            {"fact": "Kept", "correction": "Yes"}
        ]))
        .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].fact, "Kept");
    }

    #[test]
    fn findings_single_object_is_one_finding() {
        let findings =
            normalize_findings(&json!({"fact": "HQ in Paris", "correction": "HQ in Lyon"})).unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn competitor_analysis_preserves_order() {
        let analysis = normalize_competitor_analysis(&json!({
            "query": "best CRM",
            "competitors": [
                {"brand": "Zed", "mentions": 12, "sources": ["g2.com"], "sentiment": 0.8},
                {"name": "Acme", "citation_count": 3.0, "sentiment_score": "0.4"}
            ],
            "topic_gaps": ["pricing transparency"]
        }))
        .unwrap();
        assert_eq!(analysis.market_query, "best CRM");
        assert_eq!(analysis.leaderboard[0].brand_name, "Zed");
        assert_eq!(analysis.leaderboard[1].citation_count, 3);
        assert!(analysis.leaderboard[1].top_sources.is_empty());
        assert_eq!(analysis.citation_gaps, vec!["pricing transparency"]);
    }

    #[test]
    fn competitor_sentiment_out_of_range_is_rejected() {
        let err = normalize_competitor_analysis(&json!({
            "market_query": "q",
            "leaderboard": [{"brand_name": "Zed", "citation_count": 1, "sentiment_score": 4}]
        }))
        .expect_err("sentiment must be within 0..=1");
        assert_eq!(err.field(), Some("leaderboard[0].sentiment_score"));
    }
}
