//! Prompts for the audit, comparison and verification calls

use serde_json::{json, Value};

use crate::schema::AuditReport;

/// System prompt for a single-brand audit. Pins the canonical field names.
pub const AUDIT_SYSTEM_PROMPT: &str = r#"You are a GEO (Generative Engine Optimization) visibility expert. You assess how prominently and how favorably a brand appears in answers produced by AI assistants.

Always answer with one JSON object using exactly these keys:
- "brand_name": string
- "visibility_score": number between 0 and 100
- "citations": array of objects, each with "source", "sentiment" and "context"
- "hallucinations": array of objects, each with "fact" and "correction"
- "recommendations": array of strings

Do not add other keys. Do not wrap the JSON in markdown."#;

pub fn audit_user_prompt(brand: &str, niche: &str) -> String {
    format!(
        r#"Audit the brand "{brand}" in the "{niche}" niche.

Requirements:
1. "visibility_score": how visible and well represented the brand is in AI-generated answers for this niche, from 0 (invisible) to 100 (dominant).
2. "citations": exactly 3 objects. "source" is the domain or publication, "sentiment" is one of Positive, Neutral or Negative, "context" is one sentence describing the mention.
3. "hallucinations": zero or more objects for claims AI assistants commonly get wrong about the brand. "fact" is the incorrect claim, "correction" is the accurate statement. Use an empty array when none are known.
4. "recommendations": exactly 3 strategic recommendations to improve the brand's AI visibility."#
    )
}

/// Schema used when the provider supports schema-guided output.
pub fn audit_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["brand_name", "visibility_score", "citations", "hallucinations", "recommendations"],
        "properties": {
            "brand_name": { "type": "string" },
            "visibility_score": { "type": "number", "minimum": 0, "maximum": 100 },
            "citations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["source", "sentiment", "context"],
                    "properties": {
                        "source": { "type": "string" },
                        "sentiment": { "type": "string", "enum": ["Positive", "Neutral", "Negative"] },
                        "context": { "type": "string" }
                    }
                }
            },
            "hallucinations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["fact", "correction"],
                    "properties": {
                        "fact": { "type": "string" },
                        "correction": { "type": "string" }
                    }
                }
            },
            "recommendations": { "type": "array", "items": { "type": "string" } }
        }
    })
}

/// System prompt for the head-to-head verdict. Only the narrative is requested.
pub const COMPARISON_SYSTEM_PROMPT: &str = r#"You are a senior GEO strategist writing the verdict of a head-to-head brand visibility comparison.

You are given two completed audits. Treat every number in them as final: do not recompute, restate or invent scores.

Answer with one JSON object with a single key "winner_summary" whose value is a plain string of 3 to 4 sentences naming the stronger brand and explaining why."#;

pub fn comparison_user_prompt(report_a: &AuditReport, report_b: &AuditReport, niche: &str) -> String {
    format!(
        "Market niche: {niche}\n\nBrand A audit:\n{}\n\nBrand B audit:\n{}\n",
        serde_json::to_string_pretty(report_a).unwrap_or_default(),
        serde_json::to_string_pretty(report_b).unwrap_or_default()
    )
}

/// System prompt for checking an AI statement against ground truth.
pub const VERIFICATION_SYSTEM_PROMPT: &str = r#"You are a fact-checking analyst. Compare an AI-generated statement about a brand with the ground-truth document supplied by the brand.

Answer with one JSON object: {"findings": [{"fact": "...", "severity": "Low" | "High", "correction": "..."}]}
- "fact" quotes or paraphrases the incorrect claim from the AI statement.
- "severity" is "High" when the error could mislead a buyer, otherwise "Low".
- "correction" states what the ground truth says.
Return {"findings": []} when the statement agrees with the ground truth."#;

pub fn verification_user_prompt(ai_statement: &str, ground_truth: &str) -> String {
    format!("AI statement:\n{ai_statement}\n\nGround truth:\n{ground_truth}\n")
}
