//! Turning a provider's textual reply into a `serde_json::Value`.
//!
//! Providers wrap JSON in code fences, prepend prose, or emit raw newlines
//! inside strings. Decoding tries strict JSON first, then a repaired copy,
//! then JSON5 as a last resort.

use serde_json::Value;

use super::ValidationError;

pub fn decode_json(raw: &str) -> Result<Value, ValidationError> {
    let payload = extract_json_payload(raw);
    if payload.is_empty() {
        return Err(ValidationError::InvalidJson {
            message: "response was empty".into(),
        });
    }

    let first_err = match serde_json::from_str::<Value>(&payload) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let sanitized = sanitize_json_strings(&payload);
    if sanitized != payload {
        if let Ok(value) = serde_json::from_str::<Value>(&sanitized) {
            return Ok(value);
        }
    }

    json5::from_str::<Value>(&sanitized).map_err(|_| {
        if debug_enabled() {
            tracing::warn!(payload = %crate::truncate(&payload, 2000), "undecodable provider payload");
        }
        ValidationError::InvalidJson {
            message: first_err.to_string(),
        }
    })
}

fn debug_enabled() -> bool {
    matches!(std::env::var("GEO_AUDIT_DEBUG"), Ok(val) if !val.is_empty() && val != "0")
}

pub(crate) fn extract_json_payload(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = strip_code_fence(trimmed).unwrap_or(trimmed);
    if body.starts_with('{') || body.starts_with('[') {
        return body.to_string();
    }
    slice_json_span(body).unwrap_or(body).to_string()
}

/// Fence contents with any info string (`json`, `JSON`, `json5`) removed.
fn strip_code_fence(input: &str) -> Option<&str> {
    let rest = input.strip_prefix("```")?;
    let rest = rest
        .trim_start_matches([' ', '\t'])
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let end = rest.rfind("```").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// From the first `{` or `[` to the last matching closer, or to the end when
/// the reply was cut off before one.
fn slice_json_span(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    match text.rfind(closer) {
        Some(end) if end > start => Some(&text[start..=end]),
        _ => Some(&text[start..]),
    }
}

/// Escape raw newlines inside string literals and close anything left open,
/// innermost first.
pub(crate) fn sanitize_json_strings(payload: &str) -> String {
    let mut result = String::with_capacity(payload.len());
    let mut in_string = false;
    let mut escape = false;
    let mut open: Vec<char> = Vec::new();

    for ch in payload.chars() {
        if in_string {
            if escape {
                result.push(ch);
                escape = false;
            } else {
                match ch {
                    '\\' => {
                        result.push(ch);
                        escape = true;
                    }
                    '"' => {
                        result.push(ch);
                        in_string = false;
                    }
                    '\n' => result.push_str("\\n"),
                    '\r' => {}
                    _ => result.push(ch),
                }
            }
        } else {
            result.push(ch);
            match ch {
                '"' => in_string = true,
                '{' => open.push('}'),
                '[' => open.push(']'),
                '}' | ']' => {
                    if open.last() == Some(&ch) {
                        open.pop();
                    }
                }
                _ => {}
            }
        }
    }

    if in_string {
        if escape {
            result.pop();
        }
        result.push('"');
    }

    while let Some(closer) = open.pop() {
        result.push(closer);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn decodes_fenced_payload() {
        let value = decode_json("```json\n{\"brand\":\"Acme\"}\n```").unwrap();
        assert_eq!(value, json!({"brand": "Acme"}));
    }

    #[test]
    fn decodes_payload_wrapped_in_prose() {
        let value = decode_json("Here is the audit: {\"score\": 40} Hope this helps!").unwrap();
        assert_eq!(value["score"], 40);
    }

    #[test]
    fn repairs_raw_newlines_inside_strings() {
        let value = decode_json("{\"winner_summary\": \"Line one\nLine two\"}").unwrap();
        assert!(value["winner_summary"]
            .as_str()
            .unwrap()
            .contains("Line two"));
    }

    #[test]
    fn falls_back_to_json5() {
        let value = decode_json("{brand: 'Acme', score: 12,}").unwrap();
        assert_eq!(value["brand"], "Acme");
    }

    #[test]
    fn closes_truncated_payloads() {
        let sanitized = sanitize_json_strings("{\"advice\": [\"one\", \"two");
        assert_eq!(sanitized, "{\"advice\": [\"one\", \"two\"]}");
    }

    #[test]
    fn closes_nested_structures_innermost_first() {
        let sanitized = sanitize_json_strings("{\"citations\":[{\"source\":\"g2");
        assert_eq!(sanitized, "{\"citations\":[{\"source\":\"g2\"}]}");

        let value = decode_json("{\"citations\":[{\"source\":\"g2").unwrap();
        assert_eq!(value["citations"][0]["source"], "g2");
    }

    #[test]
    fn drops_dangling_escape_before_closing_string() {
        let sanitized = sanitize_json_strings("{\"note\": \"ends with \\");
        assert_eq!(sanitized, "{\"note\": \"ends with \"}");
    }

    #[test]
    fn brackets_inside_strings_do_not_count_as_open() {
        let sanitized = sanitize_json_strings("{\"note\": \"a [b {c\", \"list\": [1");
        assert_eq!(sanitized, "{\"note\": \"a [b {c\", \"list\": [1]}");
    }

    #[test]
    fn decodes_fence_with_uppercase_info_string() {
        let value = decode_json("```JSON\n{\"brand\":\"Acme\"}\n```").unwrap();
        assert_eq!(value["brand"], "Acme");

        let value = decode_json("```json5\n{brand: 'Acme',}\n```").unwrap();
        assert_eq!(value["brand"], "Acme");
    }

    #[test]
    fn fenced_prose_falls_through_to_slicing() {
        let value = decode_json("```\nSure! Here it is: {\"score\": 40} Enjoy.\n```").unwrap();
        assert_eq!(value["score"], 40);
    }

    #[test]
    fn decodes_array_wrapped_in_prose() {
        let value =
            decode_json("Findings below:\n[{\"fact\": \"Free plan\", \"severity\": \"High\"}]\nDone.")
                .unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["fact"], "Free plan");
    }

    #[test]
    fn keeps_truncated_prose_wrapped_payload_for_repair() {
        let value = decode_json("Here you go: {\"advice\": [\"one\", \"two").unwrap();
        assert_eq!(value["advice"][1], "two");
    }

    #[test]
    fn rejects_empty_and_prose_replies() {
        assert!(matches!(
            decode_json("   "),
            Err(ValidationError::InvalidJson { .. })
        ));
        assert!(matches!(
            decode_json("I cannot help with that."),
            Err(ValidationError::InvalidJson { .. })
        ));
    }

    fn json_body_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("{\"brand\":\"Acme\"}".to_string()),
            Just("{\"score\":55,\"advice\":[\"a\"]}".to_string()),
            Just("{\n  \"winner_summary\": \"Nested\"\n}".to_string())
        ]
    }

    proptest! {
        #[test]
        fn extract_json_payload_strips_known_fences(body in json_body_strategy()) {
            let fenced = format!("```json\n{}\n```", body);
            prop_assert_eq!(extract_json_payload(&fenced), body.trim());

            let bare_fence = format!(" ``` {} ``` ", body);
            prop_assert_eq!(extract_json_payload(&bare_fence), body.trim());
        }

        #[test]
        fn extract_json_payload_preserves_unfenced(text in json_body_strategy()) {
            let decorated = format!("\n  {}\n ", text);
            prop_assert_eq!(extract_json_payload(&decorated), text.trim());
        }
    }
}
