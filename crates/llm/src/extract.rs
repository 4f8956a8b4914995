use recibo_core::ReceiptRecord;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractionErrorKind {
    #[error("no JSON object found in model output")]
    NoJsonFound,
    #[error("JSON block in model output failed to parse")]
    MalformedJson,
    #[error("model output JSON did not match the receipt schema")]
    SchemaMismatch,
}

/// The model produced unusable text. The raw output is always carried along
/// for diagnosis — it is surfaced to the caller, never discarded.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub raw: String,
}

/// Locate the first balanced `{...}` span in free-form model text.
///
/// Tracks brace nesting depth and skips braces inside JSON string literals
/// (escape-aware), so surrounding prose — including prose with stray braces
/// after the object — cannot corrupt the extracted span.
pub fn find_json_block(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        let Some(open) = start else {
            if c == '{' {
                start = Some(i);
                depth = 1;
            }
            continue;
        };
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    // '}' is one byte, inclusive end index is safe.
                    return Some(&text[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse free-form model output into a [`ReceiptRecord`].
///
/// Three failure classes, each preserving the full raw text:
/// no balanced block at all, a block that is not valid JSON, or valid JSON
/// that does not have the Date/Description/Total_Amount shape.
pub fn parse_record(raw: &str) -> Result<ReceiptRecord, ExtractionError> {
    let Some(block) = find_json_block(raw) else {
        return Err(ExtractionError {
            kind: ExtractionErrorKind::NoJsonFound,
            raw: raw.to_string(),
        });
    };

    let value: serde_json::Value = serde_json::from_str(block).map_err(|e| {
        tracing::debug!("JSON block failed to parse: {e}");
        ExtractionError {
            kind: ExtractionErrorKind::MalformedJson,
            raw: raw.to_string(),
        }
    })?;

    serde_json::from_value(value).map_err(|e| {
        tracing::debug!("JSON block did not match schema: {e}");
        ExtractionError {
            kind: ExtractionErrorKind::SchemaMismatch,
            raw: raw.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recibo_core::TotalAmount;

    #[test]
    fn extracts_block_from_surrounding_prose() {
        let raw = "Sure! Here is the JSON: {\"Date\":\"2024-01-01\",\"Description\":[{\"item\":\"Coffee\",\"amount\":4.5}],\"Total_Amount\":4.5} Hope that helps!";
        let record = parse_record(raw).unwrap();
        assert_eq!(record.date, "2024-01-01");
        assert_eq!(record.description.len(), 1);
        assert_eq!(record.description[0].item, "Coffee");
        assert_eq!(record.total_amount, TotalAmount::Amount(4.5));
    }

    #[test]
    fn nested_braces_return_full_outer_object() {
        let raw = r#"{"Date":"N/A","Description":[{"item":"A","amount":1.0}],"Total_Amount":1.0}"#;
        assert_eq!(find_json_block(raw), Some(raw));
    }

    #[test]
    fn stray_trailing_braces_do_not_extend_the_span() {
        let raw = r#"answer: {"a": {"b": 1}} } trailing"#;
        assert_eq!(find_json_block(raw), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn braces_inside_string_literals_are_ignored() {
        let raw = r#"{"item": "weird } name {", "n": 1}"#;
        assert_eq!(find_json_block(raw), Some(raw));
    }

    #[test]
    fn escaped_quotes_inside_strings_are_handled() {
        let raw = r#"{"item": "say \"}\"", "n": 1}"#;
        assert_eq!(find_json_block(raw), Some(raw));
    }

    #[test]
    fn no_brace_yields_no_json_found_with_raw_preserved() {
        let raw = "I could not read the receipt, sorry.";
        let err = parse_record(raw).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::NoJsonFound);
        assert_eq!(err.raw, raw);
    }

    #[test]
    fn unbalanced_block_yields_no_json_found() {
        let raw = r#"{"Date": "2024-01-01""#;
        let err = parse_record(raw).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::NoJsonFound);
    }

    #[test]
    fn invalid_json_block_yields_malformed() {
        let raw = "{not json at all}";
        let err = parse_record(raw).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::MalformedJson);
        assert_eq!(err.raw, raw);
    }

    #[test]
    fn wrong_shape_yields_schema_mismatch() {
        let raw = r#"{"date": "2024-01-01", "items": [], "total": 5.0}"#;
        let err = parse_record(raw).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::SchemaMismatch);
        assert_eq!(err.raw, raw);
    }

    #[test]
    fn total_as_na_literal_parses() {
        let raw = r#"{"Date":"N/A","Description":[],"Total_Amount":"N/A"}"#;
        let record = parse_record(raw).unwrap();
        assert_eq!(record.total_amount, TotalAmount::NotAvailable);
    }

    #[test]
    fn markdown_fenced_output_still_parses_via_brace_matching() {
        let raw = "```json\n{\"Date\":\"2024-02-02\",\"Description\":[],\"Total_Amount\":9.99}\n```";
        let record = parse_record(raw).unwrap();
        assert_eq!(record.date, "2024-02-02");
    }
}
