//! Response normalisation: untrusted model text in, fully-populated result out.
//!
//! Model output is parsed into a generic [`serde_json::Value`] first and then
//! projected field by field into [`GateResult`] or [`DraftResult`], with an
//! explicit coercion rule per field:
//!
//! | Field kind | Missing / `null` | Wrong shape |
//! |------------|------------------|-------------|
//! | boolean | `false` | `"true"` (any case) and non-zero numbers are `true`, everything else `false` |
//! | string | `""` or a fixed default | scalars use their JSON text |
//! | string list | `[]` | a scalar becomes a one-element list |
//! | confidence | gate: `0.0`, draft: absent | numeric strings are parsed; anything else as missing |
//!
//! `reason` and `description` are passed through verbatim. List elements and
//! the draft title are trimmed; list elements that end up empty are dropped.
//! Confidence is clamped into `[0.0, 1.0]`.
//!
//! The gate path never fails. The draft path fails with [`ModelOutputError`]
//! when no JSON object can be recovered or when `title` is not a non-blank
//! string.
//!
//! Normalisation is pure and idempotent: normalising the serialised form of
//! a normalised result yields the same result.

use serde_json::{Map, Value};

use crate::errors::ModelOutputError;
use crate::types::{Confidence, DraftResult, GateResult};

/// Reason used when the model's gate answer has no `reason` or a `null` one.
pub const DEFAULT_REASON: &str = "No reason provided";

/// Reason reported when the gate answer could not be parsed at all.
pub const UNPARSABLE_REASON: &str = "Model returned an unparsable response";

/// Follow-up question reported alongside [`UNPARSABLE_REASON`].
pub const UNPARSABLE_QUESTION: &str =
    "Could you restate the notes more clearly, including the goal, the expected behaviour, and the scope?";

/// Recovers a JSON object from raw model text.
///
/// The whole text is tried first. Failing that, the span from the first `{`
/// to the last `}` (inclusive) is tried, which strips prose or code fences
/// around a single object. Returns `None` when neither yields an object.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    if let Some(map) = parse_object(raw) {
        return Some(map);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start >= end {
        return None;
    }
    parse_object(&raw[start..=end])
}

/// The deterministic gate answer used when the model output is unusable.
pub fn unparsable_gate_fallback() -> GateResult {
    GateResult::new(
        false,
        UNPARSABLE_REASON.to_string(),
        vec![UNPARSABLE_QUESTION.to_string()],
        Confidence::ZERO,
    )
}

/// Normalises a gate answer. Never fails.
pub fn normalize_gate(raw: &str) -> GateResult {
    let Some(map) = extract_json_object(raw) else {
        return unparsable_gate_fallback();
    };

    let valid = map.get("valid").is_some_and(coerce_bool);
    let reason = map
        .get("reason")
        .and_then(string_form)
        .unwrap_or_else(|| DEFAULT_REASON.to_string());
    let required_questions = string_list(map.get("requiredQuestions"));
    let confidence = map
        .get("confidence")
        .and_then(coerce_confidence)
        .unwrap_or(Confidence::ZERO);

    GateResult::new(valid, reason, required_questions, confidence)
}

/// Normalises a draft answer.
///
/// # Errors
///
/// Returns [`ModelOutputError`] carrying `raw` when no JSON object can be
/// recovered, or when `title` is missing, blank, or not a string.
pub fn normalize_draft(raw: &str) -> Result<DraftResult, ModelOutputError> {
    if raw.trim().is_empty() {
        return Err(ModelOutputError::new("model returned an empty response", raw));
    }

    let map = extract_json_object(raw)
        .ok_or_else(|| ModelOutputError::new("model returned invalid JSON", raw))?;

    let title = map
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ModelOutputError::new("model JSON missing 'title'", raw))?;

    let description = map
        .get("description")
        .and_then(string_form)
        .unwrap_or_default();

    Ok(DraftResult::new(
        title,
        description,
        string_list(map.get("acceptanceCriteria")),
        string_list(map.get("tasks")),
        string_list(map.get("assumptions")),
        map.get("confidence").and_then(coerce_confidence),
    ))
}

// ---------------------------------------------------------------------------
// Per-field coercion
// ---------------------------------------------------------------------------

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// String form of a JSON value; `None` for `null`.
fn string_form(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn coerce_confidence(value: &Value) -> Option<Confidence> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Confidence::clamped(raw)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(string_form).collect(),
        Some(scalar) => string_form(scalar).into_iter().collect(),
    };

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        extract_json_object, normalize_draft, normalize_gate, unparsable_gate_fallback,
        DEFAULT_REASON,
    };

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let raw = "Sure! Here it is:\n```json\n{\"valid\": true}\n```\nAnything else?";
        let map = extract_json_object(raw).expect("object recovered");
        assert_eq!(map.get("valid"), Some(&json!(true)));
    }

    #[test]
    fn non_object_json_is_not_extracted() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("\"just a string\"").is_none());
    }

    #[test]
    fn reversed_braces_are_not_extracted() {
        assert!(extract_json_object("} nothing here {").is_none());
    }

    #[test]
    fn gate_with_all_fields_is_preserved() {
        let raw = r#"{"valid": true, "reason": "Clear goal", "requiredQuestions": [], "confidence": 0.9}"#;
        let gate = normalize_gate(raw);
        assert!(gate.is_valid());
        assert_eq!(gate.reason(), "Clear goal");
        assert!(gate.required_questions().is_empty());
        assert_eq!(gate.confidence().as_f64(), 0.9);
    }

    #[test]
    fn gate_trims_questions_and_drops_blanks() {
        let raw = r#"{"valid": false, "reason": "vague", "requiredQuestions": ["  Who is the user? ", "", "   ", null, "What is the scope?"], "confidence": 0.3}"#;
        let gate = normalize_gate(raw);
        assert_eq!(
            gate.required_questions(),
            ["Who is the user?".to_string(), "What is the scope?".to_string()]
        );
    }

    #[test]
    fn gate_reason_is_kept_verbatim() {
        let padded = normalize_gate(
            r#"{"valid": false, "reason": "  Vague goal ", "requiredQuestions": [], "confidence": 0.5}"#,
        );
        assert_eq!(padded.reason(), "  Vague goal ");

        let empty = normalize_gate(r#"{"valid": false, "reason": "", "confidence": 0.5}"#);
        assert_eq!(empty.reason(), "");
    }

    #[test]
    fn gate_null_reason_takes_default() {
        let gate = normalize_gate(r#"{"valid": true, "reason": null}"#);
        assert_eq!(gate.reason(), DEFAULT_REASON);
    }

    #[test]
    fn gate_missing_fields_take_defaults() {
        let gate = normalize_gate("{}");
        assert!(!gate.is_valid());
        assert_eq!(gate.reason(), DEFAULT_REASON);
        assert!(gate.required_questions().is_empty());
        assert_eq!(gate.confidence().as_f64(), 0.0);
    }

    #[test]
    fn gate_scalar_questions_become_single_element() {
        let gate = normalize_gate(r#"{"requiredQuestions": "What is the goal?"}"#);
        assert_eq!(gate.required_questions(), ["What is the goal?".to_string()]);
    }

    #[test]
    fn gate_coerces_string_values() {
        let gate = normalize_gate(r#"{"valid": "TRUE", "reason": 42, "confidence": " 0.75 "}"#);
        assert!(gate.is_valid());
        assert_eq!(gate.reason(), "42");
        assert_eq!(gate.confidence().as_f64(), 0.75);
    }

    #[test]
    fn gate_unparsable_confidence_becomes_zero() {
        let gate = normalize_gate(r#"{"valid": true, "confidence": "very high"}"#);
        assert_eq!(gate.confidence().as_f64(), 0.0);
    }

    #[test]
    fn gate_unparsable_text_yields_fallback() {
        assert_eq!(normalize_gate("not json at all"), unparsable_gate_fallback());
        assert_eq!(normalize_gate(""), unparsable_gate_fallback());
        assert_eq!(normalize_gate("{ broken"), unparsable_gate_fallback());
    }

    #[test]
    fn draft_scalar_criteria_become_single_element_and_description_defaults() {
        let draft =
            normalize_draft(r#"{"title": "Add login", "acceptanceCriteria": "must support SSO"}"#)
                .expect("title present");
        assert_eq!(draft.title(), "Add login");
        assert_eq!(draft.acceptance_criteria(), ["must support SSO".to_string()]);
        assert_eq!(draft.description(), "");
        assert!(draft.tasks().is_empty());
        assert!(draft.assumptions().is_empty());
        assert!(draft.confidence().is_none());
    }

    #[test]
    fn draft_null_description_becomes_empty() {
        let draft = normalize_draft(r#"{"title": "T", "description": null}"#).expect("valid");
        assert_eq!(draft.description(), "");
    }

    #[test]
    fn draft_missing_title_fails_with_raw_text() {
        let raw = r#"{"description": "x"}"#;
        let err = normalize_draft(raw).expect_err("title missing");
        assert_eq!(err.raw, raw);
    }

    #[test]
    fn draft_blank_or_structured_title_fails() {
        assert!(normalize_draft(r#"{"title": "   "}"#).is_err());
        assert!(normalize_draft(r#"{"title": ["a", "b"]}"#).is_err());
        assert!(normalize_draft(r#"{"title": null}"#).is_err());
    }

    #[test]
    fn draft_boolean_or_numeric_title_fails() {
        assert!(normalize_draft(r#"{"title": false}"#).is_err());
        assert!(normalize_draft(r#"{"title": true}"#).is_err());
        assert!(normalize_draft(r#"{"title": 0}"#).is_err());
        assert!(normalize_draft(r#"{"title": 42}"#).is_err());
    }

    #[test]
    fn draft_title_is_trimmed_but_description_is_verbatim() {
        let raw = r#"{"title": "  Add login ", "description": "    indented code block\nrest"}"#;
        let draft = normalize_draft(raw).expect("valid");
        assert_eq!(draft.title(), "Add login");
        assert_eq!(draft.description(), "    indented code block\nrest");
    }

    #[test]
    fn draft_unparsable_text_fails_with_raw_text() {
        let err = normalize_draft("not json at all").expect_err("not json");
        assert_eq!(err.raw, "not json at all");
    }

    #[test]
    fn draft_empty_text_fails() {
        assert!(normalize_draft("   ").is_err());
    }

    #[test]
    fn draft_confidence_is_clamped_or_absent() {
        let high = normalize_draft(r#"{"title": "T", "confidence": 1.7}"#).expect("valid");
        let low = normalize_draft(r#"{"title": "T", "confidence": -5}"#).expect("valid");
        let junk = normalize_draft(r#"{"title": "T", "confidence": "unsure"}"#).expect("valid");
        assert_eq!(high.confidence().map(|c| c.as_f64()), Some(1.0));
        assert_eq!(low.confidence().map(|c| c.as_f64()), Some(0.0));
        assert!(junk.confidence().is_none());
    }

    #[test]
    fn draft_list_elements_are_trimmed_and_stringified() {
        let draft = normalize_draft(
            r#"{"title": "T", "tasks": [" write tests ", 3, "", true], "assumptions": null}"#,
        )
        .expect("valid");
        assert_eq!(
            draft.tasks(),
            [
                "write tests".to_string(),
                "3".to_string(),
                "true".to_string()
            ]
        );
        assert!(draft.assumptions().is_empty());
    }
}
