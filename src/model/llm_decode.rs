use serde_json::{Map, Value};

use crate::model::narrative::{NarrationResult, FALLBACK_NARRATION};
use crate::model::verdict::{ConstraintVerdict, MAX_SEVERITY};

pub const DEFAULT_CLASSIFIER_REASON: &str = "No rationale provided by classifier";

/// Outcome of decoding one LLM payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Parsed(T),
    Failed(DecodeFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    NotJson(String),
    UnexpectedShape(&'static str),
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeFailure::NotJson(e) => write!(f, "not valid JSON: {}", e),
            DecodeFailure::UnexpectedShape(what) => write!(f, "unexpected shape: {}", what),
        }
    }
}

/// Decode raw LLM text into a JSON value. Empty output counts as `{}`.
pub fn decode_json(raw: &str) -> Decoded<Value> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Decoded::Parsed(Value::Object(Map::new()));
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => Decoded::Parsed(value),
        Err(e) => {
            // Models sometimes wrap the object in prose.
            if let Some(inner) = outermost_object(text) {
                if let Ok(value) = serde_json::from_str::<Value>(inner) {
                    return Decoded::Parsed(value);
                }
            }
            Decoded::Failed(DecodeFailure::NotJson(e.to_string()))
        }
    }
}

/// Decode a classifier reply into a verdict, filling defaults for missing
/// fields. The severity floor is not applied here.
pub fn decode_verdict(raw: &str) -> Decoded<ConstraintVerdict> {
    let object = match decode_json(raw) {
        Decoded::Parsed(Value::Object(map)) => map,
        Decoded::Parsed(_) => return Decoded::Failed(DecodeFailure::UnexpectedShape("verdict must be an object")),
        Decoded::Failed(failure) => return Decoded::Failed(failure),
    };

    let violation = object.get("violation").and_then(lenient_bool).unwrap_or(false);
    let severity = object
        .get("severity")
        .and_then(lenient_severity)
        .unwrap_or(if violation { 3 } else { 0 });
    let reason = object
        .get("reason")
        .and_then(non_empty_str)
        .unwrap_or_else(|| DEFAULT_CLASSIFIER_REASON.to_string());
    let suggested_replacement = object
        .get("suggestedReplacement")
        .or_else(|| object.get("suggested_replacement"))
        .and_then(non_empty_str);

    Decoded::Parsed(ConstraintVerdict {
        violation,
        severity,
        reason,
        suggested_replacement,
        degraded: false,
    })
}

/// Decode narrator output. Objects get per-field defaults, a bare JSON
/// string is taken as the narration itself.
pub fn decode_narration(raw: &str) -> Decoded<NarrationResult> {
    let object = match decode_json(raw) {
        Decoded::Parsed(Value::Object(map)) => map,
        Decoded::Parsed(Value::String(text)) => {
            return Decoded::Parsed(NarrationResult::new(text, Vec::new()));
        }
        Decoded::Parsed(_) => {
            return Decoded::Failed(DecodeFailure::UnexpectedShape("narration must be an object"));
        }
        Decoded::Failed(failure) => return Decoded::Failed(failure),
    };

    let narration = object
        .get("narration")
        .and_then(non_empty_str)
        .unwrap_or_else(|| FALLBACK_NARRATION.to_string());

    let suggested_actions = object
        .get("suggestedActions")
        .or_else(|| object.get("suggested_actions"))
        .map(string_list)
        .unwrap_or_default();

    let state_delta = object
        .get("stateDelta")
        .or_else(|| object.get("gameStateChanges"))
        .and_then(|v| v.as_object())
        .filter(|delta| !delta.is_empty())
        .cloned();

    let mut result = NarrationResult::new(narration, suggested_actions);
    result.state_delta = state_delta;
    Decoded::Parsed(result)
}

pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json") up to the first newline.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

fn lenient_severity(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, MAX_SEVERITY as f64) as u8)
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(decode_json("  "), Decoded::Parsed(Value::Object(Map::new())));
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"violation\": true, \"severity\": 4}\n```";
        let Decoded::Parsed(verdict) = decode_verdict(raw) else {
            panic!("fenced verdict should decode");
        };
        assert!(verdict.violation);
        assert_eq!(verdict.severity, 4);
    }

    #[test]
    fn finds_object_inside_prose() {
        let raw = "Sure! Here is my answer: {\"violation\": false} Hope that helps.";
        assert!(matches!(decode_verdict(raw), Decoded::Parsed(v) if !v.violation));
    }

    #[test]
    fn verdict_defaults_follow_violation_claim() {
        let Decoded::Parsed(flagged) = decode_verdict(r#"{"violation": "true"}"#) else {
            panic!("should decode");
        };
        assert_eq!(flagged.severity, 3);
        assert_eq!(flagged.reason, DEFAULT_CLASSIFIER_REASON);

        let Decoded::Parsed(clean) = decode_verdict("{}") else {
            panic!("should decode");
        };
        assert!(!clean.violation);
        assert_eq!(clean.severity, 0);
    }

    #[test]
    fn severity_is_clamped_and_parsed_from_strings() {
        let Decoded::Parsed(v) = decode_verdict(r#"{"violation": true, "severity": "9"}"#) else {
            panic!("should decode");
        };
        assert_eq!(v.severity, 5);

        let Decoded::Parsed(v) = decode_verdict(r#"{"severity": -2.4}"#) else {
            panic!("should decode");
        };
        assert_eq!(v.severity, 0);
    }

    #[test]
    fn verdict_rejects_non_json() {
        assert!(matches!(
            decode_verdict("I think this is fine."),
            Decoded::Failed(DecodeFailure::NotJson(_))
        ));
        assert!(matches!(
            decode_verdict("[1, 2]"),
            Decoded::Failed(DecodeFailure::UnexpectedShape(_))
        ));
    }

    #[test]
    fn narration_accepts_legacy_delta_key() {
        let raw = r#"{
            "narration": "The hermit nods.",
            "suggestedActions": ["Ask about the artifact", 7, null, ""],
            "gameStateChanges": {"flags": {"hasMetGuide": true}}
        }"#;
        let Decoded::Parsed(result) = decode_narration(raw) else {
            panic!("should decode");
        };
        assert_eq!(result.narration, "The hermit nods.");
        assert_eq!(result.suggested_actions, vec!["Ask about the artifact", "7"]);
        assert!(result.state_delta.unwrap().contains_key("flags"));
    }

    #[test]
    fn narration_fills_missing_fields() {
        let Decoded::Parsed(result) = decode_narration(r#"{"stateDelta": {}}"#) else {
            panic!("should decode");
        };
        assert_eq!(result.narration, FALLBACK_NARRATION);
        assert!(result.suggested_actions.is_empty());
        assert!(result.state_delta.is_none());
    }
}
