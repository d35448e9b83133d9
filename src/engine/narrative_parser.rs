use crate::engine::streaming::NarrationPreview;
use crate::error::InternalFault;
use crate::model::llm_decode::{decode_narration, Decoded};
use crate::model::narrative::NarrationResult;

/// Turns the aggregated narrator reply into a result. Never fails: when the
/// reply is not the structured shape the text itself becomes the narration,
/// and the returned fault says why.
pub fn parse_narration(raw: &str) -> (NarrationResult, Option<InternalFault>) {
    match decode_narration(raw) {
        Decoded::Parsed(result) => (result, None),
        Decoded::Failed(failure) => {
            // Truncated JSON still usually carries a readable narration prefix.
            let salvaged = NarrationPreview::new().push(raw);
            let narration = if salvaged.trim().is_empty() {
                raw.trim()
            } else {
                salvaged.trim()
            };

            (
                NarrationResult::new(narration, Vec::new()),
                Some(InternalFault::NarrationParse(failure.to_string())),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::narrative::FALLBACK_NARRATION;

    #[test]
    fn structured_reply_is_used_as_is() {
        let (result, fault) = parse_narration(
            r#"{"narration": "Moss glows underfoot.", "suggestedActions": ["Follow the glow"]}"#,
        );
        assert_eq!(result.narration, "Moss glows underfoot.");
        assert_eq!(result.suggested_actions, vec!["Follow the glow"]);
        assert!(fault.is_none());
    }

    #[test]
    fn plain_text_becomes_the_narration() {
        let (result, fault) = parse_narration("  You step into the clearing.\n");
        assert_eq!(result.narration, "You step into the clearing.");
        assert!(result.suggested_actions.is_empty());
        assert!(matches!(fault, Some(InternalFault::NarrationParse(_))));
    }

    #[test]
    fn truncated_json_keeps_partial_narration() {
        let (result, fault) =
            parse_narration(r#"{"narration": "The captain turns toward you and says \"We"#);
        assert_eq!(result.narration, "The captain turns toward you and says \"We");
        assert!(fault.is_some());
    }

    #[test]
    fn fenced_truncated_json_keeps_partial_narration() {
        let (result, fault) = parse_narration("```json\n{\"narration\": \"Fog rolls in over the");
        assert_eq!(result.narration, "Fog rolls in over the");
        assert!(fault.is_some());
    }

    #[test]
    fn broken_json_without_narration_is_kept_verbatim() {
        let (result, _) = parse_narration(r#"{"suggestedActions": ["run"#);
        assert_eq!(result.narration, r#"{"suggestedActions": ["run"#);
    }

    #[test]
    fn empty_reply_gets_fallback_text() {
        let (result, fault) = parse_narration("");
        assert_eq!(result.narration, FALLBACK_NARRATION);
        assert!(fault.is_none());
    }

    #[test]
    fn non_object_json_is_treated_as_text() {
        let (result, fault) = parse_narration("[1, 2, 3]");
        assert_eq!(result.narration, "[1, 2, 3]");
        assert!(fault.is_some());
    }
}
