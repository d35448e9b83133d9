use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InternalFault;
use crate::model::verdict::ConstraintVerdict;

pub const FALLBACK_NARRATION: &str = "The narrator pauses, considering your words...";

pub const OFFLINE_NARRATION: &str =
    "The narrator seems to be lost in thought... (narration service not available)";

pub const FAILED_NARRATION: &str = "The narrator seems to be at a loss for words...";

/// Output returned to the caller for a narrated turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationResult {
    /// Never empty.
    pub narration: String,
    pub suggested_actions: Vec<String>,
    pub state_delta: Option<Map<String, Value>>,
    pub degraded: bool,
}

impl NarrationResult {
    pub fn new(narration: impl Into<String>, suggested_actions: Vec<String>) -> Self {
        let narration = narration.into();
        let narration = if narration.trim().is_empty() {
            FALLBACK_NARRATION.to_string()
        } else {
            narration
        };

        Self {
            narration,
            suggested_actions,
            state_delta: None,
            degraded: false,
        }
    }

    /// Used when no narration backend is configured or reachable.
    pub fn offline() -> Self {
        Self {
            degraded: true,
            ..Self::new(
                OFFLINE_NARRATION,
                vec!["Try again later".into(), "Check the narration service".into()],
            )
        }
    }

    pub fn failed() -> Self {
        Self {
            degraded: true,
            ..Self::new(FAILED_NARRATION, Vec::new())
        }
    }
}

/// What the narrator is asked to respond to.
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationInput {
    Action(String),

    /// A flagged action handed to the narrator for an in-world response
    /// instead of a hard block.
    Violation {
        original_input: String,
        verdict: ConstraintVerdict,
    },
}

impl NarrationInput {
    pub fn text(&self) -> &str {
        match self {
            NarrationInput::Action(text) => text,
            NarrationInput::Violation { original_input, .. } => original_input,
        }
    }
}

/// Result of a narration attempt. A failed backend call is reported
/// separately from a merely degraded narration, but both carry renderable
/// text.
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationOutcome {
    Narrated(NarrationResult),
    Failed {
        fallback: NarrationResult,
        fault: InternalFault,
    },
}

impl NarrationOutcome {
    pub fn result(&self) -> &NarrationResult {
        match self {
            NarrationOutcome::Narrated(result) => result,
            NarrationOutcome::Failed { fallback, .. } => fallback,
        }
    }

    pub fn into_result(self) -> NarrationResult {
        match self {
            NarrationOutcome::Narrated(result) => result,
            NarrationOutcome::Failed { fallback, .. } => fallback,
        }
    }
}
