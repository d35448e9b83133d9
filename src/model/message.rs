use crate::model::narrative::NarrationResult;
use crate::model::scenario::ScenarioSummary;
use crate::model::verdict::ConstraintVerdict;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHelp {
    pub usage: &'static str,
    pub description: &'static str,
}

/// Everything the router can hand back to the caller for one input.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Narration {
        result: NarrationResult,
        verdict: ConstraintVerdict,
    },
    Dialogue {
        npc_id: String,
        npc_name: String,
        result: NarrationResult,
        verdict: ConstraintVerdict,
    },
    /// The narration backend failed outright. Still renderable.
    NarratorError {
        message: String,
        details: String,
    },
    /// A flagged input refused without consulting the narrator.
    Blocked {
        message: String,
        verdict: ConstraintVerdict,
    },
    Info(String),
    Help(Vec<CommandHelp>),
    Inventory(Vec<String>),
    RealitySwitched {
        reality_id: String,
        description: String,
    },
    ScenarioLoaded {
        scenario_id: String,
        name: String,
        reality_id: String,
        opening: Option<NarrationResult>,
    },
    Scenarios(Vec<ScenarioSummary>),
    DialogueStarted {
        npc_id: String,
        npc_name: String,
        greeting: String,
    },
    DialogueEnded {
        npc_name: Option<String>,
    },
}

impl Reply {
    /// The narration carried by this reply, if it went through the narrator.
    pub fn narration(&self) -> Option<&NarrationResult> {
        match self {
            Reply::Narration { result, .. } | Reply::Dialogue { result, .. } => Some(result),
            Reply::ScenarioLoaded { opening, .. } => opening.as_ref(),
            _ => None,
        }
    }
}
