use serde_json::{Map, Value};

use crate::model::scenario::ScenarioRegistry;
use crate::model::session_state::SessionState;

/// Read-only view of the session handed to the gate and the narrator for
/// one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameContext {
    pub scenario_name: Option<String>,
    pub scenario_description: Option<String>,
    pub reality_id: Option<String>,
    pub reality_description: Option<String>,
    pub available_actions: Vec<String>,

    pub dialogue_partner: Option<DialoguePartner>,

    pub player_name: String,
    pub inventory: Vec<String>,
    pub flags: Map<String, Value>,

    /// Oldest first.
    pub recent_turns: Vec<RecentTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialoguePartner {
    pub id: String,
    pub name: String,
    pub personality: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTurn {
    pub input: String,
    pub narration: String,
}

impl GameContext {
    pub fn build(state: &SessionState, registry: &ScenarioRegistry, history_window: usize) -> Self {
        let scenario = state.scenario(registry);
        let reality = state.reality(registry);

        let dialogue_partner = state.dialogue_partner().map(|(id, npc)| DialoguePartner {
            id: id.to_string(),
            name: npc.name.clone(),
            personality: npc.personality.clone(),
            description: npc.description.clone(),
        });

        let history = state.history();
        let skip = history.len().saturating_sub(history_window);
        let recent_turns = history[skip..]
            .iter()
            .map(|turn| RecentTurn {
                input: turn.input.clone(),
                narration: turn.narration.narration.clone(),
            })
            .collect();

        Self {
            scenario_name: scenario.map(|s| s.name.clone()),
            scenario_description: scenario.map(|s| s.description.clone()),
            reality_id: state.reality_id().map(str::to_string),
            reality_description: reality.map(|r| r.description.clone()),
            available_actions: reality.map(|r| r.available_actions.clone()).unwrap_or_default(),
            dialogue_partner,
            player_name: state.player.name.clone(),
            inventory: state.player.inventory.clone(),
            flags: state.flags.clone(),
            recent_turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::narrative::NarrationResult;
    use crate::model::session_state::TurnRecord;
    use crate::model::verdict::ConstraintVerdict;

    #[test]
    fn context_reflects_scenario_and_dialogue() {
        let registry = ScenarioRegistry::builtin();
        let mut state = SessionState::default();
        state.load_scenario(&registry, "space_mission").unwrap();
        state.enter_dialogue("captain").unwrap();

        let ctx = GameContext::build(&state, &registry, 4);
        assert_eq!(ctx.scenario_name.as_deref(), Some("Deep Space Expedition"));
        assert_eq!(ctx.reality_id.as_deref(), Some("ship_bridge"));
        assert_eq!(ctx.available_actions.len(), 3);
        assert_eq!(ctx.dialogue_partner.unwrap().name, "Captain Nova");
    }

    #[test]
    fn recent_turns_are_windowed() {
        let registry = ScenarioRegistry::builtin();
        let mut state = SessionState::default();
        state.load_scenario(&registry, "medieval_forest").unwrap();
        for i in 0..5 {
            state.record_turn(TurnRecord::now(
                format!("step {}", i),
                ConstraintVerdict::allow("clean"),
                NarrationResult::new(format!("moved {}", i), Vec::new()),
            ));
        }

        let ctx = GameContext::build(&state, &registry, 2);
        let inputs: Vec<_> = ctx.recent_turns.iter().map(|t| t.input.as_str()).collect();
        assert_eq!(inputs, vec!["step 3", "step 4"]);
    }

    #[test]
    fn idle_session_has_empty_context() {
        let registry = ScenarioRegistry::builtin();
        let ctx = GameContext::build(&SessionState::default(), &registry, 4);
        assert!(ctx.scenario_name.is_none());
        assert!(ctx.available_actions.is_empty());
    }
}
