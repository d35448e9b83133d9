use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::InternalFault;
use crate::model::session_state::SessionState;

/// Keys owned by the state machine. Deltas never touch them.
pub const PROTECTED_KEYS: [&str; 4] = ["scenarioId", "realityId", "history", "dialogue"];

/// Keys a delta is allowed to change.
pub const MUTABLE_KEYS: [&str; 3] = ["player", "npcs", "flags"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Object merged one level deep, delta wins.
    Merged,
    Replaced,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaReport {
    pub results: Vec<(String, KeyOutcome)>,
}

impl DeltaReport {
    pub fn applied(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| !matches!(outcome, KeyOutcome::Skipped { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results.len() - self.applied()
    }
}

/// Applies a narrator-proposed delta to the session.
///
/// The merge runs on a serialized copy and is only committed when the
/// result still decodes as a `SessionState`, so a bad delta leaves the
/// session exactly as it was.
pub fn apply_delta(
    delta: &Map<String, Value>,
    state: Option<&mut SessionState>,
) -> Result<DeltaReport, InternalFault> {
    let Some(state) = state else {
        warn!("no session state to apply delta to");
        return Ok(DeltaReport::default());
    };
    if delta.is_empty() {
        return Ok(DeltaReport::default());
    }

    let mut doc = match serde_json::to_value(&*state) {
        Ok(Value::Object(doc)) => doc,
        Ok(_) => {
            return Err(InternalFault::StateApply(
                "session state did not serialize to an object".into(),
            ))
        }
        Err(e) => return Err(InternalFault::StateApply(e.to_string())),
    };

    let mut report = DeltaReport::default();
    for (key, incoming) in delta {
        let outcome = merge_key(&mut doc, key, incoming);
        if let KeyOutcome::Skipped { reason } = &outcome {
            warn!(key = %key, reason = %reason, "state delta key ignored");
        }
        report.results.push((key.clone(), outcome));
    }

    if report.applied() == 0 {
        return Ok(report);
    }

    let next: SessionState = serde_json::from_value(Value::Object(doc))
        .map_err(|e| InternalFault::StateApply(e.to_string()))?;
    *state = next;

    debug!(applied = report.applied(), skipped = report.skipped(), "state delta applied");
    Ok(report)
}

fn merge_key(doc: &mut Map<String, Value>, key: &str, incoming: &Value) -> KeyOutcome {
    if PROTECTED_KEYS.contains(&key) {
        return KeyOutcome::Skipped {
            reason: "protected".into(),
        };
    }
    if !MUTABLE_KEYS.contains(&key) {
        return KeyOutcome::Skipped {
            reason: "unknown state key".into(),
        };
    }

    match (doc.get_mut(key), incoming) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                existing.insert(k.clone(), v.clone());
            }
            KeyOutcome::Merged
        }
        _ => {
            doc.insert(key.to_string(), incoming.clone());
            KeyOutcome::Replaced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::scenario::ScenarioRegistry;

    fn delta(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("delta must be an object"),
        }
    }

    fn forest() -> SessionState {
        let registry = ScenarioRegistry::builtin();
        let mut state = SessionState::default();
        state.load_scenario(&registry, "medieval_forest").unwrap();
        state
    }

    #[test]
    fn flags_are_merged_one_level() {
        let mut state = SessionState::default();
        state.flags.insert("a".into(), json!(1));

        let report = apply_delta(&delta(json!({"flags": {"b": 2}})), Some(&mut state)).unwrap();

        assert_eq!(state.flags.get("a"), Some(&json!(1)));
        assert_eq!(state.flags.get("b"), Some(&json!(2)));
        assert_eq!(report.results, vec![("flags".to_string(), KeyOutcome::Merged)]);
    }

    #[test]
    fn nested_objects_are_replaced_not_deep_merged() {
        let mut state = SessionState::default();
        state.flags.insert("quest".into(), json!({"stage": 1, "giver": "hermit"}));

        apply_delta(&delta(json!({"flags": {"quest": {"stage": 2}}})), Some(&mut state)).unwrap();

        assert_eq!(state.flags.get("quest"), Some(&json!({"stage": 2})));
    }

    #[test]
    fn arrays_are_overwritten() {
        let mut state = SessionState::default();
        state.player.inventory = vec!["rope".into(), "torch".into()];

        apply_delta(
            &delta(json!({"player": {"inventory": ["mysterious_stone"]}})),
            Some(&mut state),
        )
        .unwrap();

        assert_eq!(state.player.inventory, vec!["mysterious_stone"]);
        assert_eq!(state.player.health, 100);
        assert_eq!(state.player.name, "Adventurer");
    }

    #[test]
    fn protected_keys_are_skipped() {
        let mut state = forest();
        let before_scenario = state.scenario_id().map(str::to_string);

        let report = apply_delta(
            &delta(json!({
                "scenarioId": "space_mission",
                "realityId": "space_walk",
                "history": [],
                "flags": {"torchLit": true}
            })),
            Some(&mut state),
        )
        .unwrap();

        assert_eq!(state.scenario_id().map(str::to_string), before_scenario);
        assert_eq!(state.reality_id(), Some("daylight"));
        assert_eq!(state.flags.get("torchLit"), Some(&json!(true)));
        assert_eq!(report.skipped(), 3);
        assert_eq!(report.applied(), 1);
    }

    #[test]
    fn unknown_top_level_keys_are_skipped() {
        let mut state = SessionState::default();
        let before = state.clone();

        let report = apply_delta(&delta(json!({"gold": 500})), Some(&mut state)).unwrap();

        assert_eq!(state, before);
        assert_eq!(
            report.results,
            vec![(
                "gold".to_string(),
                KeyOutcome::Skipped {
                    reason: "unknown state key".into()
                }
            )]
        );
    }

    #[test]
    fn type_mismatch_leaves_state_untouched() {
        let mut state = forest();
        let before = state.clone();

        let err = apply_delta(
            &delta(json!({"flags": {"ok": 1}, "player": {"health": "plenty"}})),
            Some(&mut state),
        )
        .unwrap_err();

        assert!(matches!(err, InternalFault::StateApply(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn non_object_flags_are_rejected_atomically() {
        let mut state = forest();
        let before = state.clone();

        assert!(apply_delta(&delta(json!({"flags": 5})), Some(&mut state)).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn npc_snapshots_can_be_updated() {
        let mut state = forest();

        apply_delta(
            &delta(json!({"npcs": {"old_hermit": {"name": "Old Hermit", "location": "river"}}})),
            Some(&mut state),
        )
        .unwrap();

        let hermit = &state.npcs["old_hermit"];
        assert_eq!(hermit.location, "river");
        // Replaced wholesale: fields the delta omitted fall back to defaults.
        assert!(hermit.personality.is_empty());
    }

    #[test]
    fn missing_state_is_a_noop() {
        let report = apply_delta(&delta(json!({"flags": {"x": 1}})), None).unwrap();
        assert!(report.results.is_empty());
    }

    #[test]
    fn empty_delta_changes_nothing() {
        let mut state = forest();
        let before = state.clone();
        let report = apply_delta(&Map::new(), Some(&mut state)).unwrap();
        assert_eq!(state, before);
        assert_eq!(report.applied(), 0);
    }
}
