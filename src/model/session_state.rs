use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GameError;
use crate::model::narrative::NarrationResult;
use crate::model::scenario::{NpcDescriptor, Reality, Scenario, ScenarioRegistry};
use crate::model::verdict::ConstraintVerdict;

/// The single mutable record of one play session.
///
/// Scenario, reality, dialogue and history only change through the
/// transition methods below; `player`, `npcs` and `flags` are open to
/// narrator-proposed deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub(crate) scenario_id: Option<String>,
    pub(crate) reality_id: Option<String>,

    pub player: PlayerState,
    pub npcs: BTreeMap<String, NpcSnapshot>,
    pub flags: Map<String, Value>,

    pub(crate) history: Vec<TurnRecord>,
    pub(crate) dialogue: DialogueState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub name: String,
    pub inventory: Vec<String>,
    pub health: i32,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NpcSnapshot {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub initial_dialogue: String,
    pub location: String,
}

impl From<&NpcDescriptor> for NpcSnapshot {
    fn from(npc: &NpcDescriptor) -> Self {
        Self {
            name: npc.name.clone(),
            description: npc.description.clone(),
            personality: npc.personality.clone(),
            initial_dialogue: npc.initial_dialogue.clone(),
            location: npc.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueState {
    pub active: bool,
    pub npc_id: Option<String>,
}

/// One processed turn. History is append-only and in temporal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub input: String,
    pub verdict: ConstraintVerdict,
    pub narration: NarrationResult,
    pub timestamp: DateTime<Utc>,
}

impl TurnRecord {
    pub fn now(input: impl Into<String>, verdict: ConstraintVerdict, narration: NarrationResult) -> Self {
        Self {
            input: input.into(),
            verdict,
            narration,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Exploring,
    InDialogue,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            name: "Adventurer".to_string(),
            inventory: Vec::new(),
            health: 100,
            position: Position::default(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(PlayerState::default())
    }
}

impl SessionState {
    pub fn new(player: PlayerState) -> Self {
        Self {
            scenario_id: None,
            reality_id: None,
            player,
            npcs: BTreeMap::new(),
            flags: Map::new(),
            history: Vec::new(),
            dialogue: DialogueState::default(),
        }
    }

    pub fn scenario_id(&self) -> Option<&str> {
        self.scenario_id.as_deref()
    }

    pub fn reality_id(&self) -> Option<&str> {
        self.reality_id.as_deref()
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    pub fn dialogue(&self) -> &DialogueState {
        &self.dialogue
    }

    pub fn phase(&self) -> Phase {
        match (&self.scenario_id, self.dialogue.active) {
            (None, _) => Phase::Idle,
            (Some(_), false) => Phase::Exploring,
            (Some(_), true) => Phase::InDialogue,
        }
    }

    pub fn scenario<'r>(&self, registry: &'r ScenarioRegistry) -> Option<&'r Scenario> {
        self.scenario_id.as_deref().and_then(|id| registry.get(id))
    }

    pub fn reality<'r>(&self, registry: &'r ScenarioRegistry) -> Option<&'r Reality> {
        let scenario = self.scenario(registry)?;
        scenario.realities.get(self.reality_id.as_deref()?)
    }

    /// The NPC currently bound to dialogue, if any.
    pub fn dialogue_partner(&self) -> Option<(&str, &NpcSnapshot)> {
        let id = self.dialogue.npc_id.as_deref()?;
        if !self.dialogue.active {
            return None;
        }
        self.npcs.get_key_value(id).map(|(k, v)| (k.as_str(), v))
    }

    /// Loads a scenario from scratch: initial reality, flags and NPCs,
    /// dialogue closed, history cleared. The player carries over.
    pub fn load_scenario<'r>(
        &mut self,
        registry: &'r ScenarioRegistry,
        scenario_id: &str,
    ) -> Result<&'r Scenario, GameError> {
        let Some(scenario) = registry.get(scenario_id) else {
            return Err(GameError::ScenarioNotFound(scenario_id.to_string()));
        };

        self.scenario_id = Some(scenario.id.clone());
        self.reality_id = Some(scenario.initial_reality.clone());
        self.npcs = scenario
            .npcs
            .iter()
            .map(|(id, npc)| (id.clone(), NpcSnapshot::from(npc)))
            .collect();
        self.flags = scenario.initial_flags.clone();
        self.history.clear();
        self.dialogue = DialogueState::default();

        Ok(scenario)
    }

    /// Changes only the reality; everything else is left untouched.
    pub fn switch_reality<'r>(
        &mut self,
        registry: &'r ScenarioRegistry,
        reality_id: &str,
    ) -> Result<&'r Reality, GameError> {
        let Some(scenario) = self.scenario(registry) else {
            return Err(GameError::NoActiveScenario);
        };
        let Some(reality) = scenario.realities.get(reality_id) else {
            return Err(GameError::RealityNotFound(reality_id.to_string()));
        };

        self.reality_id = Some(reality_id.to_string());
        Ok(reality)
    }

    /// Binds dialogue to an NPC. Accepts the NPC id, its display name, or
    /// the id written with spaces ("old hermit").
    pub fn enter_dialogue(&mut self, query: &str) -> Result<String, GameError> {
        if self.scenario_id.is_none() {
            return Err(GameError::NoActiveScenario);
        }
        let Some(npc_id) = self.resolve_npc(query) else {
            return Err(GameError::NpcNotFound(query.to_string()));
        };

        self.dialogue = DialogueState {
            active: true,
            npc_id: Some(npc_id.clone()),
        };
        Ok(npc_id)
    }

    /// Returns the id of the NPC the player was talking to, if any.
    pub fn exit_dialogue(&mut self) -> Option<String> {
        let previous = std::mem::take(&mut self.dialogue);
        previous.npc_id.filter(|_| previous.active)
    }

    pub fn resolve_npc(&self, query: &str) -> Option<String> {
        let query = query.trim();
        if self.npcs.contains_key(query) {
            return Some(query.to_string());
        }

        let normalized = query.to_lowercase().replace(' ', "_");
        self.npcs
            .iter()
            .find(|(id, npc)| {
                id.to_lowercase() == normalized || npc.name.eq_ignore_ascii_case(query)
            })
            .map(|(id, _)| id.clone())
    }

    pub(crate) fn record_turn(&mut self, record: TurnRecord) {
        self.history.push(record);
    }
}
