use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::RegistryError;

/// An immutable named setting with its own realities, NPCs and starting flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub description: String,
    pub initial_reality: String,

    #[serde(default)]
    pub initial_flags: Map<String, Value>,

    #[serde(default)]
    pub npcs: BTreeMap<String, NpcDescriptor>,

    pub realities: BTreeMap<String, Reality>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcDescriptor {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub initial_dialogue: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reality {
    pub description: String,

    #[serde(default)]
    pub available_actions: Vec<String>,
}

/// Short listing entry for `/scenario`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Read-only scenario table, built once at startup and shared between
/// sessions.
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, Scenario>,
}

impl ScenarioRegistry {
    pub fn new(scenarios: Vec<Scenario>) -> Result<Self, RegistryError> {
        if scenarios.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut table = BTreeMap::new();
        for scenario in scenarios {
            if !scenario.realities.contains_key(&scenario.initial_reality) {
                return Err(RegistryError::UnknownInitialReality {
                    scenario: scenario.id,
                    reality: scenario.initial_reality,
                });
            }
            if table.contains_key(&scenario.id) {
                return Err(RegistryError::Duplicate(scenario.id));
            }
            table.insert(scenario.id.clone(), scenario);
        }

        Ok(Self { scenarios: table })
    }

    /// Parses a JSON array of scenarios.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let scenarios: Vec<Scenario> = serde_json::from_str(json)?;
        Self::new(scenarios)
    }

    pub fn builtin() -> Self {
        let scenarios = vec![medieval_forest(), space_mission()];
        let scenarios = scenarios
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        Self { scenarios }
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    pub fn list(&self) -> Vec<ScenarioSummary> {
        self.scenarios
            .values()
            .map(|s| ScenarioSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                description: s.description.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn flags(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn reality(description: &str, actions: &[&str]) -> Reality {
    Reality {
        description: description.into(),
        available_actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}

fn medieval_forest() -> Scenario {
    let mut npcs = BTreeMap::new();
    npcs.insert(
        "old_hermit".to_string(),
        NpcDescriptor {
            name: "Old Hermit".into(),
            description: "A wise but reclusive hermit who knows the forest well.".into(),
            personality: "Eccentric but kind, speaks in riddles".into(),
            initial_dialogue: "Ah, a traveler in these ancient woods. What brings you here?".into(),
            location: "forest_clearing".into(),
        },
    );

    let mut realities = BTreeMap::new();
    realities.insert(
        "daylight".to_string(),
        reality(
            "The forest is bathed in warm sunlight filtering through the leaves.",
            &["explore", "talk to npc", "rest"],
        ),
    );
    realities.insert(
        "twilight".to_string(),
        reality(
            "The sun is setting, casting long shadows through the trees.",
            &["explore", "make camp", "light torch"],
        ),
    );

    Scenario {
        id: "medieval_forest".into(),
        name: "The Enchanted Forest".into(),
        description: "A mystical forest filled with magic and mystery.".into(),
        initial_reality: "daylight".into(),
        initial_flags: flags(json!({
            "hasMetGuide": false,
            "foundAncientArtifact": false,
        })),
        npcs,
        realities,
    }
}

fn space_mission() -> Scenario {
    let mut npcs = BTreeMap::new();
    npcs.insert(
        "captain".to_string(),
        NpcDescriptor {
            name: "Captain Nova".into(),
            description: "The experienced captain of the starship.".into(),
            personality: "Commanding but fair, values efficiency".into(),
            initial_dialogue: "Welcome aboard, crew member. We have a mission to complete.".into(),
            location: "bridge".into(),
        },
    );

    let mut realities = BTreeMap::new();
    realities.insert(
        "ship_bridge".to_string(),
        reality(
            "The command center of the starship, filled with holographic displays.",
            &["check status", "talk to crew", "navigate"],
        ),
    );
    realities.insert(
        "space_walk".to_string(),
        reality(
            "Floating in the void of space, tethered to the ship.",
            &["repair hull", "return to airlock", "observe"],
        ),
    );

    Scenario {
        id: "space_mission".into(),
        name: "Deep Space Expedition".into(),
        description: "A perilous journey through uncharted space.".into(),
        initial_reality: "ship_bridge".into(),
        initial_flags: flags(json!({
            "hasMetCaptain": false,
            "shipStatus": "nominal",
        })),
        npcs,
        realities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scenarios_have_expected_defaults() {
        let registry = ScenarioRegistry::builtin();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("medieval_forest").unwrap().initial_reality,
            "daylight"
        );
        assert_eq!(
            registry.get("space_mission").unwrap().initial_reality,
            "ship_bridge"
        );
    }

    #[test]
    fn builtin_passes_validation() {
        let scenarios = vec![medieval_forest(), space_mission()];
        assert!(ScenarioRegistry::new(scenarios).is_ok());
    }

    #[test]
    fn rejects_initial_reality_not_in_table() {
        let mut broken = medieval_forest();
        broken.initial_reality = "midnight".into();

        let err = ScenarioRegistry::new(vec![broken]).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownInitialReality { .. }));
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert!(matches!(
            ScenarioRegistry::new(Vec::new()),
            Err(RegistryError::Empty)
        ));
        assert!(matches!(
            ScenarioRegistry::new(vec![space_mission(), space_mission()]),
            Err(RegistryError::Duplicate(_))
        ));
    }

    #[test]
    fn loads_scenarios_from_json() {
        let json = r#"[{
            "id": "harbor",
            "name": "Fog Harbor",
            "description": "Docks at dawn.",
            "initialReality": "fog",
            "realities": { "fog": { "description": "Thick fog." } }
        }]"#;

        let registry = ScenarioRegistry::from_json_str(json).unwrap();
        let harbor = registry.get("harbor").unwrap();
        assert!(harbor.npcs.is_empty());
        assert!(harbor.realities["fog"].available_actions.is_empty());
        assert_eq!(registry.list()[0].name, "Fog Harbor");
    }
}
