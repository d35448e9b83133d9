use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::verdict::DEFAULT_SEVERITY_THRESHOLD;

/// What the router does with an input the gate flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationPolicy {
    /// Hand the violation to the narrator for an in-world response.
    #[default]
    Narrate,
    /// Refuse with a fixed message; the narrator is not called.
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub narrator_model: String,

    /// Stage 2 of the gate is skipped when unset.
    pub classifier_model: Option<String>,

    pub severity_threshold: u8,
    pub min_input_length: usize,
    pub request_timeout_secs: u64,

    pub stream_narration: bool,
    pub debug: bool,

    pub initial_scenario: String,
    pub scenarios_path: Option<PathBuf>,

    pub violation_policy: ViolationPolicy,
    pub command_prefix: char,
    pub player_name: String,

    pub narrator_temperature: f32,
    pub narrator_max_tokens: u32,
    pub classifier_temperature: f32,
    pub classifier_max_tokens: u32,

    /// Number of past turns quoted back to the narrator.
    pub history_window: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:11434".into(),
            narrator_model: "llama3".into(),
            classifier_model: None,

            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            min_input_length: 3,
            request_timeout_secs: 60,

            stream_narration: true,
            debug: false,

            initial_scenario: "medieval_forest".into(),
            scenarios_path: None,

            violation_policy: ViolationPolicy::Narrate,
            command_prefix: '/',
            player_name: "Adventurer".into(),

            narrator_temperature: 0.7,
            narrator_max_tokens: 300,
            classifier_temperature: 1.0,
            classifier_max_tokens: 150,

            history_window: 4,
        }
    }
}

impl Settings {
    /// Applies environment overrides. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.backend_url = url;
        }
        if let Some(model) = get("NARRATION_MODEL") {
            self.narrator_model = model;
        }
        if let Some(model) = get("CONSTRAINT_MODEL") {
            self.classifier_model = Some(model);
        }
        if let Some(scenario) = get("INITIAL_SCENARIO") {
            self.initial_scenario = scenario;
        }
        if let Some(path) = get("NARRATIVE_GATE_SCENARIOS") {
            self.scenarios_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = get("NARRATIVE_GATE_DEBUG") {
            self.debug = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    pub fn severity_threshold(&self) -> u8 {
        self.severity_threshold.clamp(1, crate::model::verdict::MAX_SEVERITY)
    }
}
