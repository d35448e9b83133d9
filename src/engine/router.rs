use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Settings, ViolationPolicy};
use crate::engine::apply_delta::apply_delta;
use crate::engine::commands::{parse_command, Command, COMMANDS};
use crate::engine::constraint_gate::ConstraintGate;
use crate::engine::narration::NarrationEngine;
use crate::error::GameError;
use crate::model::game_context::GameContext;
use crate::model::message::Reply;
use crate::model::narrative::{NarrationInput, NarrationOutcome, NarrationResult};
use crate::model::scenario::ScenarioRegistry;
use crate::model::session_state::{SessionState, TurnRecord};

pub const BLOCKED_NARRATION: &str =
    "The world seems to resist your attempt. Nothing happens, and the story waits for you to continue.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub command_prefix: char,
    pub violation_policy: ViolationPolicy,
    pub history_window: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            command_prefix: '/',
            violation_policy: ViolationPolicy::Narrate,
            history_window: 4,
        }
    }
}

impl From<&Settings> for RouterConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            command_prefix: settings.command_prefix,
            violation_policy: settings.violation_policy,
            history_window: settings.history_window,
        }
    }
}

/// The session state machine. Owns the session and sequences every turn:
/// gate, narrate, apply delta, record.
pub struct Router {
    registry: Arc<ScenarioRegistry>,
    state: SessionState,
    gate: ConstraintGate,
    narrator: NarrationEngine,
    config: RouterConfig,
}

impl Router {
    pub fn new(
        registry: Arc<ScenarioRegistry>,
        state: SessionState,
        gate: ConstraintGate,
        narrator: NarrationEngine,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            state,
            gate,
            narrator,
            config,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Routes one line of player input. Narration fragments, if any, are
    /// passed to `on_fragment` while the reply is being produced.
    pub fn handle(&mut self, input: &str, on_fragment: &mut dyn FnMut(&str)) -> Result<Reply, GameError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Reply::Help(COMMANDS.to_vec()));
        }

        if let Some(command) = parse_command(input, self.config.command_prefix) {
            let command = command?;
            debug!(?command, "dispatching command");
            return self.dispatch(command);
        }

        if self.state.scenario_id().is_none() {
            return Err(GameError::NoActiveScenario);
        }
        Ok(self.play_turn(input, on_fragment))
    }

    /// Loads a scenario and narrates its opening. The opening is not part
    /// of the turn history. The `/scenario` command loads without one.
    pub fn load_scenario(
        &mut self,
        scenario_id: &str,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<Reply, GameError> {
        let mut reply = self.switch_scenario(scenario_id)?;

        let opening = if self.narrator.is_online() {
            let context = self.context();
            match self.narrator.open(&context, on_fragment) {
                NarrationOutcome::Narrated(mut result) => {
                    result.state_delta = None;
                    Some(result)
                }
                NarrationOutcome::Failed { fault, .. } => {
                    warn!(error = %fault, "opening narration unavailable");
                    None
                }
            }
        } else {
            None
        };

        if let Reply::ScenarioLoaded { opening: slot, .. } = &mut reply {
            *slot = opening;
        }
        Ok(reply)
    }

    fn switch_scenario(&mut self, scenario_id: &str) -> Result<Reply, GameError> {
        let scenario = self.state.load_scenario(&self.registry, scenario_id)?;
        info!(scenario = %scenario_id, reality = %scenario.initial_reality, "scenario loaded");

        Ok(Reply::ScenarioLoaded {
            scenario_id: scenario.id.clone(),
            name: scenario.name.clone(),
            reality_id: scenario.initial_reality.clone(),
            opening: None,
        })
    }

    fn context(&self) -> GameContext {
        GameContext::build(&self.state, &self.registry, self.config.history_window)
    }

    /// Commands only touch session state, never the gate or the narrator.
    fn dispatch(&mut self, command: Command) -> Result<Reply, GameError> {
        match command {
            Command::Help => Ok(Reply::Help(COMMANDS.to_vec())),

            Command::Inventory => Ok(Reply::Inventory(self.state.player.inventory.clone())),

            Command::Reality(None) => match self.state.reality_id() {
                Some(reality) => Ok(Reply::Info(format!("Current reality: {}", reality))),
                None => Err(GameError::NoActiveScenario),
            },
            Command::Reality(Some(id)) => {
                let reality = self.state.switch_reality(&self.registry, &id)?;
                info!(reality = %id, "reality switched");
                Ok(Reply::RealitySwitched {
                    reality_id: id,
                    description: reality.description.clone(),
                })
            }

            Command::Talk(None) => {
                if self.state.scenario_id().is_none() {
                    return Err(GameError::NoActiveScenario);
                }
                let names: Vec<&str> = self.state.npcs.values().map(|npc| npc.name.as_str()).collect();
                if names.is_empty() {
                    Ok(Reply::Info("There is no one here to talk to.".into()))
                } else {
                    Ok(Reply::Info(format!("You could talk to: {}", names.join(", "))))
                }
            }
            Command::Talk(Some(query)) => {
                let npc_id = self.state.enter_dialogue(&query)?;
                let npc = self.state.npcs.get(&npc_id).cloned().unwrap_or_default();
                info!(npc = %npc_id, "dialogue started");
                Ok(Reply::DialogueStarted {
                    npc_id,
                    npc_name: npc.name,
                    greeting: npc.initial_dialogue,
                })
            }

            Command::Leave => {
                let npc_name = self
                    .state
                    .exit_dialogue()
                    .and_then(|id| self.state.npcs.get(&id).map(|npc| npc.name.clone()));
                Ok(Reply::DialogueEnded { npc_name })
            }

            Command::Scenario(None) => Ok(Reply::Scenarios(self.registry.list())),
            Command::Scenario(Some(id)) => self.switch_scenario(&id),

            Command::Status => Ok(Reply::Info(self.status_line())),
        }
    }

    fn status_line(&self) -> String {
        let Some(scenario) = self.state.scenario(&self.registry) else {
            return "No scenario loaded. Use /scenario to pick one.".into();
        };

        let mut line = format!(
            "{} | reality: {} | health: {} | turns: {}",
            scenario.name,
            self.state.reality_id().unwrap_or("-"),
            self.state.player.health,
            self.state.history().len()
        );
        if let Some((_, npc)) = self.state.dialogue_partner() {
            line.push_str(&format!(" | talking to: {}", npc.name));
        }
        line
    }

    fn play_turn(&mut self, input: &str, on_fragment: &mut dyn FnMut(&str)) -> Reply {
        let context = self.context();
        let verdict = self.gate.evaluate(input, &context);

        if verdict.violation {
            info!(
                severity = verdict.severity,
                reason = %verdict.reason,
                policy = ?self.config.violation_policy,
                "input flagged by constraint gate"
            );

            if self.config.violation_policy == ViolationPolicy::Block {
                let result = NarrationResult::new(BLOCKED_NARRATION, Vec::new());
                self.state
                    .record_turn(TurnRecord::now(input, verdict.clone(), result));
                return Reply::Blocked {
                    message: BLOCKED_NARRATION.to_string(),
                    verdict,
                };
            }
        }

        let narration_input = if verdict.violation {
            NarrationInput::Violation {
                original_input: input.to_string(),
                verdict: verdict.clone(),
            }
        } else {
            NarrationInput::Action(input.to_string())
        };

        let partner = context.dialogue_partner.clone();
        let outcome = match &partner {
            Some(npc) => self.narrator.converse(npc, &narration_input, &context, on_fragment),
            None => self.narrator.narrate(&narration_input, &context, on_fragment),
        };

        let (result, fault) = match outcome {
            NarrationOutcome::Narrated(result) => (result, None),
            NarrationOutcome::Failed { fallback, fault } => (fallback, Some(fault)),
        };

        if let Some(delta) = &result.state_delta {
            if let Err(fault) = apply_delta(delta, Some(&mut self.state)) {
                warn!(error = %fault, "state delta discarded");
            }
        }

        self.state
            .record_turn(TurnRecord::now(input, verdict.clone(), result.clone()));

        match (fault, partner) {
            (Some(fault), _) => Reply::NarratorError {
                message: result.narration,
                details: fault.to_string(),
            },
            (None, Some(npc)) => Reply::Dialogue {
                npc_id: npc.id,
                npc_name: npc.name,
                result,
                verdict,
            },
            (None, None) => Reply::Narration { result, verdict },
        }
    }
}
