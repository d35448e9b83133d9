use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::Settings;
use crate::engine::llm_client::{ChatBackend, ChatRequest};
use crate::engine::narrative_parser::parse_narration;
use crate::engine::prompt_builder::{PromptBuilder, NARRATOR_SYSTEM};
use crate::engine::streaming::stream_completion;
use crate::error::InternalFault;
use crate::model::game_context::{DialoguePartner, GameContext};
use crate::model::narrative::{NarrationInput, NarrationOutcome, NarrationResult};

const WAITING_NARRATION: &str = "The narrator waits patiently for your input...";

#[derive(Debug, Clone, PartialEq)]
pub struct NarratorConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: "llama3".into(),
            temperature: 0.7,
            max_tokens: 300,
            stream: true,
        }
    }
}

impl From<&Settings> for NarratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.narrator_model.clone(),
            temperature: settings.narrator_temperature,
            max_tokens: settings.narrator_max_tokens,
            stream: settings.stream_narration,
        }
    }
}

/// Talks to the narration backend. Always returns renderable text.
pub struct NarrationEngine {
    backend: Option<Arc<dyn ChatBackend>>,
    config: NarratorConfig,
}

impl NarrationEngine {
    pub fn new(backend: Option<Arc<dyn ChatBackend>>, config: NarratorConfig) -> Self {
        Self { backend, config }
    }

    pub fn is_online(&self) -> bool {
        self.backend.is_some()
    }

    pub fn narrate(
        &self,
        input: &NarrationInput,
        context: &GameContext,
        on_fragment: &mut dyn FnMut(&str),
    ) -> NarrationOutcome {
        if input.text().trim().is_empty() {
            return NarrationOutcome::Narrated(waiting());
        }
        let prompt = PromptBuilder::narration(context, input);
        self.run(prompt, input, on_fragment)
    }

    /// Narrates a reply from the NPC the player is talking to.
    pub fn converse(
        &self,
        npc: &DialoguePartner,
        input: &NarrationInput,
        context: &GameContext,
        on_fragment: &mut dyn FnMut(&str),
    ) -> NarrationOutcome {
        if input.text().trim().is_empty() {
            return NarrationOutcome::Narrated(waiting());
        }
        let prompt = PromptBuilder::dialogue(context, npc, input);
        self.run(prompt, input, on_fragment)
    }

    /// Introduces a freshly loaded scenario.
    pub fn open(&self, context: &GameContext, on_fragment: &mut dyn FnMut(&str)) -> NarrationOutcome {
        let input = NarrationInput::Action(PromptBuilder::opening(context));
        self.narrate(&input, context, on_fragment)
    }

    fn run(
        &self,
        prompt: String,
        input: &NarrationInput,
        on_fragment: &mut dyn FnMut(&str),
    ) -> NarrationOutcome {
        let Some(backend) = &self.backend else {
            warn!("narration backend not available, using default narration");
            return NarrationOutcome::Narrated(NarrationResult::offline());
        };

        let request = ChatRequest::json(
            &self.config.model,
            NARRATOR_SYSTEM,
            prompt,
            self.config.temperature,
            self.config.max_tokens,
        );

        let raw = if self.config.stream {
            stream_completion(backend.as_ref(), &request, on_fragment)
        } else {
            backend.complete(&request)
        };

        let text = match raw {
            Ok(text) => text,
            Err(e) => {
                let fault = InternalFault::NarrationUnavailable(e.to_string());
                error!(error = %fault, "error generating narration");
                return NarrationOutcome::Failed {
                    fallback: NarrationResult::failed(),
                    fault,
                };
            }
        };
        debug!(bytes = text.len(), "narrator reply received");

        let (mut result, fault) = parse_narration(&text);
        if let Some(fault) = fault {
            warn!(error = %fault, "narrator reply was not structured, using raw text");
        }

        // A flagged action never gets to change the world.
        if matches!(input, NarrationInput::Violation { .. }) && result.state_delta.take().is_some() {
            warn!("dropping state delta proposed for a flagged action");
        }

        NarrationOutcome::Narrated(result)
    }
}

fn waiting() -> NarrationResult {
    NarrationResult::new(
        WAITING_NARRATION,
        vec![
            "Look around".into(),
            "Check inventory".into(),
            "Ask for help".into(),
        ],
    )
}
