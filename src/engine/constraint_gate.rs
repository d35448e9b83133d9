use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Settings;
use crate::engine::llm_client::{ChatBackend, ChatRequest};
use crate::engine::prompt_builder::{PromptBuilder, CLASSIFIER_SYSTEM};
use crate::engine::signatures::{self, SIGNATURE_SET_VERSION};
use crate::error::InternalFault;
use crate::model::game_context::GameContext;
use crate::model::llm_decode::{decode_verdict, Decoded};
use crate::model::verdict::{ConstraintVerdict, DEFAULT_SEVERITY_THRESHOLD};

#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub severity_threshold: u8,
    pub min_input_length: usize,

    /// Stage 2 runs only when a model is set.
    pub classifier_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            min_input_length: 3,
            classifier_model: None,
            temperature: 1.0,
            max_tokens: 150,
        }
    }
}

impl From<&Settings> for GateConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            severity_threshold: settings.severity_threshold(),
            min_input_length: settings.min_input_length,
            classifier_model: settings.classifier_model.clone(),
            temperature: settings.classifier_temperature,
            max_tokens: settings.classifier_max_tokens,
        }
    }
}

/// Two-stage moderation: deterministic signatures, then an optional remote
/// classifier. Fails open once the signatures have cleared the input.
pub struct ConstraintGate {
    backend: Option<Arc<dyn ChatBackend>>,
    config: GateConfig,
}

impl ConstraintGate {
    pub fn new(backend: Option<Arc<dyn ChatBackend>>, config: GateConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn evaluate(&self, input: &str, context: &GameContext) -> ConstraintVerdict {
        let input = input.trim();
        if input.chars().count() < self.config.min_input_length {
            return ConstraintVerdict::allow("too short");
        }

        if let Some(hit) = signatures::scan(input) {
            warn!(
                group = ?hit.group,
                signature = hit.signature,
                signature_set = SIGNATURE_SET_VERSION,
                "input blocked by deterministic signature"
            );
            return ConstraintVerdict::signature_match();
        }

        let (Some(backend), Some(model)) = (&self.backend, &self.config.classifier_model) else {
            debug!("no classifier configured, skipping semantic check");
            return ConstraintVerdict::degraded("classifier not configured");
        };

        let request = ChatRequest::json(
            model,
            CLASSIFIER_SYSTEM,
            PromptBuilder::constraint(context, input),
            self.config.temperature,
            self.config.max_tokens,
        );

        match classify(backend.as_ref(), &request) {
            Ok(raw) => {
                let verdict = raw.floored(self.config.severity_threshold);
                debug!(
                    violation = verdict.violation,
                    severity = verdict.severity,
                    reason = %verdict.reason,
                    "classifier verdict"
                );
                verdict
            }
            Err(fault) => {
                warn!(error = %fault, "constraint check failed, allowing input");
                ConstraintVerdict::degraded("classifier unavailable")
            }
        }
    }
}

fn classify(backend: &dyn ChatBackend, request: &ChatRequest) -> Result<ConstraintVerdict, InternalFault> {
    let raw = backend
        .complete(request)
        .map_err(|e| InternalFault::ClassifierUnavailable(e.to_string()))?;

    match decode_verdict(&raw) {
        Decoded::Parsed(verdict) => Ok(verdict),
        Decoded::Failed(failure) => Err(InternalFault::ClassifierParse(failure.to_string())),
    }
}
