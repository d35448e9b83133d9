use thiserror::Error;

/// Errors surfaced to the player. These are the only failures that cross
/// the router boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Scenario '{0}' not found")]
    ScenarioNotFound(String),

    #[error("Reality '{0}' not found in current scenario")]
    RealityNotFound(String),

    #[error("No active scenario")]
    NoActiveScenario,

    #[error("NPC '{0}' not found in current scenario")]
    NpcNotFound(String),

    #[error("Unknown command: {0}. Type /help for a list of commands.")]
    UnknownCommand(String),
}

/// Failures talking to the generative backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend reported an error: {0}")]
    Backend(String),

    #[error("malformed backend envelope: {0}")]
    Malformed(String),

    #[error("narration stream aborted: {0}")]
    StreamAborted(String),
}

/// Internal faults. Each one degrades a component to a safe result and is
/// only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalFault {
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("classifier returned unparseable output: {0}")]
    ClassifierParse(String),

    #[error("narration backend unavailable: {0}")]
    NarrationUnavailable(String),

    #[error("narration output could not be parsed: {0}")]
    NarrationParse(String),

    #[error("state delta rejected: {0}")]
    StateApply(String),
}

/// Scenario table problems. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("scenario registry is empty")]
    Empty,

    #[error("scenario '{scenario}' declares initial reality '{reality}' which it does not define")]
    UnknownInitialReality { scenario: String, reality: String },

    #[error("duplicate scenario id '{0}'")]
    Duplicate(String),

    #[error("invalid scenario table: {0}")]
    Json(#[from] serde_json::Error),
}
