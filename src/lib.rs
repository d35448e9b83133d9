pub mod config;
pub mod engine;
pub mod error;
pub mod model;

pub use config::{Settings, ViolationPolicy};
pub use engine::constraint_gate::{ConstraintGate, GateConfig};
pub use engine::engine::{Engine, EngineHandle};
pub use engine::llm_client::{ChatBackend, ChatRequest, OllamaClient};
pub use engine::narration::{NarrationEngine, NarratorConfig};
pub use engine::router::{Router, RouterConfig};
pub use error::{BackendError, GameError, InternalFault, RegistryError};
pub use model::message::Reply;
pub use model::scenario::ScenarioRegistry;
pub use model::session_state::SessionState;
