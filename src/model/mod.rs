pub mod game_context;
pub mod llm_decode;
pub mod message;
pub mod narrative;
pub mod scenario;
pub mod session_state;
pub mod verdict;
