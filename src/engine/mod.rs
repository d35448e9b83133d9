pub mod engine;
pub mod protocol;
pub mod router;
pub mod commands;

pub mod constraint_gate;
pub mod signatures;
pub mod narration;
pub mod narrative_parser;
pub mod streaming;
pub mod apply_delta;

pub mod prompt_builder;
pub mod llm_client;

#[cfg(test)]
pub(crate) mod testing;
