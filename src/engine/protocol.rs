use crate::error::GameError;
use crate::model::message::Reply;

pub enum EngineCommand {
    UserInput(String),
    LoadScenario(String),
    Shutdown,
}

#[derive(Debug)]
pub enum EngineResponse {
    /// Raw narrator output as it streams in.
    Fragment(String),

    /// Final answer to the last command. Exactly one per command.
    Reply(Result<Reply, GameError>),
}
