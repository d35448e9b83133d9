use crate::error::GameError;
use crate::model::message::CommandHelp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Inventory,
    Reality(Option<String>),
    Talk(Option<String>),
    Leave,
    Scenario(Option<String>),
    Status,
}

pub const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        usage: "/reality [name]",
        description: "Switch to a different reality",
    },
    CommandHelp {
        usage: "/help",
        description: "Show this help message",
    },
    CommandHelp {
        usage: "/inventory",
        description: "Show your inventory",
    },
    CommandHelp {
        usage: "/talk [npc]",
        description: "Start talking to an NPC",
    },
    CommandHelp {
        usage: "/leave",
        description: "End the current conversation",
    },
    CommandHelp {
        usage: "/scenario [id]",
        description: "List scenarios or start a new one",
    },
    CommandHelp {
        usage: "/status",
        description: "Show where you are",
    },
];

/// Returns `None` when `line` is not a command at all.
pub fn parse_command(line: &str, prefix: char) -> Option<Result<Command, GameError>> {
    let body = line.trim().strip_prefix(prefix)?;

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    let command = match name.to_lowercase().as_str() {
        "" | "help" => Command::Help,
        "inventory" => Command::Inventory,
        "reality" => Command::Reality(argument),
        "talk" => Command::Talk(argument),
        "leave" => Command::Leave,
        "scenario" => Command::Scenario(argument),
        "status" => Command::Status,
        _ => return Some(Err(GameError::UnknownCommand(name.to_string()))),
    };
    Some(Ok(command))
}
