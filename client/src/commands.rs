//! Slash-command parsing for the terminal front-end

use peer::{Host, ParseHostError};
use shared::RoomId;
use thiserror::Error;

/// Lines starting with this character are commands
pub const ESCAPE: char = '/';

const NAMES: [&str; 7] = ["help", "hosts", "rooms", "join", "leave", "add", "exit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// List the hosts of the current room
    Hosts,
    /// List every populated room
    Rooms,
    Join(RoomId),
    Leave,
    Add(Host),
    Exit,
}

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Command(Command),
    Message(String),
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}, try /help")]
    Unknown(String),
    #[error("{0:?} is ambiguous: {}", .1.join(", "))]
    Ambiguous(String, Vec<&'static str>),
    #[error("/{0} needs an argument: {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("invalid room {0:?}, expected a number from -128 to 126")]
    InvalidRoom(String),
    #[error(transparent)]
    InvalidHost(#[from] ParseHostError),
}

/// Splits a raw input line into a command or a chat message
pub fn parse_line(line: &str) -> Result<Line, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(Line::Blank);
    }

    let Some(rest) = line.trim_start().strip_prefix(ESCAPE) else {
        return Ok(Line::Message(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let word = parts.next().unwrap_or_default();
    let argument = parts.next();

    let command = match resolve(word)? {
        "help" => Command::Help,
        "hosts" => Command::Hosts,
        "rooms" => Command::Rooms,
        "leave" => Command::Leave,
        "exit" => Command::Exit,
        "join" => {
            let arg = argument.ok_or(CommandError::MissingArgument("join", "<room>"))?;
            Command::Join(parse_room(arg)?)
        }
        "add" => {
            let arg = argument.ok_or(CommandError::MissingArgument("add", "<ip:port:room>"))?;
            Command::Add(arg.parse()?)
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Line::Command(command))
}

/// Case-insensitive unique-prefix lookup of a command name
fn resolve(word: &str) -> Result<&'static str, CommandError> {
    let word_lower = word.to_lowercase();
    if word_lower.is_empty() {
        return Err(CommandError::Unknown(word.to_string()));
    }
    if let Some(exact) = NAMES.iter().copied().find(|name| *name == word_lower) {
        return Ok(exact);
    }

    let matches: Vec<&'static str> = NAMES
        .iter()
        .copied()
        .filter(|name| name.starts_with(&word_lower))
        .collect();

    match matches.as_slice() {
        [] => Err(CommandError::Unknown(word.to_string())),
        [only] => Ok(only),
        _ => Err(CommandError::Ambiguous(word.to_string(), matches)),
    }
}

fn parse_room(arg: &str) -> Result<RoomId, CommandError> {
    match arg.parse::<RoomId>() {
        Ok(room) if !room.is_reserved() => Ok(room),
        _ => Err(CommandError::InvalidRoom(arg.to_string())),
    }
}

pub fn help_text() -> String {
    [
        "Commands:",
        "  /help                 show this text",
        "  /hosts                hosts in the current room",
        "  /rooms                every room somebody is in",
        "  /join <room>          move to another room (-128 to 126)",
        "  /leave                leave the current room",
        "  /add <ip:port:room>   remember a host",
        "  /exit                 save known hosts and quit",
        "Anything else is sent to the current room.",
    ]
    .join("\n")
}
