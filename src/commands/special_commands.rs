//! Special commands parser for interactive chat
//!
//! This module parses the slash commands that can be entered during an
//! interactive chat. Special commands manage sessions, attachments and the
//! theme instead of being sent to the service.
//!
//! Command words are case-insensitive; their arguments keep their case.
//! `/image` is deliberately not listed here: it is ordinary input that the
//! command interpreter turns into an image request.

use crate::interpreter::IMAGE_COMMAND_PREFIX;
use crate::theme::Theme;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new conversation on the next message
    NewChat,

    /// List sessions grouped by recency
    ListSessions,

    /// Make another session active
    SwitchSession(String),

    /// Delete a session; the active one when no id is given
    DeleteSession(Option<String>),

    /// Extract a document as the next attachment
    Attach(PathBuf),

    /// Drop the pending attachment
    Detach,

    /// Ask again for the last user message
    Regenerate,

    /// Set the theme, or toggle it when none is given
    Theme(Option<Theme>),

    /// Display session, attachment and theme status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent as a regular message.
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for an unrecognised `/word`,
/// `CommandError::MissingArgument` when a required argument is absent, and
/// `CommandError::UnsupportedArgument` for an invalid argument.
///
/// # Examples
///
/// ```
/// use chatdeck::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/NEW").unwrap(), SpecialCommand::NewChat);
/// assert_eq!(
///     parse_special_command("/switch 01hx").unwrap(),
///     SpecialCommand::SwitchSession("01hx".to_string())
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert_eq!(parse_special_command("/image a fox").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    match word.as_str() {
        IMAGE_COMMAND_PREFIX => Ok(SpecialCommand::None),

        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/new" => Ok(SpecialCommand::NewChat),
        "/sessions" => Ok(SpecialCommand::ListSessions),
        "/detach" => Ok(SpecialCommand::Detach),
        "/regenerate" | "/regen" => Ok(SpecialCommand::Regenerate),

        "/switch" => argument
            .map(SpecialCommand::SwitchSession)
            .ok_or_else(|| CommandError::MissingArgument {
                command: "/switch".to_string(),
                usage: "/switch <session-id>".to_string(),
            }),

        "/delete" => Ok(SpecialCommand::DeleteSession(argument)),

        "/attach" => argument
            .map(|path| SpecialCommand::Attach(PathBuf::from(path)))
            .ok_or_else(|| CommandError::MissingArgument {
                command: "/attach".to_string(),
                usage: "/attach <path>".to_string(),
            }),

        "/theme" => match argument {
            None => Ok(SpecialCommand::Theme(None)),
            Some(arg) => arg
                .parse::<Theme>()
                .map(|theme| SpecialCommand::Theme(Some(theme)))
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/theme".to_string(),
                    arg,
                }),
        },

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Display help information for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

SESSIONS:
  /new               - Start a new conversation with the next message
  /sessions          - List sessions (Today / Yesterday / Earlier)
  /switch <id>       - Switch to a session (id or unique prefix)
  /delete [id]       - Delete a session (defaults to the active one)

ATTACHMENTS:
  /attach <path>     - Extract a PDF, DOCX or text file as context
  /detach            - Drop the pending attachment

MESSAGES:
  /image <prompt>    - Generate an image instead of a text answer
  /regenerate        - Ask again for the last message (alias /regen)

DISPLAY:
  /theme [dark|light] - Set the colour theme, or toggle it
  /status            - Show session, attachment and theme status
  /help              - Show this help message (alias /?)

EXIT:
  exit, quit         - Leave chat (waits for any answer in progress)
"#
    );
}
