//! Command-line interface definition for Chatdeck
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting, session management, document
//! extraction, theme selection and credential storage.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Chatdeck - terminal client for a remote chat completion service
///
/// Keeps multiple conversations, reveals answers as they "arrive", and
/// folds attached documents into the next question.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the completion service base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Override the session database location
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Keep sessions in memory only for this run
    #[arg(long)]
    pub ephemeral: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Chatdeck
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Resume a session by id or unique id prefix
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Send a single message and print the answer
    Ask {
        /// Attach a document as context for the message
        #[arg(short, long)]
        attach: Option<PathBuf>,

        /// Message text (may be empty when a document is attached)
        message: Vec<String>,
    },

    /// Manage stored sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Print the text extracted from a document
    Extract {
        /// Document to extract
        file: PathBuf,
    },

    /// Show or change the colour theme
    Theme {
        /// New theme; omit to show the current one
        #[arg(value_enum)]
        mode: Option<ThemeChoice>,
    },

    /// Manage the service access token
    Auth {
        /// Credential subcommand
        #[command(subcommand)]
        command: AuthCommand,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions grouped by recency
    List,

    /// Print a session transcript
    Show {
        /// Session id or unique id prefix
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session id or unique id prefix
        id: String,
    },
}

/// Credential subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Store an access token in the OS keyring
    Login {
        /// Access token issued by the identity provider
        #[arg(short, long)]
        token: String,
    },

    /// Remove the stored access token
    Logout,

    /// Report whether an access token is available
    Status,
}

/// Theme argument for the `theme` command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeChoice {
    /// Dark palette
    Dark,
    /// Light palette
    Light,
    /// Switch to the other palette
    Toggle,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            api_url: None,
            storage_path: None,
            ephemeral: false,
            command: Commands::Chat { resume: None },
        }
    }
}
