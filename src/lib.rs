//! Chatdeck - terminal chat client library
//!
//! This library provides the conversation engine behind the `chatdeck`
//! binary: multiple persisted sessions, simulated streaming of complete
//! answers, document attachments, and image requests via `/image`.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `extractor`: Plain-text extraction from PDF, DOCX and text files
//! - `interpreter`: Composing attachment context and classifying requests
//! - `client`: Completion and image endpoints over HTTP
//! - `streaming`: Paced replay of a complete answer
//! - `session`: Sessions, messages and their persistence
//! - `controller`: The conversation state machine
//! - `runtime`: Background tasks feeding the controller
//! - `theme`: Dark/light preference
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use chatdeck::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     chatdeck::commands::chat::run_chat(config, None).await
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod extractor;
pub mod interpreter;
pub mod runtime;
pub mod session;
pub mod streaming;
pub mod theme;

// Re-export commonly used types
pub use config::Config;
pub use controller::{ConversationController, Phase};
pub use error::{ChatdeckError, Result};
pub use session::{Message, MessageContent, Role, Session, SessionStore};

#[cfg(test)]
pub mod test_utils;
