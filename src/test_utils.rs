//! Test utilities for Chatdeck
//!
//! Scripted collaborators for the conversation engine plus temporary file
//! helpers.

use crate::client::CompletionService;
use crate::controller::ConversationController;
use crate::error::ServiceError;
use crate::session::{MemoryStore, SessionStore};
use crate::streaming::{ChunkPolicy, Pacer};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Controller over an in-memory store with the default chunk policy
pub fn memory_controller() -> ConversationController {
    let store = SessionStore::open(Arc::new(MemoryStore::new()));
    ConversationController::new(store, ChunkPolicy::default())
}

/// Pacer that never waits
#[derive(Debug, Default)]
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, _delay: Duration) {}
}

/// Completion service answering from a script
///
/// Queued replies are returned in order; once the queue is empty text
/// requests echo their prompt and image requests return a fixed locator.
#[derive(Debug, Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedService {
    /// Create a service with no queued replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next reply
    pub fn push(&self, reply: Result<String, ServiceError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Number of requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str, fallback: String) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(fallback))
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn request_completion(&self, prompt: &str) -> Result<String, ServiceError> {
        self.next(prompt, format!("echo: {}", prompt))
    }

    async fn request_image(&self, prompt: &str) -> Result<String, ServiceError> {
        self.next(prompt, "https://img.example/generated.png".to_string())
    }
}
