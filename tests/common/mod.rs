use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use chatdeck::commands::Engine;
use chatdeck::config::Config;
use chatdeck::error::ServiceError;
use chatdeck::session::{KeyValueStore, SledStore};
use chatdeck::streaming::Pacer;
use chatdeck::client::CompletionService;

#[allow(dead_code)]
pub fn create_temp_sled() -> (Arc<SledStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = SledStore::open(tmp.path().join("sessions.sled")).expect("failed to open sled");
    (Arc::new(store), tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Pacer that never waits
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, _delay: Duration) {}
}

/// Completion service answering from a queue, echoing once it runs dry
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedService {
    pub fn with_replies(replies: Vec<Result<String, ServiceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str, fallback: String) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies.lock().unwrap().pop_front().unwrap_or(Ok(fallback))
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

/// Engine over `backend` with an instant pacer and default configuration
#[allow(dead_code)]
pub fn engine(backend: Arc<dyn KeyValueStore>, service: Arc<dyn CompletionService>) -> Engine {
    Engine::with_parts(backend, service, Arc::new(InstantPacer), &Config::default())
}
