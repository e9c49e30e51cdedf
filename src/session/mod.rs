//! Session store for conversation history
//!
//! Owns every conversation session and the pointer to the active one. The
//! whole collection is written to a [`KeyValueStore`] after every mutation and
//! read back once when the store is opened.

use crate::error::{ChatdeckError, Result};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod storage;
pub mod types;

pub use storage::{KeyValueStore, MemoryStore, SledStore, SESSIONS_KEY, THEME_KEY};
pub use types::{
    derive_title, new_message_id, new_session_id, Message, MessageContent, Role, Session,
    DEFAULT_SESSION_TITLE, IMAGE_CONTENT_MARKER,
};

/// Recency bucket used when listing sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyGroup {
    /// Created since local midnight today
    Today,
    /// Created during the previous local day
    Yesterday,
    /// Anything older
    Earlier,
}

impl fmt::Display for RecencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "Today"),
            Self::Yesterday => write!(f, "Yesterday"),
            Self::Earlier => write!(f, "Earlier"),
        }
    }
}

/// Classify a creation timestamp against local-midnight boundaries of `now`
///
/// # Examples
///
/// ```
/// use chatdeck::session::{recency_group, RecencyGroup};
/// use chrono::{Duration, Local};
///
/// let now = Local::now();
/// assert_eq!(recency_group(now.with_timezone(&chrono::Utc), now), RecencyGroup::Today);
/// let long_ago = (now - Duration::days(10)).with_timezone(&chrono::Utc);
/// assert_eq!(recency_group(long_ago, now), RecencyGroup::Earlier);
/// ```
pub fn recency_group(created_at: DateTime<Utc>, now: DateTime<Local>) -> RecencyGroup {
    let today = now.date_naive();
    let Some(today_start) = local_midnight(today) else {
        return RecencyGroup::Earlier;
    };
    let created = created_at.with_timezone(&Local);
    if created >= today_start {
        return RecencyGroup::Today;
    }
    let yesterday_start = (today - Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());
    match yesterday_start {
        Some(start) if created >= start => RecencyGroup::Yesterday,
        _ => RecencyGroup::Earlier,
    }
}

fn local_midnight(day: chrono::NaiveDate) -> Option<DateTime<Local>> {
    let naive = day.and_hms_opt(0, 0, 0)?;
    Local.from_local_datetime(&naive).earliest()
}

/// The set of conversations plus the active-session pointer
///
/// Mutations are synchronous and persisted immediately. A failed write is
/// logged and the in-memory change is kept.
pub struct SessionStore {
    sessions: BTreeMap<String, Session>,
    active: Option<String>,
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Open the store, loading any previously saved sessions
    ///
    /// Unreadable or corrupt data yields an empty store.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use chatdeck::session::{MemoryStore, SessionStore};
    ///
    /// let store = SessionStore::open(Arc::new(MemoryStore::new()));
    /// assert!(store.is_empty());
    /// assert!(store.active_id().is_none());
    /// ```
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        let sessions = match load_sessions(backend.as_ref()) {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("Starting with an empty session list: {}", e);
                Vec::new()
            }
        };
        tracing::debug!("Loaded {} sessions", sessions.len());

        Self {
            sessions: sessions.into_iter().map(|s| (s.id.clone(), s)).collect(),
            active: None,
            backend,
        }
    }

    /// Create an empty session and return its id
    ///
    /// The active pointer is not changed.
    pub fn create(&mut self) -> String {
        let session = Session::new();
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.persist();
        id
    }

    /// Append a message to a session
    ///
    /// The first user message of an empty session becomes its title.
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::UnknownSession` if the session does not exist
    pub fn append(&mut self, session_id: &str, message: Message) -> Result<()> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ChatdeckError::UnknownSession(session_id.to_string()))?;

        if session.messages.is_empty() && message.role == Role::User {
            session.title = derive_title(message.content.as_text());
        }
        session.messages.push(message);

        self.persist();
        Ok(())
    }

    /// Delete a session, returning whether it existed
    ///
    /// Deleting the active session clears the active pointer.
    pub fn delete(&mut self, session_id: &str) -> bool {
        if self.sessions.remove(session_id).is_none() {
            return false;
        }
        if self.active.as_deref() == Some(session_id) {
            self.active = None;
        }
        self.persist();
        true
    }

    /// Set or clear the active session
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::UnknownSession` if `id` does not exist
    pub fn set_active(&mut self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) if !self.sessions.contains_key(id) => {
                Err(ChatdeckError::UnknownSession(id.to_string()).into())
            }
            Some(id) => {
                self.active = Some(id.to_string());
                Ok(())
            }
            None => {
                self.active = None;
                Ok(())
            }
        }
    }

    /// Id of the active session
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active session
    pub fn active(&self) -> Option<&Session> {
        self.active.as_deref().and_then(|id| self.sessions.get(id))
    }

    /// Look up a session by id
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Returns true if a session with `id` exists
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// All sessions, newest first
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().rev()
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true when there are no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Resolve a full session id or a unique id prefix
    ///
    /// Matching is case-insensitive since ULIDs are upper-case.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` when nothing matches and `AmbiguousSession`
    /// when several sessions share the prefix
    pub fn resolve(&self, id_or_prefix: &str) -> Result<String> {
        let needle = id_or_prefix.trim().to_uppercase();
        if needle.is_empty() {
            return Err(ChatdeckError::UnknownSession(id_or_prefix.to_string()).into());
        }
        if self.sessions.contains_key(&needle) {
            return Ok(needle);
        }

        let mut matches = self.sessions.keys().filter(|id| id.starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id.clone()),
            (Some(_), Some(_)) => {
                Err(ChatdeckError::AmbiguousSession(id_or_prefix.to_string()).into())
            }
            _ => Err(ChatdeckError::UnknownSession(id_or_prefix.to_string()).into()),
        }
    }

    /// Sessions grouped into Today / Yesterday / Earlier, newest first
    ///
    /// Empty groups are omitted.
    pub fn grouped_by_recency(&self, now: DateTime<Local>) -> Vec<(RecencyGroup, Vec<&Session>)> {
        let mut groups: Vec<(RecencyGroup, Vec<&Session>)> = vec![
            (RecencyGroup::Today, Vec::new()),
            (RecencyGroup::Yesterday, Vec::new()),
            (RecencyGroup::Earlier, Vec::new()),
        ];

        let mut ordered: Vec<&Session> = self.sessions.values().collect();
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        for session in ordered {
            let group = recency_group(session.created_at, now);
            if let Some((_, bucket)) = groups.iter_mut().find(|(g, _)| *g == group) {
                bucket.push(session);
            }
        }

        groups.retain(|(_, bucket)| !bucket.is_empty());
        groups
    }

    fn persist(&self) {
        let sessions: Vec<&Session> = self.sessions.values().collect();
        let bytes = match serde_json::to_vec(&sessions) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to serialize sessions: {}", e);
                return;
            }
        };
        if let Err(e) = self.backend.put(SESSIONS_KEY, &bytes) {
            tracing::error!("Failed to persist sessions: {}", e);
        }
    }
}

fn load_sessions(backend: &dyn KeyValueStore) -> Result<Vec<Session>> {
    let Some(bytes) = backend.get(SESSIONS_KEY)? else {
        return Ok(Vec::new());
    };
    let sessions: Vec<Session> = serde_json::from_slice(&bytes)
        .map_err(|e| ChatdeckError::PersistenceDecode(e.to_string()))?;
    Ok(sessions)
}
