//! Conversation controller
//!
//! The single writer for all conversation state. It owns the
//! [`SessionStore`], the pending attachment, and the in-flight request, and
//! exposes one synchronous transition per user action or completed
//! suspension point. The suspension points themselves (extraction, remote
//! calls, pacing) run elsewhere and report back through the `on_*` handlers.
//!
//! At most one request or simulation is in flight. Results are matched to the
//! in-flight request by [`RequestId`]; anything else is stale and ignored.

use crate::error::{ExtractionError, Result, ServiceError};
use crate::extractor::{Attachment, ExtractionSlot, ExtractionTicket};
use crate::interpreter::{self, Classified};
use crate::session::{Message, SessionStore};
use crate::streaming::ChunkPolicy;
use thiserror::Error;

/// Identifies one outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// Coarse controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready for input
    Idle,
    /// Waiting for a text completion
    Sending,
    /// Waiting for a generated image
    SendingImage,
    /// Revealing a received answer
    Streaming,
}

/// A request the caller must dispatch to the completion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Id to report the reply under
    pub id: RequestId,
    /// Session the reply will be appended to
    pub target: String,
    /// What to ask for
    pub kind: Classified,
}

/// A received answer to reveal progressively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamJob {
    /// Request the answer belongs to
    pub request: RequestId,
    /// Full answer text
    pub text: String,
    /// Chunking and pacing to apply
    pub policy: ChunkPolicy,
}

/// Why an action was not taken
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A request or simulation is already in flight
    #[error("Still working on the previous message")]
    Busy,

    /// Nothing to send
    #[error("Nothing to send")]
    Empty,

    /// Regenerate needs an active session
    #[error("No active session")]
    NoActiveSession,

    /// Regenerate needs a user message to resubmit
    #[error("No user message to regenerate from")]
    NoUserMessage,

    /// The session store refused the change
    #[error("Could not record message: {0}")]
    Store(String),
}

/// Result of feeding a reply or stream completion into the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// A text answer was accepted; reveal it with this job
    Streaming(StreamJob),
    /// A message was appended to `session`
    Committed {
        /// Session the message was appended to
        session: String,
        /// The appended message
        message: Message,
    },
    /// The event did not match the in-flight request, or its target is gone
    Discarded,
}

/// Result of feeding a finished extraction into the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The document is now the pending attachment
    Attached {
        /// File name
        name: String,
        /// Number of extracted characters
        chars: usize,
    },
    /// Extraction failed; nothing changed
    Failed(ExtractionError),
    /// A newer extraction superseded this one
    Stale,
}

#[derive(Debug)]
enum Stage {
    AwaitingText,
    AwaitingImage,
    Streaming { full: String, visible: String },
}

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    target: String,
    stage: Stage,
}

/// The conversation state machine
pub struct ConversationController {
    store: SessionStore,
    policy: ChunkPolicy,
    attachment: Option<Attachment>,
    extraction: ExtractionSlot,
    in_flight: Option<InFlight>,
    next_request: u64,
}

impl ConversationController {
    /// Create a controller owning `store`
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use chatdeck::controller::{ConversationController, Phase};
    /// use chatdeck::session::{MemoryStore, SessionStore};
    /// use chatdeck::streaming::ChunkPolicy;
    ///
    /// let store = SessionStore::open(Arc::new(MemoryStore::new()));
    /// let mut controller = ConversationController::new(store, ChunkPolicy::default());
    ///
    /// let request = controller.submit("hello").unwrap();
    /// assert_eq!(controller.phase(), Phase::Sending);
    /// assert_eq!(controller.store().active_id(), Some(request.target.as_str()));
    /// ```
    pub fn new(store: SessionStore, policy: ChunkPolicy) -> Self {
        Self {
            store,
            policy,
            attachment: None,
            extraction: ExtractionSlot::new(),
            in_flight: None,
            next_request: 0,
        }
    }

    /// Read access to the session store
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        match self.in_flight.as_ref().map(|f| &f.stage) {
            None => Phase::Idle,
            Some(Stage::AwaitingText) => Phase::Sending,
            Some(Stage::AwaitingImage) => Phase::SendingImage,
            Some(Stage::Streaming { .. }) => Phase::Streaming,
        }
    }

    /// Returns true when no request or simulation is in flight
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Returns true while the latest extraction is still running
    pub fn is_extracting(&self) -> bool {
        self.extraction.is_pending()
    }

    /// The attachment waiting for the next send
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Text revealed so far by the running simulation
    pub fn visible_buffer(&self) -> Option<&str> {
        match self.in_flight.as_ref().map(|f| &f.stage) {
            Some(Stage::Streaming { visible, .. }) => Some(visible),
            _ => None,
        }
    }

    /// Session targeted by the in-flight request
    pub fn in_flight_target(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.target.as_str())
    }

    /// Send typed text together with any pending attachment
    ///
    /// Creates and activates a session when none is active, records the user
    /// message, clears the attachment, and returns the request to dispatch.
    ///
    /// # Errors
    ///
    /// Returns `Rejection::Busy` while a request or simulation is in flight
    /// and `Rejection::Empty` when there is nothing to send
    pub fn submit(&mut self, text: &str) -> std::result::Result<PendingRequest, Rejection> {
        if !self.is_idle() {
            tracing::debug!("Ignoring submit while {:?}", self.phase());
            return Err(Rejection::Busy);
        }

        let composed =
            interpreter::compose(text, self.attachment.as_ref()).ok_or(Rejection::Empty)?;
        self.attachment = None;

        let target = self.ensure_active_session()?;
        let message = if composed.payload == composed.display {
            Message::user(composed.display)
        } else {
            Message::user_with_prompt(composed.display, composed.payload.clone())
        };
        self.store
            .append(&target, message)
            .map_err(|e| Rejection::Store(e.to_string()))?;

        Ok(self.start_request(target, interpreter::classify(&composed.payload)))
    }

    /// Resubmit the last user message of the active session
    ///
    /// Only a new assistant message is appended when the reply arrives.
    ///
    /// # Errors
    ///
    /// Returns `Rejection::Busy` while work is in flight, or
    /// `NoActiveSession`/`NoUserMessage` when there is nothing to resubmit
    pub fn regenerate(&mut self) -> std::result::Result<PendingRequest, Rejection> {
        if !self.is_idle() {
            return Err(Rejection::Busy);
        }
        let session = self.store.active().ok_or(Rejection::NoActiveSession)?;
        let last = session
            .last_user_message()
            .ok_or(Rejection::NoUserMessage)?;

        let kind = interpreter::classify(last.request_text());
        let target = session.id.clone();
        tracing::debug!("Regenerating in session {}", target);
        Ok(self.start_request(target, kind))
    }

    /// Feed the service result for `request`
    ///
    /// Text answers move to streaming; images and failures are appended
    /// immediately and the controller returns to idle.
    pub fn on_reply(
        &mut self,
        request: RequestId,
        result: std::result::Result<String, ServiceError>,
    ) -> ReplyOutcome {
        let Some(in_flight) = self.take_awaiting(request) else {
            tracing::debug!("Discarding stale reply for {:?}", request);
            return ReplyOutcome::Discarded;
        };

        match (in_flight.stage, result) {
            (Stage::AwaitingText, Ok(text)) => {
                let job = StreamJob {
                    request,
                    text: text.clone(),
                    policy: self.policy,
                };
                self.in_flight = Some(InFlight {
                    id: request,
                    target: in_flight.target,
                    stage: Stage::Streaming {
                        full: text,
                        visible: String::new(),
                    },
                });
                ReplyOutcome::Streaming(job)
            }
            (Stage::AwaitingImage, Ok(url)) => self.commit(in_flight.target, Message::image(url)),
            (_, Err(e)) => {
                tracing::warn!("Request {:?} failed: {}", request, e);
                self.commit(in_flight.target, Message::assistant(e.user_message()))
            }
            (Stage::Streaming { .. }, Ok(_)) => {
                tracing::warn!("Unexpected reply for {:?} while streaming", request);
                ReplyOutcome::Discarded
            }
        }
    }

    /// Record the visible text of the running simulation
    ///
    /// Returns the newly revealed text, or `None` for a stale event.
    pub fn on_stream_progress(&mut self, request: RequestId, visible: String) -> Option<String> {
        let in_flight = self.in_flight.as_mut().filter(|f| f.id == request)?;
        let Stage::Streaming {
            visible: buffer, ..
        } = &mut in_flight.stage
        else {
            return None;
        };

        let delta = match visible.strip_prefix(buffer.as_str()) {
            Some(rest) => rest.to_string(),
            None => visible.clone(),
        };
        *buffer = visible;
        Some(delta)
    }

    /// Commit the full answer of a finished simulation
    pub fn on_stream_finished(&mut self, request: RequestId) -> ReplyOutcome {
        let streaming = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.id == request && matches!(f.stage, Stage::Streaming { .. }));
        if !streaming {
            return ReplyOutcome::Discarded;
        }

        let Some(InFlight {
            target,
            stage: Stage::Streaming { full, .. },
            ..
        }) = self.in_flight.take()
        else {
            return ReplyOutcome::Discarded;
        };
        self.commit(target, Message::assistant(full))
    }

    /// Start a fresh conversation on the next send
    ///
    /// Clears the active pointer; any in-flight work keeps its target.
    pub fn new_chat(&mut self) {
        if let Err(e) = self.store.set_active(None) {
            tracing::warn!("Failed to clear active session: {}", e);
        }
    }

    /// Make the session matching `id_or_prefix` active, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the id is unknown or ambiguous
    pub fn switch_session(&mut self, id_or_prefix: &str) -> Result<String> {
        let id = self.store.resolve(id_or_prefix)?;
        self.store.set_active(Some(&id))?;
        tracing::debug!("Switched to session {}", id);
        Ok(id)
    }

    /// Delete the session matching `id_or_prefix`, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the id is unknown or ambiguous
    pub fn delete_session(&mut self, id_or_prefix: &str) -> Result<String> {
        let id = self.store.resolve(id_or_prefix)?;
        self.store.delete(&id);
        if self.in_flight_target() == Some(id.as_str()) {
            tracing::info!("Deleted session {} has a reply in flight", id);
        }
        Ok(id)
    }

    /// Begin a new extraction, superseding any unfinished one
    ///
    /// The current attachment is dropped.
    pub fn begin_extraction(&mut self) -> ExtractionTicket {
        self.attachment = None;
        self.extraction.begin()
    }

    /// Feed a finished extraction
    pub fn on_extracted(
        &mut self,
        ticket: ExtractionTicket,
        result: std::result::Result<Attachment, ExtractionError>,
    ) -> ExtractionOutcome {
        if !self.extraction.finish(ticket) {
            tracing::warn!("Discarding superseded extraction {:?}", ticket);
            return ExtractionOutcome::Stale;
        }

        match result {
            Ok(attachment) => {
                let outcome = ExtractionOutcome::Attached {
                    name: attachment.name.clone(),
                    chars: attachment.extracted_text.chars().count(),
                };
                self.attachment = Some(attachment);
                outcome
            }
            Err(e) => {
                tracing::warn!("Extraction failed: {}", e);
                ExtractionOutcome::Failed(e)
            }
        }
    }

    /// Drop the pending attachment, returning it if there was one
    pub fn remove_attachment(&mut self) -> Option<Attachment> {
        self.attachment.take()
    }

    fn ensure_active_session(&mut self) -> std::result::Result<String, Rejection> {
        if let Some(id) = self.store.active_id() {
            return Ok(id.to_string());
        }
        let id = self.store.create();
        self.store
            .set_active(Some(&id))
            .map_err(|e| Rejection::Store(e.to_string()))?;
        tracing::info!("Created session {}", id);
        Ok(id)
    }

    fn start_request(&mut self, target: String, kind: Classified) -> PendingRequest {
        self.next_request += 1;
        let id = RequestId(self.next_request);
        let stage = match kind {
            Classified::Text { .. } => Stage::AwaitingText,
            Classified::Image { .. } => Stage::AwaitingImage,
        };
        self.in_flight = Some(InFlight {
            id,
            target: target.clone(),
            stage,
        });
        tracing::debug!("Request {:?} targets session {}", id, target);
        PendingRequest { id, target, kind }
    }

    fn take_awaiting(&mut self, request: RequestId) -> Option<InFlight> {
        let awaiting = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.id == request && !matches!(f.stage, Stage::Streaming { .. }));
        if awaiting {
            self.in_flight.take()
        } else {
            None
        }
    }

    fn commit(&mut self, target: String, message: Message) -> ReplyOutcome {
        match self.store.append(&target, message.clone()) {
            Ok(()) => ReplyOutcome::Committed {
                session: target,
                message,
            },
            Err(e) => {
                tracing::warn!("Dropping reply: {}", e);
                ReplyOutcome::Discarded
            }
        }
    }
}
