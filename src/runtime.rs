//! Background work for the conversation controller
//!
//! Extraction, remote calls and pacing run as spawned tokio tasks. Each task
//! reports back over an unbounded channel as an [`EngineEvent`]; the event
//! loop that owns the controller feeds every event through
//! [`Runtime::apply`], which performs the matching transition and spawns any
//! follow-up work.

use crate::client::CompletionService;
use crate::controller::{
    ConversationController, ExtractionOutcome, PendingRequest, ReplyOutcome, RequestId, StreamJob,
};
use crate::error::{ExtractionError, ServiceError};
use crate::extractor::{self, Attachment, ExtractionTicket};
use crate::interpreter::Classified;
use crate::streaming::{self, Pacer};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Completion of a suspension point
#[derive(Debug)]
pub enum EngineEvent {
    /// A document finished extracting
    Extracted {
        /// Ticket issued when the extraction began
        ticket: ExtractionTicket,
        /// Extracted attachment or the reason it failed
        result: Result<Attachment, ExtractionError>,
    },
    /// The service answered a request
    Replied {
        /// Request being answered
        request: RequestId,
        /// Answer text or image locator
        result: Result<String, ServiceError>,
    },
    /// The simulation revealed more text
    StreamProgress {
        /// Request being revealed
        request: RequestId,
        /// Everything revealed so far
        visible: String,
    },
    /// The simulation revealed the last chunk
    StreamFinished {
        /// Request being revealed
        request: RequestId,
    },
}

/// What an applied event changed, for rendering
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// An extraction finished
    Extraction(ExtractionOutcome),
    /// A reply was handled or a simulation committed
    Reply(ReplyOutcome),
    /// Newly revealed streaming text
    Progress(String),
    /// The event was stale
    Ignored,
}

/// Spawns background work and routes its results into the controller
pub struct Runtime {
    service: Arc<dyn CompletionService>,
    pacer: Arc<dyn Pacer>,
    tx: UnboundedSender<EngineEvent>,
}

impl Runtime {
    /// Create a runtime and the receiver its events arrive on
    pub fn new(
        service: Arc<dyn CompletionService>,
        pacer: Arc<dyn Pacer>,
    ) -> (Self, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { service, pacer, tx }, rx)
    }

    /// Send a request to the completion service in the background
    pub fn dispatch(&self, request: PendingRequest) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = match &request.kind {
                Classified::Text { payload } => service.request_completion(payload).await,
                Classified::Image { prompt } => service.request_image(prompt).await,
            };
            let event = EngineEvent::Replied {
                request: request.id,
                result,
            };
            if tx.send(event).is_err() {
                tracing::debug!("Event loop gone; dropping reply for {:?}", request.id);
            }
        });
    }

    /// Reveal a received answer in the background
    pub fn stream(&self, job: StreamJob) {
        let pacer = Arc::clone(&self.pacer);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut partials = Box::pin(streaming::simulate(&job.text, &job.policy, pacer));
            while let Some(visible) = partials.next().await {
                let event = EngineEvent::StreamProgress {
                    request: job.request,
                    visible,
                };
                if !report(&tx, event) {
                    return;
                }
            }
            report(
                &tx,
                EngineEvent::StreamFinished {
                    request: job.request,
                },
            );
        });
    }

    /// Extract a document in the background
    pub fn extract(&self, ticket: ExtractionTicket, path: PathBuf, max_bytes: u64) {
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = extractor::extract_file(path, max_bytes).await;
            if tx.send(EngineEvent::Extracted { ticket, result }).is_err() {
                tracing::debug!("Event loop gone; dropping extraction {:?}", ticket);
            }
        });
    }

    /// Submit text through the controller and dispatch the resulting request
    ///
    /// # Errors
    ///
    /// Returns the controller's rejection when nothing was sent
    pub fn submit(
        &self,
        controller: &mut ConversationController,
        text: &str,
    ) -> Result<RequestId, crate::controller::Rejection> {
        let request = controller.submit(text)?;
        let id = request.id;
        self.dispatch(request);
        Ok(id)
    }

    /// Regenerate through the controller and dispatch the resulting request
    ///
    /// # Errors
    ///
    /// Returns the controller's rejection when nothing was sent
    pub fn regenerate(
        &self,
        controller: &mut ConversationController,
    ) -> Result<RequestId, crate::controller::Rejection> {
        let request = controller.regenerate()?;
        let id = request.id;
        self.dispatch(request);
        Ok(id)
    }

    /// Start extracting `path` as the next attachment
    pub fn attach(&self, controller: &mut ConversationController, path: PathBuf, max_bytes: u64) {
        let ticket = controller.begin_extraction();
        tracing::debug!("Extraction {:?} started for {}", ticket, path.display());
        self.extract(ticket, path, max_bytes);
    }

    /// Apply one event to the controller, spawning follow-up work
    pub fn apply(
        &self,
        controller: &mut ConversationController,
        event: EngineEvent,
    ) -> EventOutcome {
        match event {
            EngineEvent::Extracted { ticket, result } => {
                EventOutcome::Extraction(controller.on_extracted(ticket, result))
            }
            EngineEvent::Replied { request, result } => {
                let outcome = controller.on_reply(request, result);
                if let ReplyOutcome::Streaming(job) = &outcome {
                    self.stream(job.clone());
                }
                EventOutcome::Reply(outcome)
            }
            EngineEvent::StreamProgress { request, visible } => {
                match controller.on_stream_progress(request, visible) {
                    Some(delta) => EventOutcome::Progress(delta),
                    None => EventOutcome::Ignored,
                }
            }
            EngineEvent::StreamFinished { request } => {
                EventOutcome::Reply(controller.on_stream_finished(request))
            }
        }
    }

    /// Process events until no request, simulation or extraction is in flight
    ///
    /// `observe` sees every outcome after it is applied.
    pub async fn settle<F>(
        &self,
        controller: &mut ConversationController,
        events: &mut UnboundedReceiver<EngineEvent>,
        mut observe: F,
    ) where
        F: FnMut(&ConversationController, &EventOutcome),
    {
        while !controller.is_idle() || controller.is_extracting() {
            let Some(event) = events.recv().await else {
                break;
            };
            let outcome = self.apply(controller, event);
            observe(controller, &outcome);
        }
    }
}

/// Send a pacing event, returning false once the event loop is gone
fn report(tx: &UnboundedSender<EngineEvent>, event: EngineEvent) -> bool {
    match tx.send(event) {
        Ok(()) => true,
        Err(mpsc::error::SendError(event)) => {
            tracing::debug!("Event loop gone; dropping {:?}", event);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_test_file, memory_controller, temp_dir, InstantPacer, ScriptedService,
    };

    fn setup() -> (
        ConversationController,
        Runtime,
        UnboundedReceiver<EngineEvent>,
        Arc<ScriptedService>,
    ) {
        let service = Arc::new(ScriptedService::new());
        let (runtime, events) = Runtime::new(service.clone(), Arc::new(InstantPacer));
        (memory_controller(), runtime, events, service)
    }

    #[tokio::test]
    async fn test_text_round_trip_through_events() {
        let (mut controller, runtime, mut events, service) = setup();
        runtime.submit(&mut controller, "hi").unwrap();

        let mut revealed = String::new();
        runtime
            .settle(&mut controller, &mut events, |_, outcome| {
                if let EventOutcome::Progress(delta) = outcome {
                    revealed.push_str(delta);
                }
            })
            .await;

        assert_eq!(revealed, "echo: hi");
        assert_eq!(service.calls(), 1);
        let session = controller.store().active().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content.as_text(), "echo: hi");
    }

    #[tokio::test]
    async fn test_image_round_trip_through_events() {
        let (mut controller, runtime, mut events, service) = setup();
        runtime.submit(&mut controller, "/image red fox").unwrap();
        runtime.settle(&mut controller, &mut events, |_, _| {}).await;

        assert_eq!(service.prompts(), vec!["red fox".to_string()]);
        let session = controller.store().active().unwrap();
        assert!(session.messages[1].content.is_image());
        assert_eq!(
            session.messages[1].content.as_text(),
            "https://img.example/generated.png"
        );
    }

    #[tokio::test]
    async fn test_service_failure_becomes_message() {
        let (mut controller, runtime, mut events, service) = setup();
        service.push(Err(ServiceError::Status {
            status: 503,
            body: "busy".to_string(),
        }));
        runtime.submit(&mut controller, "hi").unwrap();

        let mut outcomes = Vec::new();
        runtime
            .settle(&mut controller, &mut events, |_, outcome| {
                outcomes.push(outcome.clone())
            })
            .await;

        assert_eq!(outcomes.len(), 1);
        let session = controller.store().active().unwrap();
        assert_eq!(
            session.messages[1].content.as_text(),
            "Error fetching response (HTTP 503)"
        );
    }

    #[tokio::test]
    async fn test_attach_then_submit() {
        let (mut controller, runtime, mut events, service) = setup();
        let dir = temp_dir();
        let path = create_test_file(&dir, "report.txt", "Q1 results");

        runtime.attach(&mut controller, path, 1024);
        runtime.settle(&mut controller, &mut events, |_, _| {}).await;
        assert_eq!(controller.attachment().unwrap().name, "report.txt");

        runtime.submit(&mut controller, "").unwrap();
        runtime.settle(&mut controller, &mut events, |_, _| {}).await;

        let session = controller.store().active().unwrap();
        assert_eq!(
            session.messages[0].content.as_text(),
            "Analyzed document: report.txt"
        );
        assert!(service.prompts()[0].starts_with("Context from file (report.txt):"));
        assert!(controller.attachment().is_none());
    }

    #[tokio::test]
    async fn test_superseded_extraction_never_attaches() {
        let (mut controller, runtime, mut events, _) = setup();
        let dir = temp_dir();
        let first = create_test_file(&dir, "first.txt", "one");
        let second = create_test_file(&dir, "second.txt", "two");

        runtime.attach(&mut controller, first, 1024);
        runtime.attach(&mut controller, second, 1024);

        let mut stale = 0;
        runtime
            .settle(&mut controller, &mut events, |_, outcome| {
                if outcome == &EventOutcome::Extraction(ExtractionOutcome::Stale) {
                    stale += 1;
                }
            })
            .await;

        // The first result may still be in the channel once the second lands.
        while let Ok(event) = events.try_recv() {
            if runtime.apply(&mut controller, event)
                == EventOutcome::Extraction(ExtractionOutcome::Stale)
            {
                stale += 1;
            }
        }

        assert_eq!(controller.attachment().unwrap().name, "second.txt");
        assert!(stale <= 1);
    }

    #[test]
    fn test_report_fails_quietly_once_receiver_dropped() {
        let mut controller = memory_controller();
        let request = controller.submit("hi").unwrap().id;
        let (tx, rx) = mpsc::unbounded_channel();

        assert!(report(&tx, EngineEvent::StreamFinished { request }));
        drop(rx);
        assert!(!report(&tx, EngineEvent::StreamFinished { request }));
    }
}
