/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`     - Interactive chat
- `ask`      - One-shot message through the same engine
- `sessions` - List, show and delete stored sessions
- `extract`  - Print the text extracted from a document
- `theme`    - Show or change the theme preference
- `auth`     - Store or remove the access token

The handlers wire the library components together: a session store over the
configured backend, the HTTP completion client, and the runtime that drives
the conversation controller.
*/

use crate::client::{CompletionService, EnvOrKeyringCredential, HttpCompletionClient};
use crate::config::Config;
use crate::controller::{ConversationController, ExtractionOutcome, ReplyOutcome};
use crate::error::Result;
use crate::runtime::{EngineEvent, EventOutcome, Runtime};
use crate::session::{KeyValueStore, MemoryStore, SessionStore, SledStore};
use crate::streaming::{Pacer, TokioPacer};
use crate::theme::{Palette, ThemeSetting};
use anyhow::Context;
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

// Special commands parser for the chat REPL
pub mod special_commands;

// Session listing and transcript rendering
pub mod sessions;

/// Open the key-value backend selected by the configuration
///
/// # Errors
///
/// Returns error if the database directory cannot be created or opened
pub fn open_backend(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    if config.storage.ephemeral {
        tracing::info!("Using in-memory session storage");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = config.storage.resolve_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tracing::debug!("Opening session database at {}", path.display());
    Ok(Arc::new(SledStore::open(&path)?))
}

/// Everything an interactive or one-shot conversation needs
pub struct Engine {
    /// The conversation state machine
    pub controller: ConversationController,
    /// Background task spawner
    pub runtime: Runtime,
    /// Events produced by background tasks
    pub events: UnboundedReceiver<EngineEvent>,
    /// Theme preference
    pub theme: ThemeSetting,
}

impl Engine {
    /// Assemble an engine from explicit parts
    pub fn with_parts(
        backend: Arc<dyn KeyValueStore>,
        service: Arc<dyn CompletionService>,
        pacer: Arc<dyn Pacer>,
        config: &Config,
    ) -> Self {
        let store = SessionStore::open(Arc::clone(&backend));
        let controller = ConversationController::new(store, config.streaming.policy());
        let (runtime, events) = Runtime::new(service, pacer);
        Self {
            controller,
            runtime,
            events,
            theme: ThemeSetting::load(backend),
        }
    }

    /// Assemble the production engine for `config`
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be opened or the HTTP client fails to build
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = open_backend(config)?;
        let client = HttpCompletionClient::new(
            config.api.clone(),
            Arc::new(EnvOrKeyringCredential::default()),
        )?;
        Ok(Self::with_parts(
            backend,
            Arc::new(client),
            Arc::new(TokioPacer),
            config,
        ))
    }

    /// Process background events until all work has finished, rendering each outcome
    pub async fn settle(&mut self, view: &mut TranscriptView) {
        let Self {
            controller,
            runtime,
            events,
            ..
        } = self;
        runtime
            .settle(controller, events, |_, outcome| view.render(outcome))
            .await;
    }
}

/// Columns after which a line-buffered stream is wrapped at a space
const WRAP_COLUMNS: usize = 80;

/// Where the transcript view writes
pub trait TranscriptOutput: Send {
    /// Write one complete line
    fn line(&mut self, text: &str);

    /// Whether `append` can extend an unfinished line
    fn holds_partial_lines(&self) -> bool;

    /// Write text without ending the line
    fn append(&mut self, text: &str);
}

/// Plain stdout
#[derive(Debug, Default)]
pub struct StdoutOutput;

impl TranscriptOutput for StdoutOutput {
    fn line(&mut self, text: &str) {
        println!("{}", text);
    }

    fn holds_partial_lines(&self) -> bool {
        true
    }

    fn append(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }
}

/// Renders engine outcomes as they happen
///
/// Outputs that cannot hold a partial line receive streamed answers one
/// wrapped line at a time.
pub struct TranscriptView {
    palette: Palette,
    streaming: bool,
    out: Box<dyn TranscriptOutput>,
    open_line: String,
    pending_label: bool,
}

impl TranscriptView {
    /// Create a view over stdout using `palette`
    pub fn new(palette: Palette) -> Self {
        Self::with_output(palette, Box::new(StdoutOutput))
    }

    /// Create a view over `out`
    pub fn with_output(palette: Palette, out: Box<dyn TranscriptOutput>) -> Self {
        Self {
            palette,
            streaming: false,
            out,
            open_line: String::new(),
            pending_label: false,
        }
    }

    /// Switch palettes
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Print an inline notice
    pub fn notice(&mut self, text: &str) {
        let line = self.palette.notice(text).to_string();
        self.out.line(&line);
    }

    /// Render one applied event
    pub fn render(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Extraction(ExtractionOutcome::Attached { name, chars }) => {
                self.notice(&format!("Attached {} ({} characters)", name, chars));
            }
            EventOutcome::Extraction(ExtractionOutcome::Failed(e)) => {
                self.notice(&format!("Could not attach file: {}", e));
            }
            EventOutcome::Extraction(ExtractionOutcome::Stale) | EventOutcome::Ignored => {}
            EventOutcome::Reply(ReplyOutcome::Streaming(_)) => {
                self.streaming = true;
                if self.out.holds_partial_lines() {
                    let label = format!("{} ", self.palette.assistant_label("assistant:"));
                    self.out.append(&label);
                } else {
                    self.pending_label = true;
                    self.open_line.clear();
                }
            }
            EventOutcome::Progress(delta) => {
                if self.out.holds_partial_lines() {
                    let text = self.palette.body(delta).to_string();
                    self.out.append(&text);
                } else {
                    self.open_line.push_str(delta);
                    self.flush_complete_lines();
                }
            }
            EventOutcome::Reply(ReplyOutcome::Committed { message, .. }) => {
                if self.streaming {
                    self.end_stream();
                    self.out.line("");
                } else {
                    let text = sessions::format_message(message, self.palette);
                    self.out.line(&text);
                    self.out.line("");
                }
            }
            EventOutcome::Reply(ReplyOutcome::Discarded) => {
                if self.streaming {
                    self.end_stream();
                    let note = self
                        .palette
                        .muted("(reply not saved: its session no longer exists)")
                        .to_string();
                    self.out.line(&note);
                    self.out.line("");
                }
            }
        }
    }

    fn end_stream(&mut self) {
        self.streaming = false;
        if self.out.holds_partial_lines() {
            self.out.line("");
        } else if self.pending_label || !self.open_line.is_empty() {
            let rest = std::mem::take(&mut self.open_line);
            self.emit_stream_line(rest.trim_end());
        }
    }

    /// Emit every finished or over-long line of the open stream
    fn flush_complete_lines(&mut self) {
        loop {
            if let Some(end) = self.open_line.find('\n') {
                let rest = self.open_line.split_off(end + 1);
                let line = std::mem::replace(&mut self.open_line, rest);
                self.emit_stream_line(line.trim_end());
                continue;
            }
            if self.open_line.chars().count() <= WRAP_COLUMNS {
                break;
            }
            let limit = self
                .open_line
                .char_indices()
                .nth(WRAP_COLUMNS)
                .map_or(self.open_line.len(), |(i, _)| i);
            let space = self.open_line[..limit]
                .rfind(' ')
                .or_else(|| self.open_line[limit..].find(' ').map(|i| i + limit));
            let Some(space) = space else {
                // The last word may still be growing.
                break;
            };
            let rest = self.open_line.split_off(space + 1);
            let line = std::mem::replace(&mut self.open_line, rest);
            self.emit_stream_line(line.trim_end());
        }
    }

    fn emit_stream_line(&mut self, text: &str) {
        let body = self.palette.body(text);
        let line = if std::mem::take(&mut self.pending_label) {
            format!("{} {}", self.palette.assistant_label("assistant:"), body)
        } else {
            body.to_string()
        };
        self.out.line(&line);
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat.
    //!
    //! Lines are read on a dedicated rustyline thread and forwarded to the
    //! event loop, which interleaves them with extraction, reply and pacing
    //! events. The prompt returns as soon as a line is handled, so commands
    //! keep working while an answer streams. Output produced while the
    //! prompt is shown goes through rustyline's external printer.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::controller::{Phase, Rejection};
    use crate::session::Role;
    use rustyline::error::ReadlineError;
    use rustyline::{DefaultEditor, ExternalPrinter};
    use std::path::PathBuf;
    use tokio::sync::mpsc::{self, UnboundedSender};
    use tokio::sync::oneshot;

    type SharedPrinter = Box<dyn ExternalPrinter + Send>;

    /// A line (or the end of input) from the readline thread
    #[derive(Debug)]
    enum Input {
        Line(String),
        Interrupted,
        Eof,
    }

    /// Whether the REPL keeps going after a line
    #[derive(Debug, PartialEq, Eq)]
    enum Flow {
        Continue,
        Exit,
    }

    /// Transcript output that redraws the prompt below each printed line
    struct PrinterOutput {
        printer: SharedPrinter,
    }

    impl TranscriptOutput for PrinterOutput {
        fn line(&mut self, text: &str) {
            if let Err(e) = self.printer.print(text.to_string()) {
                tracing::warn!("External printer failed: {}", e);
                println!("{}", text);
            }
        }

        fn holds_partial_lines(&self) -> bool {
            false
        }

        fn append(&mut self, text: &str) {
            self.line(text);
        }
    }

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `resume` - Optional session id or prefix to continue
    ///
    /// # Errors
    ///
    /// Returns error if storage or the HTTP client cannot be initialized, or
    /// if `resume` does not name a session
    pub async fn run_chat(config: Config, resume: Option<String>) -> Result<()> {
        tracing::info!("Starting interactive chat");

        let mut engine = Engine::from_config(&config)?;
        if let Some(id) = resume {
            let id = engine.controller.switch_session(&id)?;
            tracing::info!("Resuming session {}", id);
        }

        let (prompt_tx, prompt_rx) = std::sync::mpsc::channel::<String>();
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Input>();
        let (printer_tx, printer_rx) = oneshot::channel::<Option<SharedPrinter>>();
        spawn_reader(prompt_rx, input_tx, printer_tx);

        let palette = engine.theme.theme().palette();
        let view = match printer_rx.await {
            Ok(Some(printer)) => {
                TranscriptView::with_output(palette, Box::new(PrinterOutput { printer }))
            }
            _ => TranscriptView::new(palette),
        };
        let mut repl = Repl {
            view,
            max_attachment_bytes: config.attachments.max_file_size_bytes,
        };

        print_welcome_banner(&engine, &mut repl.view);
        if let Some(session) = engine.controller.store().active() {
            sessions::print_transcript(session, palette);
        }

        if prompt_tx.send(prompt_text(&engine)).is_err() {
            tracing::warn!("Line editor exited before the first prompt");
        }

        loop {
            tokio::select! {
                input = input_rx.recv() => {
                    let flow = match input {
                        Some(Input::Line(line)) => repl.handle_line(&mut engine, &line),
                        Some(Input::Interrupted) => {
                            println!("CTRL-C");
                            Flow::Exit
                        }
                        Some(Input::Eof) | None => {
                            println!("CTRL-D");
                            Flow::Exit
                        }
                    };
                    if flow == Flow::Exit || prompt_tx.send(prompt_text(&engine)).is_err() {
                        break;
                    }
                }
                Some(event) = engine.events.recv() => {
                    let outcome = engine.runtime.apply(&mut engine.controller, event);
                    repl.view.render(&outcome);
                }
            }
        }

        if !engine.controller.is_idle() {
            repl.view.notice("Finishing the answer in progress...");
        }
        engine.settle(&mut repl.view).await;
        drop(prompt_tx);

        println!("Goodbye!");
        Ok(())
    }

    struct Repl {
        view: TranscriptView,
        max_attachment_bytes: u64,
    }

    impl Repl {
        fn handle_line(&mut self, engine: &mut Engine, line: &str) -> Flow {
            let trimmed = line.trim();
            if trimmed.is_empty() && engine.controller.attachment().is_none() {
                return Flow::Continue;
            }

            let command = match parse_special_command(trimmed) {
                Ok(command) => command,
                Err(e) => {
                    self.view.notice(&e.to_string());
                    return Flow::Continue;
                }
            };

            match command {
                SpecialCommand::None => self.send(engine, trimmed),
                SpecialCommand::Exit => return Flow::Exit,
                SpecialCommand::Help => print_help(),
                SpecialCommand::ShowStatus => print_status(engine),
                SpecialCommand::NewChat => {
                    engine.controller.new_chat();
                    self.view
                        .notice("Started a new chat; it is created with your next message.");
                }
                SpecialCommand::ListSessions => {
                    sessions::print_session_table(
                        engine.controller.store(),
                        engine.theme.theme().palette(),
                    );
                }
                SpecialCommand::SwitchSession(id) => {
                    match engine.controller.switch_session(&id) {
                        Ok(id) => {
                            if let Some(session) = engine.controller.store().get(&id) {
                                sessions::print_transcript(
                                    session,
                                    engine.theme.theme().palette(),
                                );
                            }
                        }
                        Err(e) => self.view.notice(&e.to_string()),
                    }
                }
                SpecialCommand::DeleteSession(id) => self.delete(engine, id),
                SpecialCommand::Attach(path) => self.attach(engine, path),
                SpecialCommand::Detach => match engine.controller.remove_attachment() {
                    Some(attachment) => {
                        self.view.notice(&format!("Removed {}", attachment.name))
                    }
                    None => self.view.notice("No attachment to remove"),
                },
                SpecialCommand::Regenerate => {
                    if let Err(e) = engine.runtime.regenerate(&mut engine.controller) {
                        self.view.notice(&e.to_string());
                    }
                }
                SpecialCommand::Theme(choice) => {
                    let result = match choice {
                        Some(theme) => engine.theme.set(theme).map(|_| theme),
                        None => engine.theme.toggle(),
                    };
                    match result {
                        Ok(theme) => {
                            self.view.set_palette(theme.palette());
                            self.view.notice(&format!("Theme: {}", theme));
                        }
                        Err(e) => self.view.notice(&format!("Could not save theme: {}", e)),
                    }
                }
            }

            Flow::Continue
        }

        fn send(&mut self, engine: &mut Engine, text: &str) {
            if engine.controller.is_extracting() {
                self.view
                    .notice("Still reading the attached file; sending without it.");
            }
            match engine.runtime.submit(&mut engine.controller, text) {
                Ok(_) => {}
                Err(Rejection::Empty) => {}
                Err(e) => self.view.notice(&e.to_string()),
            }
        }

        fn delete(&mut self, engine: &mut Engine, id: Option<String>) {
            let target = match id {
                Some(id) => id,
                None => match engine.controller.store().active_id() {
                    Some(active) => active.to_string(),
                    None => {
                        self.view.notice("No active session to delete");
                        return;
                    }
                },
            };
            match engine.controller.delete_session(&target) {
                Ok(id) => self.view.notice(&format!("Deleted session {}", id)),
                Err(e) => self.view.notice(&e.to_string()),
            }
        }

        fn attach(&mut self, engine: &mut Engine, path: PathBuf) {
            let path = expand_home(path);
            self.view
                .notice(&format!("Reading {} ...", path.display()));
            engine
                .runtime
                .attach(&mut engine.controller, path, self.max_attachment_bytes);
        }
    }

    fn spawn_reader(
        prompts: std::sync::mpsc::Receiver<String>,
        lines: UnboundedSender<Input>,
        printer: oneshot::Sender<Option<SharedPrinter>>,
    ) {
        std::thread::spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    tracing::error!("Failed to initialize line editor: {}", e);
                    let _ = printer.send(None);
                    let _ = lines.send(Input::Eof);
                    return;
                }
            };

            let external = match rl.create_external_printer() {
                Ok(external) => Some(Box::new(external) as SharedPrinter),
                Err(e) => {
                    tracing::debug!("No external printer, writing to stdout: {}", e);
                    None
                }
            };
            if printer.send(external).is_err() {
                return;
            }

            while let Ok(prompt) = prompts.recv() {
                let input = match rl.readline(&prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = rl.add_history_entry(line.as_str());
                        }
                        Input::Line(line)
                    }
                    Err(ReadlineError::Interrupted) => Input::Interrupted,
                    Err(ReadlineError::Eof) => Input::Eof,
                    Err(err) => {
                        tracing::error!("Readline error: {:?}", err);
                        Input::Eof
                    }
                };
                let done = !matches!(input, Input::Line(_));
                if lines.send(input).is_err() || done {
                    break;
                }
            }
        });
    }

    fn prompt_text(engine: &Engine) -> String {
        let palette = engine.theme.theme().palette();
        let mut prompt = String::new();
        if let Some(attachment) = engine.controller.attachment() {
            prompt.push_str(&format!("[{}] ", attachment.name));
        } else if engine.controller.is_extracting() {
            prompt.push_str("[reading...] ");
        }
        format!("{}{} ", palette.muted(&prompt), palette.user_label(">>"))
    }

    fn expand_home(path: PathBuf) -> PathBuf {
        if let Some(dirs) = directories::UserDirs::new() {
            if let Ok(rest) = path.strip_prefix("~") {
                return dirs.home_dir().join(rest);
            }
        }
        path
    }

    fn print_welcome_banner(engine: &Engine, view: &mut TranscriptView) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                 Chatdeck Interactive Chat                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!(
            "Sessions: {}   Theme: {}",
            engine.controller.store().len(),
            engine.theme.theme()
        );
        view.notice("Type '/help' for available commands, 'exit' to quit\n");
    }

    fn print_status(engine: &Engine) {
        let store = engine.controller.store();
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Chatdeck Session Status                   ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        match store.active() {
            Some(session) => {
                let user_messages = session
                    .messages
                    .iter()
                    .filter(|m| m.role == Role::User)
                    .count();
                println!("Active Session:  {} ({})", session.title.bold(), session.id);
                println!(
                    "Messages:        {} ({} from you)",
                    session.messages.len(),
                    user_messages
                );
            }
            None => println!("Active Session:  {}", "none (next message starts one)".dimmed()),
        }
        println!("Stored Sessions: {}", store.len());
        match engine.controller.attachment() {
            Some(attachment) => println!(
                "Attachment:      {} ({})",
                attachment.name, attachment.mime_type
            ),
            None if engine.controller.is_extracting() => println!("Attachment:      reading..."),
            None => println!("Attachment:      none"),
        }
        let phase = match engine.controller.phase() {
            Phase::Idle => "idle",
            Phase::Sending => "waiting for answer",
            Phase::SendingImage => "waiting for image",
            Phase::Streaming => "streaming",
        };
        println!("State:           {}", phase);
        println!("Theme:           {}", engine.theme.theme());
        println!();
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::session::MemoryStore;
        use crate::test_utils::{InstantPacer, ScriptedService};
        use crate::theme::Theme;
        use std::sync::Mutex;

        #[derive(Clone, Default)]
        struct CapturedLines(Arc<Mutex<Vec<String>>>);

        impl CapturedLines {
            fn contains(&self, needle: &str) -> bool {
                self.0.lock().unwrap().iter().any(|line| line.contains(needle))
            }
        }

        impl TranscriptOutput for CapturedLines {
            fn line(&mut self, text: &str) {
                self.0.lock().unwrap().push(text.to_string());
            }

            fn holds_partial_lines(&self) -> bool {
                false
            }

            fn append(&mut self, text: &str) {
                self.line(text);
            }
        }

        fn repl(lines: &CapturedLines) -> Repl {
            Repl {
                view: TranscriptView::with_output(Theme::Dark.palette(), Box::new(lines.clone())),
                max_attachment_bytes: 1024,
            }
        }

        #[tokio::test]
        async fn test_new_chat_accepted_while_answer_streams() {
            let service = Arc::new(ScriptedService::new());
            service.push(Ok("The answer arrives slowly".to_string()));
            let mut engine = Engine::with_parts(
                Arc::new(MemoryStore::new()),
                service.clone(),
                Arc::new(InstantPacer),
                &Config::default(),
            );
            let lines = CapturedLines::default();
            let mut repl = repl(&lines);

            assert_eq!(repl.handle_line(&mut engine, "first question"), Flow::Continue);
            let original = engine
                .controller
                .in_flight_target()
                .map(str::to_string)
                .unwrap();

            let event = engine.events.recv().await.unwrap();
            let outcome = engine.runtime.apply(&mut engine.controller, event);
            repl.view.render(&outcome);
            assert_eq!(engine.controller.phase(), Phase::Streaming);

            assert_eq!(repl.handle_line(&mut engine, "second question"), Flow::Continue);
            assert_eq!(service.calls(), 1);
            assert!(lines.contains("Still working on the previous message"));

            assert_eq!(repl.handle_line(&mut engine, "/new"), Flow::Continue);
            assert!(engine.controller.store().active_id().is_none());
            assert_eq!(engine.controller.in_flight_target(), Some(original.as_str()));
            assert!(lines.contains("Started a new chat"));

            engine.settle(&mut repl.view).await;
            assert!(engine.controller.is_idle());
            let session = engine.controller.store().get(&original).unwrap();
            assert_eq!(session.messages.len(), 2);
            assert_eq!(
                session.messages[1].content.as_text(),
                "The answer arrives slowly"
            );
            assert!(lines.contains("The answer arrives slowly"));
        }

        #[test]
        fn test_line_buffered_stream_wraps_long_answers() {
            let lines = CapturedLines::default();
            let mut view =
                TranscriptView::with_output(Theme::Dark.palette(), Box::new(lines.clone()));
            let words = vec!["word"; 40].join(" ");

            view.streaming = true;
            view.pending_label = true;
            view.render(&EventOutcome::Progress(format!("{} ", words)));
            view.render(&EventOutcome::Progress("tail\nnext".to_string()));
            view.end_stream();

            let captured = lines.0.lock().unwrap().clone();
            assert!(captured.len() >= 3);
            assert!(captured[0].contains("assistant:"));
            assert!(!captured[1].contains("assistant:"));
            assert!(captured.iter().any(|line| line.contains("tail")));
            assert!(captured.last().unwrap().contains("next"));
        }

        #[test]
        fn test_expand_home_leaves_relative_paths() {
            assert_eq!(
                expand_home(PathBuf::from("docs/report.pdf")),
                PathBuf::from("docs/report.pdf")
            );
        }

        #[test]
        fn test_expand_home_replaces_tilde() {
            let expanded = expand_home(PathBuf::from("~/report.pdf"));
            if let Some(dirs) = directories::UserDirs::new() {
                assert_eq!(expanded, dirs.home_dir().join("report.pdf"));
            }
        }
    }
}

// One-shot message handler
pub mod ask {
    use super::*;
    use std::path::PathBuf;

    /// Send one message (optionally with an attachment) and print the answer
    ///
    /// The exchange is recorded as a new session.
    ///
    /// # Errors
    ///
    /// Returns error if the attachment cannot be extracted or there is
    /// nothing to send
    pub async fn run_ask(config: Config, attach: Option<PathBuf>, message: Vec<String>) -> Result<()> {
        let engine = Engine::from_config(&config)?;
        let palette = engine.theme.theme().palette();
        ask_with_engine(
            engine,
            attach,
            &message.join(" "),
            config.attachments.max_file_size_bytes,
            &mut TranscriptView::new(palette),
        )
        .await
    }

    /// Run a one-shot exchange on an assembled engine
    ///
    /// # Errors
    ///
    /// Returns error if the attachment cannot be extracted or there is
    /// nothing to send
    pub async fn ask_with_engine(
        mut engine: Engine,
        attach: Option<PathBuf>,
        text: &str,
        max_attachment_bytes: u64,
        view: &mut TranscriptView,
    ) -> Result<()> {
        if let Some(path) = attach {
            engine
                .runtime
                .attach(&mut engine.controller, path.clone(), max_attachment_bytes);
            engine.settle(view).await;
            if engine.controller.attachment().is_none() {
                anyhow::bail!("Could not attach {}", path.display());
            }
        }

        let request = engine
            .runtime
            .submit(&mut engine.controller, text)
            .map_err(|e| anyhow::anyhow!(e))?;
        tracing::debug!("Sent request {:?}", request);
        engine.settle(view).await;
        Ok(())
    }
}

// Document extraction handler
pub mod extract {
    use super::*;
    use crate::extractor;
    use std::path::PathBuf;

    /// Print the text extracted from `file`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub async fn run_extract(config: Config, file: PathBuf) -> Result<()> {
        let attachment =
            extractor::extract_file(file, config.attachments.max_file_size_bytes).await?;
        tracing::debug!(
            "Extracted {} characters from {} ({})",
            attachment.extracted_text.chars().count(),
            attachment.name,
            attachment.mime_type
        );
        println!("{}", attachment.extracted_text);
        Ok(())
    }
}

// Theme preference handler
pub mod theme {
    use super::*;
    use crate::cli::ThemeChoice;
    use crate::theme::Theme;

    /// Show or change the theme preference
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be opened or written
    pub fn run_theme(config: Config, choice: Option<ThemeChoice>) -> Result<()> {
        let mut setting = ThemeSetting::load(open_backend(&config)?);
        let theme = apply_choice(&mut setting, choice)?;
        println!("Theme: {}", theme.to_string().bold());
        Ok(())
    }

    /// Apply a theme choice, returning the resulting theme
    pub fn apply_choice(setting: &mut ThemeSetting, choice: Option<ThemeChoice>) -> Result<Theme> {
        match choice {
            None => Ok(setting.theme()),
            Some(ThemeChoice::Dark) => setting.set(Theme::Dark).map(|_| Theme::Dark),
            Some(ThemeChoice::Light) => setting.set(Theme::Light).map(|_| Theme::Light),
            Some(ThemeChoice::Toggle) => setting.toggle(),
        }
    }

}

// Credential handler
pub mod auth {
    use super::*;
    use crate::cli::AuthCommand;
    use crate::client::credentials::{CredentialSource, KeyringCredential, ACCESS_TOKEN_ENV};

    /// Store, remove or report the access token
    ///
    /// # Errors
    ///
    /// Returns error if the OS keyring is unavailable
    pub fn run_auth(command: AuthCommand) -> Result<()> {
        let keyring = KeyringCredential::default();
        match command {
            AuthCommand::Login { token } => {
                let token = token.trim();
                if token.is_empty() {
                    anyhow::bail!("Access token cannot be empty");
                }
                keyring.store(token)?;
                println!("{}", "Access token stored.".green());
            }
            AuthCommand::Logout => {
                keyring.clear()?;
                println!("{}", "Access token removed.".green());
            }
            AuthCommand::Status => {
                if std::env::var(ACCESS_TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()) {
                    println!("Access token: provided by {}", ACCESS_TOKEN_ENV.cyan());
                } else if keyring.bearer_token().is_some() {
                    println!("Access token: stored in the OS keyring");
                } else {
                    println!(
                        "{}",
                        "No access token; requests will be sent unauthenticated.".yellow()
                    );
                }
            }
        }
        Ok(())
    }
}
