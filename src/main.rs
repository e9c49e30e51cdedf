//! Chatdeck - terminal chat client
//!
#![doc = "Chatdeck - terminal chat client"]
#![doc = "Main entry point for the Chatdeck application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatdeck::cli::{Cli, Commands};
use chatdeck::commands;
use chatdeck::config::Config;
use chatdeck::controller::ConversationController;
use chatdeck::session::SessionStore;
use chatdeck::theme::ThemeSetting;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { resume } => {
            if let Some(r) = &resume {
                tracing::debug!("Resuming session: {}", r);
            }
            commands::chat::run_chat(config, resume).await?;
            Ok(())
        }
        Commands::Ask { attach, message } => {
            tracing::info!("Sending one-shot message");
            commands::ask::run_ask(config, attach, message).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            let backend = commands::open_backend(&config)?;
            let palette = ThemeSetting::load(backend.clone()).theme().palette();
            let store = SessionStore::open(backend);
            let mut controller = ConversationController::new(store, config.streaming.policy());
            commands::sessions::handle_sessions(command, &mut controller, palette)?;
            Ok(())
        }
        Commands::Extract { file } => {
            tracing::debug!("Extracting {}", file.display());
            commands::extract::run_extract(config, file).await?;
            Ok(())
        }
        Commands::Theme { mode } => {
            commands::theme::run_theme(config, mode)?;
            Ok(())
        }
        Commands::Auth { command } => {
            commands::auth::run_auth(command)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so they never interleave with streamed answers.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chatdeck=debug"
    } else {
        "chatdeck=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
