use crate::cli::SessionCommand;
use crate::controller::ConversationController;
use crate::error::Result;
use crate::session::{Message, MessageContent, Role, Session, SessionStore};
use crate::theme::Palette;
use chrono::Local;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle `sessions` subcommands
///
/// Deletion goes through the controller, the same path `/delete` takes.
pub fn handle_sessions(
    command: SessionCommand,
    controller: &mut ConversationController,
    palette: Palette,
) -> Result<()> {
    match command {
        SessionCommand::List => print_session_table(controller.store(), palette),
        SessionCommand::Show { id } => {
            let store = controller.store();
            let id = store.resolve(&id)?;
            if let Some(session) = store.get(&id) {
                print_transcript(session, palette);
            }
        }
        SessionCommand::Delete { id } => {
            let id = controller.delete_session(&id)?;
            println!("{}", format!("Deleted session {}", id).green());
        }
    }

    Ok(())
}

/// Print all sessions grouped into Today / Yesterday / Earlier
pub fn print_session_table(store: &SessionStore, palette: Palette) {
    if store.is_empty() {
        println!("{}", "No sessions yet.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "".bold(),
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Created".bold()
    ]);

    for (group, sessions) in store.grouped_by_recency(Local::now()) {
        table.add_row(prettytable::row![group.to_string().bold(), "", "", "", ""]);
        for session in sessions {
            let marker = if store.active_id() == Some(session.id.as_str()) {
                "*"
            } else {
                ""
            };
            let created = session
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string();

            table.add_row(prettytable::row![
                marker,
                short_id(&session.id).cyan(),
                session.title,
                session.messages.len(),
                created
            ]);
        }
    }

    println!("\nSessions:");
    table.printstd();
    println!();
    println!(
        "{}",
        palette.muted("Use chatdeck chat --resume <ID> or /switch <ID> to continue a session.")
    );
    println!();
}

/// Print every message of a session
pub fn print_transcript(session: &Session, palette: Palette) {
    println!(
        "\n{} {}\n",
        session.title.bold(),
        palette.muted(&format!("({})", session.id))
    );
    if session.messages.is_empty() {
        println!("{}", palette.muted("(no messages)"));
        return;
    }
    for message in &session.messages {
        print_message(message, palette);
    }
}

/// Print one message with its role label
pub fn print_message(message: &Message, palette: Palette) {
    println!("{}\n", format_message(message, palette));
}

/// One message with its role label, without a trailing newline
pub fn format_message(message: &Message, palette: Palette) -> String {
    match message.role {
        Role::User => format!("{} {}", palette.user_label("you:"), message.content.as_text()),
        Role::Assistant => match &message.content {
            MessageContent::Text(text) => {
                format!("{} {}", palette.assistant_label("assistant:"), palette.body(text))
            }
            MessageContent::Image { url } => format!(
                "{} {} {}",
                palette.assistant_label("assistant:"),
                palette.muted("[image]"),
                url.underline()
            ),
        },
    }
}

/// First eight characters of a session id
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}
