use colored::Colorize;

use crate::chat::{ConnectionState, ContactView, Message};
use crate::constants::CONTACT_PREVIEW_CHARS;

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Plain text for the active conversation
    Send(String),
    Direct(String),
    Group(String),
    Leave,
    Contacts,
    Search(String),
    Status,
    Help,
    Quit,
    /// Recognised command used wrongly, or an unknown one
    Invalid(String),
}

impl ConsoleCommand {
    /// Parse a console line; `None` for blank input
    ///
    /// A leading `//` escapes the command prefix and sends the rest verbatim.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if let Some(escaped) = line.strip_prefix("//") {
            return Some(Self::Send(format!("/{}", escaped)));
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Send(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match (name, arg) {
            ("dm", "") => Self::Invalid("usage: /dm <identity>".to_string()),
            ("dm", identity) => Self::Direct(identity.to_string()),
            ("group", "") => Self::Invalid("usage: /group <name>".to_string()),
            ("group", group) => Self::Group(group.to_string()),
            ("leave", _) => Self::Leave,
            ("contacts", _) => Self::Contacts,
            ("search", query) => Self::Search(query.to_string()),
            ("status", _) => Self::Status,
            ("help", _) => Self::Help,
            ("quit", _) | ("exit", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("unknown command /{} (try /help)", other)),
        };
        Some(command)
    }
}

pub const HELP: &str = "\
Commands:
  /dm <identity>    open a direct conversation
  /group <name>     open a group conversation
  /leave            close the active conversation
  /contacts         list contacts
  /search <query>   filter contacts by name or identity
  /status           show the session status
  /help             show this help
  /quit             exit
Anything else is sent to the active conversation.";

/// A message as one console line
pub fn render_message(message: &Message, me: &str) -> String {
    let time = format!("[{}]", message.display_time());
    let name = if message.is_from(me) {
        message.sender_display_name.green().bold()
    } else {
        message.sender_display_name.cyan().bold()
    };
    format!("{} {}: {}", time.dimmed(), name, message.text)
}

pub fn render_contact(view: &ContactView) -> String {
    let marker = if view.selected { "*" } else { " " };
    let mut line = format!(
        "{} {} {}",
        marker.green(),
        view.summary.display_name.bold(),
        format!("<{}>", view.summary.identity).dimmed()
    );

    if let Some(text) = &view.summary.last_message_preview {
        line.push_str(&format!("  {}", preview(text)));
        if let Some(time) = &view.summary.last_message_time {
            line.push_str(&format!(" {}", time.dimmed()));
        }
    }
    if view.summary.unread_count > 0 {
        line.push_str(&format!(" ({})", view.summary.unread_count.to_string().yellow()));
    }
    line
}

pub fn render_state(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connected => state.to_string().green().to_string(),
        ConnectionState::Connecting => state.to_string().yellow().to_string(),
        ConnectionState::Disconnected => state.to_string().red().to_string(),
    }
}

/// Single-line preview cut at a character boundary
pub fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= CONTACT_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(CONTACT_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}
