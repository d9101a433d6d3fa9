use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    app::{AppState, Config},
    chat::{ConversationTarget, HistoryMerge, SessionManager, SessionNotice},
    cli::{handle_command, initial_target, resolve_config, Cli},
    utils::HuddleError,
};

use super::console::{render_contact, render_message, render_state, ConsoleCommand, HELP};

/// Main runtime orchestrator
pub struct Orchestrator {
    cli: Cli,
    config: Config,
}

impl Orchestrator {
    /// Create a new orchestrator from CLI args
    pub fn new(cli: Cli) -> Result<Self> {
        let config = resolve_config(&cli)?;
        Ok(Self { cli, config })
    }

    /// Run the orchestrator
    pub async fn run(self) -> Result<()> {
        if let Some(command) = &self.cli.command {
            if handle_command(command, &self.cli).await? {
                return Ok(());
            }
        }

        let state = AppState::new(self.config.clone())?;
        let session = Arc::new(state.start_session()?);
        let me = session.identity();
        println!(
            "Signed in as {} <{}>. Type /help for commands.",
            me.display_name.bold(),
            me.identity
        );

        let printer = spawn_printer(session.clone());

        if let Some(target) = initial_target(&self.cli) {
            open_target(&session, target);
        }

        let result = read_console(&session).await;

        session.shutdown();
        printer.abort();
        result
    }
}

/// Print session notices as they arrive
fn spawn_printer(session: Arc<SessionManager>) -> JoinHandle<()> {
    let mut notices = session.subscribe();
    let me = session.identity().identity;

    tokio::spawn(async move {
        loop {
            let notice = match notices.recv().await {
                Ok(notice) => notice,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "console fell behind session notices");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match notice {
                SessionNotice::TargetChanged(Some(target)) => {
                    println!("{} {}", "--".dimmed(), target.to_string().bold());
                }
                SessionNotice::TargetChanged(None) => {
                    println!("{}", "-- no conversation selected".dimmed());
                }
                SessionNotice::ConnectionChanged { state, .. } => {
                    println!("{} {}", "--".dimmed(), render_state(state));
                }
                SessionNotice::HistoryApplied {
                    messages, merge, ..
                } => {
                    if merge == HistoryMerge::Prepended && !messages.is_empty() {
                        println!("{}", "-- earlier messages".dimmed());
                    }
                    for message in &messages {
                        println!("{}", render_message(message, &me));
                    }
                }
                SessionNotice::MessageAppended(message) => {
                    println!("{}", render_message(&message, &me));
                }
                SessionNotice::LogCleared | SessionNotice::ContactsUpdated { .. } => {}
            }
        }
    })
}

fn open_target(session: &SessionManager, target: ConversationTarget) {
    if let Err(e) = session.select(target) {
        println!("{} {}", "error:".red(), e);
    }
}

async fn read_console(session: &SessionManager) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else { break };
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };

        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Send(text) => match session.send(&text) {
                Ok(()) => {}
                Err(HuddleError::NotConnected) if session.active_target().is_none() => {
                    println!("{}", "No conversation selected; use /dm or /group".yellow());
                }
                Err(e) => println!("{} {}", "error:".red(), e),
            },
            ConsoleCommand::Direct(identity) => {
                let name = session
                    .contacts()
                    .into_iter()
                    .find(|c| c.summary.identity == identity)
                    .map(|c| c.summary.display_name)
                    .unwrap_or_else(|| identity.clone());
                open_target(session, ConversationTarget::direct(identity, name));
            }
            ConsoleCommand::Group(name) => open_target(session, ConversationTarget::group(name)),
            ConsoleCommand::Leave => session.clear(),
            ConsoleCommand::Contacts => print_contacts(session, ""),
            ConsoleCommand::Search(query) => print_contacts(session, &query),
            ConsoleCommand::Status => print_status(session),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Invalid(reason) => println!("{}", reason.yellow()),
        }
    }
    Ok(())
}

fn print_contacts(session: &SessionManager, query: &str) {
    let contacts = session.search_contacts(query);
    if contacts.is_empty() {
        println!("{}", "No contacts.".dimmed());
    }
    for view in &contacts {
        println!("{}", render_contact(view));
    }
}

fn print_status(session: &SessionManager) {
    match session.active_target() {
        Some(target) => println!("Conversation: {}", target.to_string().bold()),
        None => println!("Conversation: {}", "none".dimmed()),
    }
    println!("Connection:   {}", render_state(session.connection_state()));
    println!("Generation:   {}", session.generation());
    println!("Messages:     {}", session.messages().len());
    println!("Contacts:     {}", session.contacts().len());
}
