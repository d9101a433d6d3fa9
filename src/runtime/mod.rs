/// Runtime orchestrator module - Gateway

mod console;
mod orchestrator;

pub use console::{preview, render_contact, render_message, render_state, ConsoleCommand, HELP};
pub use orchestrator::Orchestrator;
