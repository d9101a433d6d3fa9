use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(version)]
#[command(about = "Terminal client for direct and group chat", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Chat server REST root (overrides server.api_url)
    #[arg(long, global = true, env = "HUDDLE_API_URL")]
    pub server: Option<String>,

    /// Open a direct conversation with this identity
    #[arg(short, long, global = true, conflicts_with = "group")]
    pub direct: Option<String>,

    /// Open a group conversation by name
    #[arg(short, long, global = true)]
    pub group: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// Start a chat session (default)
    Chat,
    /// List contacts once and exit
    Contacts,
    /// Print the history of --direct or --group and exit
    History,
    /// Check server reachability and configuration
    Status,
    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_and_group_conflict() {
        let parsed = Cli::try_parse_from(["huddle", "--direct", "bob@example.com", "--group", "owls"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["huddle", "history", "--group", "Night Owls", "-v"]).unwrap();
        assert_eq!(cli.command, Some(Commands::History));
        assert_eq!(cli.group.as_deref(), Some("Night Owls"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_chat_is_optional() {
        let cli = Cli::try_parse_from(["huddle"]).unwrap();
        assert!(cli.command.is_none());
    }
}
