//! Argument types for the `threadrun` binary.

use clap::{Parser, Subcommand};

/// Threadrun CLI
#[derive(Parser, Debug)]
#[command(name = "threadrun", version, about = "Stream assistant runs from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message and stream the reply
    Chat(ChatArgs),
    /// Print the messages of an existing thread
    History(HistoryArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Continue an existing thread instead of creating one
    #[arg(long)]
    pub thread: Option<String>,

    /// Assistant id (overrides THREADRUN_ASSISTANT_ID)
    #[arg(short, long)]
    pub assistant: Option<String>,

    /// Approve every tool request without prompting
    #[arg(long)]
    pub auto_approve: bool,

    /// Enable the web search tool
    #[arg(long)]
    pub web_search: bool,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Thread to print
    pub thread: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["threadrun", "chat", "Hello"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert!(args.thread.is_none());
                assert!(args.assistant.is_none());
                assert!(!args.auto_approve);
                assert_eq!(args.prompt.as_deref(), Some("Hello"));
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_chat_with_all_options() {
        let cli = Cli::try_parse_from([
            "threadrun",
            "chat",
            "--thread",
            "thread_1",
            "-a",
            "asst_1",
            "--auto-approve",
            "--web-search",
            "Hi",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.thread.as_deref(), Some("thread_1"));
                assert_eq!(args.assistant.as_deref(), Some("asst_1"));
                assert!(args.auto_approve);
                assert!(args.web_search);
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_history_requires_thread() {
        assert!(Cli::try_parse_from(["threadrun", "history"]).is_err());
        let cli = Cli::try_parse_from(["threadrun", "history", "thread_1"]).unwrap();
        assert!(matches!(cli.command, Commands::History(ref a) if a.thread == "thread_1"));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["threadrun"]).is_err());
    }
}
