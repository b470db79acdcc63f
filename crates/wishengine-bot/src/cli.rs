//! CLI argument definitions for wishengine.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};

use wishengine_core::State;

/// wishengine -- a Telegram bot that records yes/no answers.
#[derive(Parser)]
#[command(
    name = "wishengine",
    version,
    about = "wishengine -- Telegram bot that records yes/no answers",
    long_about = "Classifies replies to the bot's prompts as positive, negative or unknown, \
                  acknowledges them in chat and stores them in a remote message store."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Telegram bot and its health endpoint.
    Run {
        /// Telegram long-polling timeout in seconds (overrides the config file).
        #[arg(long)]
        poll_timeout: Option<u64>,
    },

    /// Classify one reply and print the result as JSON.
    Classify {
        /// The prompt the reply answers.
        #[arg(long, short, default_value = "")]
        prompt: String,

        /// The reply text.
        reply: String,
    },

    /// Fetch stored messages for a state and print them as JSON.
    Fetch {
        /// `positive`, `negative` or `unknown`.
        state: State,

        /// Maximum number of messages.
        #[arg(long, short, default_value_t = 1)]
        limit: usize,
    },

    /// Check the message store and print its health report.
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_state() {
        let cli = Cli::try_parse_from(["wishengine", "fetch", "NEGATIVE", "--limit", "3"]).unwrap();
        match cli.command {
            Commands::Fetch { state, limit } => {
                assert_eq!(state, State::Negative);
                assert_eq!(limit, 3);
            }
            _ => panic!("expected fetch"),
        }
        assert!(Cli::try_parse_from(["wishengine", "fetch", "maybe"]).is_err());
    }

    #[test]
    fn parses_classify() {
        let cli =
            Cli::try_parse_from(["wishengine", "classify", "-p", "Coffee?", "yes please"]).unwrap();
        match cli.command {
            Commands::Classify { prompt, reply } => {
                assert_eq!(prompt, "Coffee?");
                assert_eq!(reply, "yes please");
            }
            _ => panic!("expected classify"),
        }
    }
}
