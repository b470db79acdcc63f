//! CLI entry point for wishengine.
//!
//! This binary provides the `wishengine` command: `run` starts the Telegram
//! bot, the other subcommands exercise the classifier and the message store
//! from the shell.

mod bot;
mod cli;
mod commands;
mod config;
mod handler;
mod health;
mod helpers;
mod telegram;

use anyhow::{Context, Result};
use clap::Parser as _;

use wishengine_core::{Parser, State};
use wishengine_store::{MessageStore, MessageStoreClient};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::helpers::init_tracing;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { poll_timeout } => {
            init_tracing("info");
            bot::cmd_bot(AppConfig::load(), poll_timeout).await
        }
        Commands::Classify { prompt, reply } => {
            init_tracing("warn");
            cmd_classify(&AppConfig::load(), &prompt, &reply)
        }
        Commands::Fetch { state, limit } => {
            init_tracing("warn");
            cmd_fetch(&AppConfig::load(), state, limit).await
        }
        Commands::Health => {
            init_tracing("warn");
            cmd_health(&AppConfig::load()).await
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_classify(config: &AppConfig, prompt: &str, reply: &str) -> Result<()> {
    let mut parser = Parser::with_rules(config.rule_set(), config.responses.clone());
    parser.process(prompt, reply);
    println!("{}", serde_json::to_string_pretty(parser.result())?);
    Ok(())
}

async fn cmd_fetch(config: &AppConfig, state: State, limit: usize) -> Result<()> {
    let store = store_client(config)?;
    let messages = store
        .fetch(state, limit)
        .await
        .with_context(|| format!("failed to fetch {state} messages"))?;
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

async fn cmd_health(config: &AppConfig) -> Result<()> {
    let store = store_client(config)?;
    let summary = health::check(&store).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.is_healthy() {
        anyhow::bail!("message store at {} is unreachable", store.endpoint());
    }
    Ok(())
}

fn store_client(config: &AppConfig) -> Result<MessageStoreClient> {
    MessageStoreClient::new(config.store_config()).context("failed to create message store client")
}
