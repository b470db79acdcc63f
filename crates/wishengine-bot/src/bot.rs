//! Subcommand: `wishengine run` -- Telegram bot gateway.
//!
//! Long-polls Telegram for messages and handles each update on its own task.
//! On ctrl-c polling stops and in-flight updates are allowed to finish.
//! Replies to the bot's prompts are classified, acknowledged and stored;
//! slash commands are answered directly.  The health endpoint runs alongside
//! the polling loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use wishengine_core::State;
use wishengine_store::{MessageStore, MessageStoreClient};

use crate::commands::{self, Command};
use crate::config::AppConfig;
use crate::handler::{ReplyHandler, Responder};
use crate::health;
use crate::helpers::telegram_token;
use crate::telegram::{IncomingMessage, TelegramClient};

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Everything an update task needs, shared across tasks.
pub struct BotContext {
    pub responder: Arc<dyn Responder>,
    pub handler: ReplyHandler,
    pub bot_name: String,
    /// Telegram username, used to accept `/cmd@username`.
    pub bot_username: Option<String>,
    pub start_message: Option<String>,
    pub fetch_limit: usize,
}

/// Run the Telegram bot gateway.
pub async fn cmd_bot(config: AppConfig, poll_timeout: Option<u64>) -> Result<()> {
    info!(name = %config.bot_name, "starting Telegram bot gateway");

    let token = telegram_token()
        .ok_or_else(|| anyhow!("TELEGRAM_TOKEN is not set; the bot cannot start without it"))?;

    let store: Arc<dyn MessageStore> = Arc::new(
        MessageStoreClient::new(config.store_config())
            .context("failed to create message store client")?,
    );

    let telegram = Arc::new(TelegramClient::new(&token)?);
    let username = telegram
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    info!(username = %username, "connected to Telegram");

    let health_bind = config.health_bind.clone();
    let health_store = Arc::clone(&store);
    tokio::spawn(async move {
        if let Err(e) = health::serve(&health_bind, health_store).await {
            error!(error = %e, "health endpoint failed");
        }
    });

    let rules = config.rule_set();
    info!(phrases = rules.phrase_count(), "classification rules loaded");

    let ctx = Arc::new(BotContext {
        responder: Arc::clone(&telegram) as Arc<dyn Responder>,
        handler: ReplyHandler::new(rules, config.responses.clone(), store),
        bot_name: config.bot_name.clone(),
        bot_username: Some(username),
        start_message: config.start_message.clone(),
        fetch_limit: config.fetch_limit,
    });

    let poll_timeout = poll_timeout.unwrap_or(config.poll_timeout);
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested, stopping bot"),
            Err(e) => {
                error!(error = %e, "cannot listen for ctrl-c, running until killed");
                std::future::pending::<()>().await;
            }
        }
    };

    run_polling(&telegram, ctx, poll_timeout, shutdown).await;
    Ok(())
}

/// Poll for updates until `shutdown` resolves, handling each update on its
/// own task.
///
/// Update tasks are tracked in a [`JoinSet`]; on shutdown no new updates are
/// fetched and every task still in flight is awaited, so a reply that was
/// acknowledged is also stored (or times out) before this returns.
pub async fn run_polling(
    telegram: &TelegramClient,
    ctx: Arc<BotContext>,
    poll_timeout: u64,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    let mut tasks: JoinSet<()> = JoinSet::new();
    let mut offset: i64 = 0;

    info!(poll_timeout, "polling for updates");
    loop {
        while let Some(joined) = tasks.try_join_next() {
            log_task_result(joined);
        }

        let updates = tokio::select! {
            _ = &mut shutdown => break,
            res = telegram.get_updates(offset, poll_timeout) => res,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Telegram poll failed, retrying...");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                }
            }
        };

        for update in &updates {
            if let Some(update_id) = update.get("update_id").and_then(|v| v.as_i64()) {
                offset = offset.max(update_id + 1);
            }

            let Some(message) = IncomingMessage::from_update(update) else {
                debug!("ignoring non-text update");
                continue;
            };

            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move {
                dispatch(&ctx, message).await;
            });
        }
    }

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "waiting for in-flight updates");
    }
    while let Some(joined) = tasks.join_next().await {
        log_task_result(joined);
    }
    info!("bot stopped");
}

fn log_task_result(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "update task failed");
    }
}

/// Route one incoming message to a command or the reply handler.
pub async fn dispatch(ctx: &BotContext, message: IncomingMessage) {
    if let Some(command) = Command::parse(&message.text, ctx.bot_username.as_deref()) {
        info!(chat_id = message.chat_id, command = ?command, "command received");
        let text = run_command(ctx, command).await;
        if let Err(e) = ctx.responder.reply(message.chat_id, &text).await {
            warn!(chat_id = message.chat_id, error = %e, "failed to answer command");
        }
        return;
    }

    if message.text.trim_start().starts_with('/') {
        debug!(chat_id = message.chat_id, "ignoring unknown command");
        return;
    }

    let Some(prompt) = message.reply_to_text.as_deref() else {
        debug!(chat_id = message.chat_id, "ignoring message that is not a reply");
        return;
    };

    debug!(
        chat_id = message.chat_id,
        message_id = message.message_id,
        from = message.from.as_deref().unwrap_or("?"),
        "handling reply"
    );
    let outcome = ctx
        .handler
        .handle_reply(ctx.responder.as_ref(), message.chat_id, prompt, &message.text)
        .await;
    debug!(
        chat_id = message.chat_id,
        state = %outcome.result.state,
        responded = outcome.responded,
        stored = ?outcome.stored,
        "reply handled"
    );
}

async fn run_command(ctx: &BotContext, command: Command) -> String {
    match command {
        Command::Start => commands::start_text(ctx.start_message.as_deref(), &ctx.bot_name),
        Command::Help => commands::HELP_TEXT.to_string(),
        Command::Ping => {
            let summary = health::check(ctx.handler.store().as_ref()).await;
            commands::ping_text(summary.is_healthy())
        }
        Command::Fetch => fetch_recent(ctx).await,
    }
}

async fn fetch_recent(ctx: &BotContext) -> String {
    let store = ctx.handler.store();
    let mut groups = Vec::with_capacity(2);
    let mut failures = 0;

    for state in [State::Positive, State::Negative] {
        match store.fetch(state, ctx.fetch_limit).await {
            Ok(messages) => groups.push((state, messages)),
            Err(e) => {
                error!(state = %state, error = %e, "failed to fetch messages");
                failures += 1;
            }
        }
    }

    if failures == 2 {
        return "Could not reach the message server, try again later.".to_string();
    }
    commands::format_fetch(&groups, &ctx.bot_name)
}
