//! Reply handling: classify, respond, then store.
//!
//! The response is always sent before the store call starts, so a slow or
//! failing store never delays or suppresses what the user sees.  Store
//! failures are logged and reported in the [`ReplyOutcome`]; they never
//! reach the chat.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use wishengine_core::{ClassificationResult, Parser, Responses, RuleSet};
use wishengine_store::MessageStore;

/// Sends text back to a chat.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// What happened to the store write for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Nothing to store: the reply was empty after cleaning.
    Skipped,
    /// The store confirmed the write.
    Confirmed,
    /// The store answered without confirming.
    Unconfirmed,
    /// The store call failed.
    Failed(String),
}

/// Result of handling one reply.
#[derive(Debug, Clone)]
pub struct ReplyOutcome {
    pub result: ClassificationResult,
    /// Whether a response was delivered to the chat.
    pub responded: bool,
    pub stored: StoreOutcome,
}

/// Handles replies to the bot's prompts.
///
/// One handler is shared by every in-flight update; each call builds its own
/// [`Parser`] over the shared rules.
pub struct ReplyHandler {
    rules: Arc<RuleSet>,
    responses: Responses,
    store: Arc<dyn MessageStore>,
}

impl ReplyHandler {
    pub fn new(rules: Arc<RuleSet>, responses: Responses, store: Arc<dyn MessageStore>) -> Self {
        Self {
            rules,
            responses,
            store,
        }
    }

    /// The store this handler writes to.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Classify `reply` to `prompt`, answer in `chat_id`, then store it.
    pub async fn handle_reply(
        &self,
        responder: &dyn Responder,
        chat_id: i64,
        prompt: &str,
        reply: &str,
    ) -> ReplyOutcome {
        let mut parser = Parser::with_rules(Arc::clone(&self.rules), self.responses.clone());
        parser.process(prompt, reply);

        info!(
            chat_id,
            state = %parser.state(),
            chars = parser.text_clean().chars().count(),
            "reply classified"
        );

        let responded = if parser.text().is_empty() {
            debug!(chat_id, "no response for this reply");
            false
        } else {
            match responder.reply(chat_id, parser.text()).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(chat_id, error = %e, "failed to send response");
                    false
                }
            }
        };

        let stored = self.store_result(parser.result()).await;

        ReplyOutcome {
            result: parser.result().clone(),
            responded,
            stored,
        }
    }

    async fn store_result(&self, result: &ClassificationResult) -> StoreOutcome {
        if result.clean_text.is_empty() {
            debug!("empty reply, nothing to store");
            return StoreOutcome::Skipped;
        }

        match self.store.store(&result.clean_text, result.state).await {
            Ok(true) => {
                debug!(state = %result.state, "message stored");
                StoreOutcome::Confirmed
            }
            Ok(false) => {
                warn!(state = %result.state, "store did not confirm the write");
                StoreOutcome::Unconfirmed
            }
            Err(e) => {
                error!(
                    state = %result.state,
                    endpoint = %self.store.endpoint(),
                    error = %e,
                    "failed to store message"
                );
                StoreOutcome::Failed(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory doubles shared by the handler and bot tests.

    use std::sync::Mutex;
    use std::time::Duration;

    use wishengine_core::State;
    use wishengine_store::{HealthReport, StoreError, StoredMessage};

    use super::*;

    /// Ordered log of side effects across the fakes.
    pub type EventLog = Arc<Mutex<Vec<String>>>;

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub enum StoreBehavior {
        Confirm,
        Reject,
        TimeOut,
        /// Confirm each write after the given delay.
        Slow(Duration),
    }

    pub struct FakeStore {
        pub behavior: StoreBehavior,
        pub records: Mutex<Vec<(String, State)>>,
        pub events: EventLog,
    }

    impl FakeStore {
        pub fn new(behavior: StoreBehavior, events: EventLog) -> Self {
            Self {
                behavior,
                records: Mutex::new(Vec::new()),
                events,
            }
        }
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        fn endpoint(&self) -> &str {
            "memory://"
        }

        async fn store(&self, text: &str, state: State) -> wishengine_store::Result<bool> {
            if let StoreBehavior::Slow(delay) = self.behavior {
                tokio::time::sleep(delay).await;
            }
            self.events.lock().unwrap().push(format!("store {state}: {text}"));
            match self.behavior {
                StoreBehavior::Confirm | StoreBehavior::Slow(_) => {
                    self.records.lock().unwrap().insert(0, (text.to_string(), state));
                    Ok(true)
                }
                StoreBehavior::Reject => Ok(false),
                StoreBehavior::TimeOut => Err(StoreError::Timeout {
                    operation: "store",
                    timeout: Duration::from_secs(10),
                }),
            }
        }

        async fn fetch(
            &self,
            state: State,
            limit: usize,
        ) -> wishengine_store::Result<Vec<StoredMessage>> {
            if self.behavior == StoreBehavior::TimeOut {
                return Err(StoreError::Timeout {
                    operation: "fetch",
                    timeout: Duration::from_secs(10),
                });
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, s)| *s == state)
                .take(limit)
                .map(|(text, state)| StoredMessage {
                    id: None,
                    text: text.clone(),
                    state: *state,
                    created_at: None,
                })
                .collect())
        }

        async fn health(&self) -> wishengine_store::Result<HealthReport> {
            if self.behavior == StoreBehavior::TimeOut {
                return Err(StoreError::Timeout {
                    operation: "health check",
                    timeout: Duration::from_secs(10),
                });
            }
            Ok(HealthReport {
                endpoint: self.endpoint().to_string(),
                status_code: 200,
                body: "ok".into(),
                connected: true,
            })
        }
    }

    pub struct FakeResponder {
        pub events: EventLog,
    }

    #[async_trait]
    impl Responder for FakeResponder {
        async fn reply(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("reply {chat_id}: {text}"));
            Ok(())
        }
    }

    pub fn handler_with(behavior: StoreBehavior) -> (ReplyHandler, Arc<FakeStore>, EventLog) {
        let events = EventLog::default();
        let store = Arc::new(FakeStore::new(behavior, Arc::clone(&events)));
        let handler = ReplyHandler::new(
            Arc::new(RuleSet::builtin()),
            Responses::default(),
            Arc::clone(&store) as Arc<dyn MessageStore>,
        );
        (handler, store, events)
    }
}
