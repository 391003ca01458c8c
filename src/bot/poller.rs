//! The top-level polling loop.
//!
//! States: Connecting (one-time identity check, fatal on failure) →
//! Polling (steady state) → Stopped (cancellation). The loop owns the
//! update cursor and advances it only after an update has been processed,
//! so a crash mid-handling redelivers that update instead of skipping it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bot::dispatcher::{Dispatcher, Inbound};
use crate::config::{ERROR_BACKOFF_SECS, POLL_WAIT_SECS};
use crate::telegram::{BotIdentity, Transport, TransportError, Update};

/// Long-poll loop driving the dispatcher, one update at a time.
pub struct Poller {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    /// Smallest update identifier not yet processed.
    cursor: i64,
    backoff: Duration,
}

impl Poller {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, dispatcher: Dispatcher) -> Self {
        Self {
            transport,
            dispatcher,
            cursor: 0,
            backoff: Duration::from_secs(ERROR_BACKOFF_SECS),
        }
    }

    /// Override the transient-error backoff (tests use zero).
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// The offset that will be sent with the next `getUpdates` call.
    #[must_use]
    pub const fn cursor(&self) -> i64 {
        self.cursor
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// One-time identity check against the messaging transport.
    ///
    /// # Errors
    ///
    /// Failure here is fatal for startup: without a bot identity there is
    /// nothing to serve.
    pub async fn connect(&self) -> Result<BotIdentity, TransportError> {
        let identity = self.transport.get_identity().await?;
        info!(
            "✅ Connected to bot: @{}",
            identity.username.as_deref().unwrap_or(&identity.first_name)
        );
        Ok(identity)
    }

    /// Fetch one batch of updates and process it in order.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the long-poll call itself fails;
    /// the cursor is not advanced in that case.
    pub async fn poll_once(&mut self) -> Result<(), TransportError> {
        let updates = self.transport.get_updates(self.cursor, POLL_WAIT_SECS).await?;
        for update in updates {
            self.process_update(update).await;
        }
        Ok(())
    }

    async fn process_update(&mut self, update: Update) {
        let update_id = update.update_id;

        if let Some(inbound) = extract_inbound(update) {
            // One bad update must never terminate the process
            if let Err(e) = self.dispatcher.dispatch(inbound).await {
                error!("Error handling update {update_id}: {e}");
            }
        }

        // Advance after processing, not before: at-least-once semantics
        self.cursor = update_id + 1;
    }

    /// Run until the token is cancelled: connect once, then poll forever,
    /// logging transient errors and sleeping a fixed backoff between
    /// failed attempts.
    ///
    /// # Errors
    ///
    /// Returns an error only when the startup identity check fails.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), TransportError> {
        self.connect().await?;
        info!("Bot is running...");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("👋 Bot stopped");
                    return Ok(());
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        warn!("Polling error: {e}");
                        tokio::select! {
                            () = shutdown.cancelled() => {
                                info!("👋 Bot stopped");
                                return Ok(());
                            }
                            () = tokio::time::sleep(self.backoff) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Extracts the dispatcher input from an update; updates without a text
/// payload or a sender are ignored silently.
fn extract_inbound(update: Update) -> Option<Inbound> {
    let message = update.message?;
    let text = message.text?;
    if text.is_empty() {
        return None;
    }
    let from = message.from?;
    Some(Inbound {
        chat_id: message.chat.id,
        user_id: from.id,
        display_name: from.first_name,
        username: from.username,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{Chat, IncomingMessage, Sender};

    fn update(id: i64, text: Option<&str>) -> Update {
        Update {
            update_id: id,
            message: Some(IncomingMessage {
                chat: Chat { id: 9 },
                from: Some(Sender {
                    id: 9,
                    first_name: "Alice".to_string(),
                    username: None,
                }),
                text: text.map(ToString::to_string),
            }),
        }
    }

    #[test]
    fn test_extract_inbound_from_text_update() {
        let inbound = extract_inbound(update(1, Some("hello"))).expect("text update");
        assert_eq!(inbound.chat_id, 9);
        assert_eq!(inbound.user_id, 9);
        assert_eq!(inbound.text, "hello");
    }

    #[test]
    fn test_updates_without_text_are_ignored() {
        assert!(extract_inbound(update(1, None)).is_none());
        assert!(extract_inbound(update(2, Some(""))).is_none());
        assert!(extract_inbound(Update {
            update_id: 3,
            message: None
        })
        .is_none());
    }
}
