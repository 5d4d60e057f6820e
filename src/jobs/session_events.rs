//! Background job: consume the identity provider's session-changed channel.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::identity::SessionEvent;

/// Spawn the session event consumer. Call this once at startup.
pub fn spawn(mut events: broadcast::Receiver<SessionEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::SignedIn { user_id }) => {
                    tracing::info!(user_id = %user_id, "session started");
                }
                Ok(SessionEvent::SignedOut { user_id }) => {
                    tracing::info!(user_id = %user_id, "session ended");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session event consumer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
