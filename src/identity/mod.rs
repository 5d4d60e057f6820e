pub mod jwt;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::identity::{Role, Session, SessionEvent};

/// Abstraction over the identity backend.
/// Implementations: JwtIdentity (HS256 session tokens + role table).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token. `Ok(None)` means the token is not a valid
    /// live session (malformed, expired or signed out).
    async fn get_session(&self, token: &str) -> anyhow::Result<Option<Session>>;

    async fn has_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool>;

    /// End a session. Later `get_session` calls with its token return `None`.
    async fn sign_out(&self, session: &Session) -> anyhow::Result<()>;

    /// Session-changed events. Subscribe once at startup.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
