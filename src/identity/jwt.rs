//! HS256 session tokens with role lookup and sign-out.
//!
//! A token carries the user id (`sub`), expiry and a random `jti`. Signing
//! out records the SHA-256 of the token until its natural expiry, so the
//! same token no longer resolves to a session. The first time a token
//! resolves on this process a `SignedIn` event is sent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::IdentityProvider;
use crate::models::identity::{Role, Session, SessionEvent};
use crate::store::RoleStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
    jti: String,
}

/// Mints session tokens. Needs only the shared secret, so the CLI can issue
/// tokens without a database connection.
pub struct TokenSigner {
    encoding: EncodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a session token for `user_id`, valid for `ttl`.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> anyhow::Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }
}

pub struct JwtIdentity {
    signer: TokenSigner,
    decoding: DecodingKey,
    validation: Validation,
    roles: Arc<dyn RoleStore>,
    /// token hash -> expiry (unix seconds), for tokens already announced
    seen: DashMap<String, i64>,
    /// token hash -> expiry (unix seconds)
    revoked: DashMap<String, i64>,
    events: broadcast::Sender<SessionEvent>,
}

impl JwtIdentity {
    pub fn new(secret: &str, roles: Arc<dyn RoleStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            signer: TokenSigner::new(secret),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            roles,
            seen: DashMap::new(),
            revoked: DashMap::new(),
            events,
        }
    }

    /// Mint a session token for `user_id`, valid for `ttl`.
    pub fn issue_token(&self, user_id: Uuid, ttl: Duration) -> anyhow::Result<(String, DateTime<Utc>)> {
        self.signer.issue(user_id, ttl)
    }

    fn purge_expired(&self) {
        let now = Utc::now().timestamp();
        self.seen.retain(|_, exp| *exp > now);
        self.revoked.retain(|_, exp| *exp > now);
    }
}

fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait]
impl IdentityProvider for JwtIdentity {
    async fn get_session(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let data = match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("session token rejected: {}", e);
                return Ok(None);
            }
        };

        let hash = token_hash(token);
        if self.revoked.contains_key(&hash) {
            tracing::debug!("session token was signed out");
            return Ok(None);
        }

        let Ok(user_id) = Uuid::parse_str(&data.claims.sub) else {
            tracing::warn!(sub = %data.claims.sub, "session token has a non-uuid subject");
            return Ok(None);
        };
        let Some(expires_at) = DateTime::<Utc>::from_timestamp(data.claims.exp, 0) else {
            return Ok(None);
        };

        if !self.seen.contains_key(&hash) {
            self.purge_expired();
            if self.seen.insert(hash, data.claims.exp).is_none() {
                // No receivers is fine.
                let _ = self.events.send(SessionEvent::SignedIn { user_id });
            }
        }

        Ok(Some(Session {
            user_id,
            expires_at,
            token: token.to_string(),
        }))
    }

    async fn has_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        self.roles.has_role(user_id, role).await
    }

    async fn sign_out(&self, session: &Session) -> anyhow::Result<()> {
        self.purge_expired();
        let hash = token_hash(&session.token);
        self.seen.remove(&hash);
        self.revoked.insert(hash, session.expires_at.timestamp());
        let _ = self.events.send(SessionEvent::SignedOut {
            user_id: session.user_id,
        });
        tracing::info!(user_id = %session.user_id, "session signed out");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
