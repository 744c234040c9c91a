use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

use super::storage::{Storage, StorageOp};

const SESSION_KEY: &str = "session";
const PENDING_KEY: &str = "pending_authorization";
const MARKET_KEY: &str = "user_market";

pub const DEFAULT_MARKET: &str = "US";

/// Fallback lifetime when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Bound applied to a provider-reported `expires_in`, in both directions.
pub const MAX_EXPIRES_IN: i64 = 24 * 3600;

/// Tokens of a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
}

impl AuthSession {
    pub fn new(
        access_token: impl Into<String>,
        expires_in: Option<i64>,
        refresh_token: Option<String>,
    ) -> Self {
        let expires_in = expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN)
            .clamp(-MAX_EXPIRES_IN, MAX_EXPIRES_IN);
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            expires_at: now
                .checked_add_signed(Duration::seconds(expires_in))
                .unwrap_or(now),
            refresh_token,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// One-time secrets of a login attempt, alive between building the login
/// URL and consuming the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

/// Typed view over [`Storage`] holding the session, the pending
/// authorization and the market preference.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.storage.get(key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding unreadable stored record");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Overwrites the stored session in one write.
    pub fn save(&self, session: &AuthSession) -> Result<(), StorageError> {
        let json = serde_json::to_string(session)?;
        self.storage.write(&[StorageOp::Set(SESSION_KEY.into(), json)])
    }

    /// Returns the session if present and not expired.
    pub fn load(&self) -> Result<Option<AuthSession>, StorageError> {
        Ok(self.stored()?.filter(|s| !s.is_expired()))
    }

    /// Returns the stored session even when its access token has expired.
    pub fn stored(&self) -> Result<Option<AuthSession>, StorageError> {
        self.read(SESSION_KEY)
    }

    pub fn is_expired(&self, session: &AuthSession) -> bool {
        session.is_expired()
    }

    /// Removes the session and any pending authorization. The market
    /// preference is kept.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.write(&[
            StorageOp::Remove(SESSION_KEY.into()),
            StorageOp::Remove(PENDING_KEY.into()),
        ])
    }

    pub fn save_pending(&self, pending: &PendingAuthorization) -> Result<(), StorageError> {
        let json = serde_json::to_string(pending)?;
        self.storage.write(&[StorageOp::Set(PENDING_KEY.into(), json)])
    }

    pub fn pending(&self) -> Result<Option<PendingAuthorization>, StorageError> {
        self.read(PENDING_KEY)
    }

    pub fn clear_pending(&self) -> Result<(), StorageError> {
        self.storage.remove(PENDING_KEY)
    }

    /// Saves the session and erases the pending authorization in the same
    /// batch.
    pub fn complete_authorization(&self, session: &AuthSession) -> Result<(), StorageError> {
        let json = serde_json::to_string(session)?;
        self.storage.write(&[
            StorageOp::Set(SESSION_KEY.into(), json),
            StorageOp::Remove(PENDING_KEY.into()),
        ])
    }

    pub fn market(&self) -> Result<String, StorageError> {
        Ok(self
            .storage
            .get(MARKET_KEY)?
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MARKET.to_string()))
    }

    pub fn set_market(&self, market: &str) -> Result<(), StorageError> {
        self.storage.set(MARKET_KEY, &market.to_uppercase())
    }
}
