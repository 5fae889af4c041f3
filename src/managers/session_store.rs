//! Session store for Stashed.
//!
//! Owns the one "current" session per extension install: an in-memory copy
//! behind an async lock plus an AES-256-GCM-encrypted record in SQLite.
//! Every context calls [`SessionStore::get`] before a remote call, which
//! makes `get` the single suspension point where expiry is checked and a
//! lazy refresh happens. There is no background timer; a user-invoked
//! action is always imminent before a remote call is made.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::params;
use tokio::sync::Mutex;

use crate::database::Database;
use crate::services::auth_client::AuthClient;
use crate::services::crypto_service::TokenCipher;
use crate::types::errors::SessionError;
use crate::types::session::{EncryptedData, Session};

/// Internal session encryption key derived from a fixed identifier.
/// In production this would use a machine-specific identifier; for now a fixed passphrase + salt.
const SESSION_KEY_PASSPHRASE: &str = "stashed-session-key-v1";
const SESSION_KEY_SALT: &[u8] = b"stashed-sess";

/// Durable, per-install cache of the current session.
pub struct SessionStore {
    db: Arc<Database>,
    auth: Arc<dyn AuthClient>,
    cipher: TokenCipher,
    cached: Mutex<Option<Session>>,
}

impl SessionStore {
    /// Creates a new SessionStore, deriving the at-rest encryption key.
    pub fn new(db: Arc<Database>, auth: Arc<dyn AuthClient>) -> Result<Self, SessionError> {
        let cipher = TokenCipher::derive(SESSION_KEY_PASSPHRASE, SESSION_KEY_SALT)
            .map_err(|e| SessionError::Crypto(e.to_string()))?;
        Ok(Self {
            db,
            auth,
            cipher,
            cached: Mutex::new(None),
        })
    }

    /// Returns the current session, or `None` when the user must
    /// re-authenticate.
    ///
    /// In-memory hit: returned as-is if unexpired, refreshed first if
    /// expired. Miss: the durable record is loaded, cached, and put through
    /// the same expiry check. A failed refresh clears the store and yields
    /// `None`; the UI boundary turns that into a login redirect.
    pub async fn get(&self) -> Result<Option<Session>, SessionError> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = self.load_durable()?;
        }

        match cached.as_ref() {
            None => return Ok(None),
            Some(session) if !session.is_expired_at(now_ms()) => {
                return Ok(Some(session.clone()))
            }
            Some(_) => {}
        }

        match self.refresh_locked(&mut cached).await {
            Ok(session) => Ok(Some(session)),
            Err(SessionError::Expired) | Err(SessionError::NoRefreshToken) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replaces the in-memory and durable copies.
    ///
    /// Both writes happen under the store lock, durable first, so callers
    /// never observe one copy updated and the other not. A durable write
    /// failure leaves the in-memory copy unchanged.
    pub async fn set(&self, session: Session) -> Result<(), SessionError> {
        let mut cached = self.cached.lock().await;
        self.persist_durable(&session)?;
        *cached = Some(session);
        Ok(())
    }

    /// Removes both the in-memory and durable copies.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let mut cached = self.cached.lock().await;
        self.delete_durable()?;
        *cached = None;
        Ok(())
    }

    /// Exchanges the stored refresh token for a new session.
    ///
    /// Fails with `NoRefreshToken` when nothing is cached at all, and with
    /// `Expired` (after clearing both copies) when the provider rejects the
    /// exchange.
    pub async fn refresh(&self) -> Result<Session, SessionError> {
        let mut cached = self.cached.lock().await;
        self.refresh_locked(&mut cached).await
    }

    /// Refresh with the store lock already held. Holding the lock across
    /// the exchange serializes concurrent `get()`s, so an expired session
    /// triggers exactly one provider call.
    async fn refresh_locked(
        &self,
        cached: &mut Option<Session>,
    ) -> Result<Session, SessionError> {
        if cached.is_none() {
            *cached = self.load_durable()?;
        }
        let refresh_token = match cached.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => return Err(SessionError::NoRefreshToken),
        };

        match self.auth.refresh_session(&refresh_token).await {
            Ok(next) => {
                self.persist_durable(&next)?;
                *cached = Some(next.clone());
                Ok(next)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed; clearing stored session");
                self.delete_durable()?;
                *cached = None;
                Err(SessionError::Expired)
            }
        }
    }

    /// Loads and decrypts the durable record, if any.
    fn load_durable(&self) -> Result<Option<Session>, SessionError> {
        let conn = self.db.connection();
        let result = conn.query_row(
            "SELECT ciphertext, iv, auth_tag FROM session WHERE id = 'current'",
            [],
            |row| {
                Ok(EncryptedData {
                    ciphertext: row.get(0)?,
                    iv: row.get(1)?,
                    auth_tag: row.get(2)?,
                })
            },
        );

        match result {
            Ok(encrypted) => {
                let plaintext = self
                    .cipher
                    .open(&encrypted)
                    .map_err(|e| SessionError::Crypto(e.to_string()))?;
                let session: Session = serde_json::from_slice(&plaintext)
                    .map_err(|e| SessionError::Serialization(e.to_string()))?;
                Ok(Some(session))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Storage(e.to_string())),
        }
    }

    /// Encrypts and writes the durable record.
    fn persist_durable(&self, session: &Session) -> Result<(), SessionError> {
        let plaintext = serde_json::to_vec(session)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        let encrypted = self
            .cipher
            .seal(&plaintext)
            .map_err(|e| SessionError::Crypto(e.to_string()))?;

        self.db
            .connection()
            .execute(
                "INSERT OR REPLACE INTO session (id, ciphertext, iv, auth_tag, updated_at) \
                 VALUES ('current', ?1, ?2, ?3, ?4)",
                params![encrypted.ciphertext, encrypted.iv, encrypted.auth_tag, now_ms()],
            )
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete_durable(&self) -> Result<(), SessionError> {
        self.db
            .connection()
            .execute("DELETE FROM session", [])
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Current UNIX timestamp in milliseconds.
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
