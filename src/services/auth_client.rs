//! Remote auth collaborator for Stashed.
//!
//! Two operations cover everything the engine needs from the auth
//! provider: exchange a refresh token for a new session, and resolve the
//! identity behind an access token. [`HttpAuthClient`] speaks the
//! provider's HTTP endpoints; [`StubAuthClient`] is the deterministic
//! double used by tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::errors::AuthError;
use crate::types::session::{AuthUser, Session};

/// Contract with the remote auth provider.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Exchanges a refresh token for a new session. The returned
    /// `expires_at` is absolute: now plus the provider-declared lifetime.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    /// Resolves the authenticated user for an access token.
    async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// === HTTP implementation ===

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Auth client against the provider's token/user endpoints.
pub struct HttpAuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAuthClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 400 || status == 401 {
            return Err(AuthError::InvalidRefreshToken);
        }
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Http { status, message });
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Serialization(e.to_string()))?;
        Ok(Session {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: now_ms() + body.expires_in * 1000,
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 401 {
            return Err(AuthError::InvalidAccessToken);
        }
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Http { status, message });
        }

        let body: UserResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Serialization(e.to_string()))?;
        Ok(AuthUser {
            id: body.id,
            email: body.email,
        })
    }
}

// === Test double ===

/// Deterministic auth client for tests and local development.
///
/// Counts refresh calls so lazy-refresh behavior can be asserted, and can
/// be flipped to reject refreshes to exercise the expiry path.
pub struct StubAuthClient {
    user: AuthUser,
    refresh_ok: Mutex<bool>,
    refresh_calls: AtomicUsize,
    session_lifetime_ms: i64,
}

impl StubAuthClient {
    pub fn new(user_id: &str) -> Self {
        Self {
            user: AuthUser {
                id: user_id.to_string(),
                email: None,
            },
            refresh_ok: Mutex::new(true),
            refresh_calls: AtomicUsize::new(0),
            session_lifetime_ms: 3_600_000,
        }
    }

    /// Makes subsequent refreshes fail with `InvalidRefreshToken`.
    pub fn reject_refreshes(&self) {
        *self.refresh_ok.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthClient for StubAuthClient {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !*self.refresh_ok.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(AuthError::InvalidRefreshToken);
        }
        Ok(Session {
            access_token: format!("access-after-{}", refresh_token),
            refresh_token: format!("next-{}", refresh_token),
            expires_at: now_ms() + self.session_lifetime_ms,
        })
    }

    async fn current_user(&self, _access_token: &str) -> Result<AuthUser, AuthError> {
        Ok(self.user.clone())
    }
}
