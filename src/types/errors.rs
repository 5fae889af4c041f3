use std::fmt;

// === SessionError ===

/// Errors from session cache, persistence, and refresh.
#[derive(Debug)]
pub enum SessionError {
    /// Refresh was requested but no session is cached at all.
    NoRefreshToken,
    /// The refresh token was rejected; the session has been cleared and the
    /// user must re-authenticate.
    Expired,
    /// Durable storage operation failed.
    Storage(String),
    /// Encrypting or decrypting the stored session failed.
    Crypto(String),
    /// Failed to serialize or deserialize the session record.
    Serialization(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoRefreshToken => write!(f, "No refresh token available"),
            SessionError::Expired => write!(f, "Session expired; re-authentication required"),
            SessionError::Storage(msg) => write!(f, "Session storage error: {}", msg),
            SessionError::Crypto(msg) => write!(f, "Session crypto error: {}", msg),
            SessionError::Serialization(msg) => {
                write!(f, "Session serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SessionError {}

// === CryptoError ===

/// Errors from the token cipher.
#[derive(Debug)]
pub enum CryptoError {
    /// Failed to derive the encryption key.
    KeyDerivation(String),
    /// Encryption operation failed.
    Encryption(String),
    /// Decryption operation failed.
    Decryption(String),
    /// Failed to generate random bytes.
    RandomGeneration(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::KeyDerivation(msg) => write!(f, "Key derivation failed: {}", msg),
            CryptoError::Encryption(msg) => write!(f, "Encryption failed: {}", msg),
            CryptoError::Decryption(msg) => write!(f, "Decryption failed: {}", msg),
            CryptoError::RandomGeneration(msg) => {
                write!(f, "Random generation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// === RemoteError ===

/// Errors from the remote store collaborator.
#[derive(Debug)]
pub enum RemoteError {
    /// The store rejected the access token (HTTP 401).
    Unauthorized,
    /// A uniqueness constraint was violated, e.g. a duplicate tag name from
    /// a concurrent create. Callers decide whether this is fatal.
    Conflict(String),
    /// The store returned a non-auth, non-conflict error status.
    Http { status: u16, message: String },
    /// The request never produced a response.
    Transport(String),
    /// A row could not be encoded or decoded.
    Serialization(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Unauthorized => write!(f, "Remote store rejected the access token"),
            RemoteError::Conflict(msg) => write!(f, "Remote conflict: {}", msg),
            RemoteError::Http { status, message } => {
                write!(f, "Remote store error ({}): {}", status, message)
            }
            RemoteError::Transport(msg) => write!(f, "Remote transport error: {}", msg),
            RemoteError::Serialization(msg) => {
                write!(f, "Remote serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for RemoteError {}

// === AuthError ===

/// Errors from the remote auth collaborator.
#[derive(Debug)]
pub enum AuthError {
    /// The refresh token is expired or invalid.
    InvalidRefreshToken,
    /// The access token did not resolve to a user.
    InvalidAccessToken,
    /// The auth endpoint returned an unexpected error status.
    Http { status: u16, message: String },
    /// The request never produced a response.
    Transport(String),
    /// The auth response could not be decoded.
    Serialization(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidRefreshToken => write!(f, "Refresh token expired or invalid"),
            AuthError::InvalidAccessToken => write!(f, "Access token did not resolve to a user"),
            AuthError::Http { status, message } => {
                write!(f, "Auth endpoint error ({}): {}", status, message)
            }
            AuthError::Transport(msg) => write!(f, "Auth transport error: {}", msg),
            AuthError::Serialization(msg) => write!(f, "Auth serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

// === ReconcileError ===

/// Errors surfaced by the save/tag reconcilers.
#[derive(Debug)]
pub enum ReconcileError {
    /// No valid session; the UI boundary redirects to login.
    Unauthenticated,
    /// The remote store returned 401 mid-operation; the session has been
    /// cleared and the operation is not retried.
    Unauthorized,
    /// Session machinery failed (storage, crypto).
    Session(SessionError),
    /// Any other remote store failure; the operation is aborted and no
    /// partial state is assumed committed.
    RemoteFailure(String),
    /// A remote row did not match the expected record shape.
    InvalidRecord(String),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Unauthenticated => write!(f, "Not authenticated"),
            ReconcileError::Unauthorized => {
                write!(f, "Remote store rejected the session; re-authentication required")
            }
            ReconcileError::Session(e) => write!(f, "Session error: {}", e),
            ReconcileError::RemoteFailure(msg) => write!(f, "Remote store failure: {}", msg),
            ReconcileError::InvalidRecord(msg) => write!(f, "Invalid remote record: {}", msg),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<SessionError> for ReconcileError {
    fn from(e: SessionError) -> Self {
        ReconcileError::Session(e)
    }
}

// === ConfigError ===

/// Errors constructing configuration from the environment.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is missing or empty.
    MissingVar(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "Missing required environment variable: {}", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
