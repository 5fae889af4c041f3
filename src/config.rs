//! Configuration for Stashed.
//!
//! Four values cover every context: the web app origin (login page and the
//! only trusted sender of session handoffs), the API base URL and anon key
//! for the remote collaborators, and the extension's own id (so the web
//! app's callback knows where to post the session back).

use std::env;

use crate::types::errors::ConfigError;

/// Development-only origins the session bridge also accepts.
#[cfg(feature = "dev-origins")]
const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "https://localhost:3000"];

/// Runtime configuration shared by every context.
#[derive(Debug, Clone)]
pub struct Config {
    /// Origin of the companion web app, e.g. `https://stashed.app`.
    pub web_app_origin: String,
    /// Base URL of the remote store / auth provider.
    pub api_url: String,
    /// Public API key sent with every remote call.
    pub api_key: String,
    /// This extension install's id.
    pub extension_id: String,
}

impl Config {
    pub fn new(
        web_app_origin: impl Into<String>,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        extension_id: impl Into<String>,
    ) -> Self {
        Self {
            web_app_origin: trim_trailing_slash(web_app_origin.into()),
            api_url: trim_trailing_slash(api_url.into()),
            api_key: api_key.into(),
            extension_id: extension_id.into(),
        }
    }

    /// Builds configuration from the environment.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingVar` if any required variable is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(
            require_var("STASHED_WEB_APP_URL")?,
            require_var("STASHED_API_URL")?,
            require_var("STASHED_API_KEY")?,
            require_var("STASHED_EXTENSION_ID")?,
        ))
    }

    /// Origins the session bridge accepts handoff messages from.
    ///
    /// The configured web app origin, plus localhost origins in development
    /// builds. Reject-by-default: everything else is dropped.
    pub fn allowed_origins(&self) -> Vec<String> {
        #[allow(unused_mut)]
        let mut origins = vec![self.web_app_origin.clone()];
        #[cfg(feature = "dev-origins")]
        for dev in DEV_ORIGINS {
            if !origins.iter().any(|o| o == dev) {
                origins.push(dev.to_string());
            }
        }
        origins
    }

    /// The login page a context navigates to when re-authentication is
    /// needed. Carries the extension id so the callback knows where to
    /// post the session back.
    pub fn login_url(&self) -> String {
        format!(
            "{}/login?extension_id={}",
            self.web_app_origin, self.extension_id
        )
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}
