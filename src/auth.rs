//! Basic authentication for the queue server

use base64::Engine;

use crate::config::Config;
use crate::error::{QueueError, Result};

/// Username/password pair sent as an HTTP basic-auth header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials configured for this client, if any.
    ///
    /// A username without a password (or the reverse) is a config error.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => Ok(Some(Self::new(username, password))),
            (None, None) => Ok(None),
            _ => Err(QueueError::Config(
                "username and password must be given together".into(),
            )),
        }
    }

    /// `Authorization` header value: `Basic base64(username:password)`.
    pub fn header_value(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
