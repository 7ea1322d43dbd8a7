//! Correlation identifiers for subscribe frames
//!
//! Each subscribe frame carries a fresh identifier; the server echoes it in
//! the matching notification. Identifiers are version-4 UUIDs drawn from the
//! operating system's CSPRNG so that concurrently outstanding subscriptions
//! cannot collide.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Builder;

/// Opaque token linking a subscribe frame to its delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random identifier.
    ///
    /// 16 bytes from `OsRng`, version nibble forced to 4 and variant bits
    /// to RFC 4122, rendered as lowercase 8-4-4-4-12 hex.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        let uuid = Builder::from_random_bytes(bytes).into_uuid();
        Self(uuid.hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
