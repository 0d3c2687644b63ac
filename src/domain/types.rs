//! Core identifier types for domain entities.
//!
//! These newtype wrappers keep message and reminder identifiers from being
//! mixed up with each other or with free-form strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a monitored message.
///
/// Always equal to the identifier assigned by the source mail transport, so
/// the same underlying message maps to the same id on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReminderId(pub String);

impl ReminderId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ReminderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReminderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
