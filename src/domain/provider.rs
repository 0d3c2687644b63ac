//! Provider profiles tracked by the fallback chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a provider was passed over for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No API key is configured.
    MissingCredential,
    /// An authentication failure disabled the provider for this process.
    DisabledForSession,
    /// The provider is cooling down after a rate limit or transient failure.
    BackingOff(DateTime<Utc>),
}

/// Runtime bookkeeping for one LLM provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    /// Lower values are tried first.
    pub priority: u32,
    pub credential_present: bool,
    pub backoff_until: Option<DateTime<Utc>>,
    pub disabled_for_session: bool,
    /// Consecutive rate-limit or transient failures since the last success.
    pub failure_count: u32,
}

impl ProviderProfile {
    pub fn new(name: impl Into<String>, priority: u32, credential_present: bool) -> Self {
        Self {
            name: name.into(),
            priority,
            credential_present,
            backoff_until: None,
            disabled_for_session: false,
            failure_count: 0,
        }
    }

    /// Returns the reason this provider must be skipped at `now`, if any.
    pub fn skip_reason(&self, now: DateTime<Utc>) -> Option<SkipReason> {
        if !self.credential_present {
            return Some(SkipReason::MissingCredential);
        }
        if self.disabled_for_session {
            return Some(SkipReason::DisabledForSession);
        }
        match self.backoff_until {
            Some(until) if now < until => Some(SkipReason::BackingOff(until)),
            _ => None,
        }
    }

    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.skip_reason(now).is_none()
    }
}
