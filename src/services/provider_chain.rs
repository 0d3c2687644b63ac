//! Provider fallback chain.
//!
//! Tries LLM providers in priority order for each request, skipping those
//! without credentials, disabled for the session, or backing off. Failures
//! are classified to update each provider's profile; the chain itself never
//! returns an error. [`ProviderChain::check_connections`] contacts every
//! provider directly and leaves the profiles untouched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::{BackoffSettings, ConfigError};
use crate::domain::{ProviderProfile, Summary};
use crate::providers::ai::{FailureKind, LlmError, SummaryProvider};
use crate::services::truncation::truncate_for_budget;
use crate::services::Clock;

/// Exponential backoff for rate-limited or failing providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffSettings::default())
    }
}

impl From<&BackoffSettings> for BackoffPolicy {
    fn from(settings: &BackoffSettings) -> Self {
        Self {
            base_delay: Duration::from_secs(settings.base_delay_secs),
            max_delay: Duration::from_secs(settings.max_delay_secs),
        }
    }
}

impl BackoffPolicy {
    /// `min(base * 2^failure_count, max)`.
    pub fn delay_for_attempt(&self, failure_count: u32) -> Duration {
        2u32.checked_pow(failure_count)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Like [`delay_for_attempt`](Self::delay_for_attempt) but never shorter
    /// than a server-provided `retry_after`, still capped at the maximum.
    pub fn delay_with_hint(&self, failure_count: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay_for_attempt(failure_count);
        retry_after
            .map_or(delay, |hint| delay.max(hint))
            .min(self.max_delay)
    }
}

/// Outcome of a request routed through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// A provider produced output.
    Completed { provider: String, output: String },
    /// Every provider was skipped or failed.
    NoProviderAvailable,
}

/// Result of [`ProviderChain::summarize`].
pub type SummaryResult = ChainOutcome;

/// Result of [`ProviderChain::draft_reply`].
pub type ReplyResult = ChainOutcome;

/// Result of [`ProviderChain::generate_task`].
pub type TaskResult = ChainOutcome;

/// Whether one provider answered a connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub provider: String,
    pub connected: bool,
    /// Why the check failed; `None` when connected.
    pub error: Option<String>,
}

impl ChainOutcome {
    pub fn output(&self) -> Option<&str> {
        match self {
            ChainOutcome::Completed { output, .. } => Some(output),
            ChainOutcome::NoProviderAvailable => None,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        match self {
            ChainOutcome::Completed { provider, .. } => Some(provider),
            ChainOutcome::NoProviderAvailable => None,
        }
    }

    /// Converts a summarization outcome into the value stored on a message.
    pub fn into_summary(self) -> Summary {
        match self {
            ChainOutcome::Completed { output, .. } => Summary::Available(output),
            ChainOutcome::NoProviderAvailable => Summary::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Summarize,
    DraftReply { instructions: &'a str },
    GenerateTask,
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Operation::Summarize => "summarize",
            Operation::DraftReply { .. } => "draft_reply",
            Operation::GenerateTask => "generate_task",
        }
    }
}

/// Ordered set of providers with their runtime profiles.
pub struct ProviderChain {
    /// Sorted by priority, index-aligned with `providers`.
    profiles: Mutex<Vec<ProviderProfile>>,
    providers: Vec<Arc<dyn SummaryProvider>>,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
}

impl ProviderChain {
    /// Builds a chain, ordering entries by ascending priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if two profiles share a priority.
    pub fn new(
        mut entries: Vec<(ProviderProfile, Arc<dyn SummaryProvider>)>,
        backoff: BackoffPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for (profile, _) in &entries {
            if !seen.insert(profile.priority) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider priority {} ({})",
                    profile.priority, profile.name
                )));
            }
        }

        entries.sort_by_key(|(profile, _)| profile.priority);
        let (profiles, providers) = entries.into_iter().unzip();

        Ok(Self {
            profiles: Mutex::new(profiles),
            providers,
            backoff,
            clock,
        })
    }

    /// Snapshot of provider profiles in priority order.
    pub async fn profiles(&self) -> Vec<ProviderProfile> {
        self.profiles.lock().await.clone()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Summarizes `text` with the first provider that succeeds.
    pub async fn summarize(&self, text: &str) -> SummaryResult {
        self.run(text, Operation::Summarize).await
    }

    /// Drafts a reply to `text` with the first provider that succeeds.
    pub async fn draft_reply(&self, text: &str, instructions: &str) -> ReplyResult {
        self.run(text, Operation::DraftReply { instructions }).await
    }

    /// Asks the first provider that succeeds for a follow-up task.
    pub async fn generate_task(&self, text: &str) -> TaskResult {
        self.run(text, Operation::GenerateTask).await
    }

    /// Checks each provider in priority order. Providers without credentials
    /// are reported without a request; backoff and session state are ignored.
    pub async fn check_connections(&self) -> Vec<ConnectionStatus> {
        let profiles = self.profiles().await;
        let mut statuses = Vec::with_capacity(profiles.len());

        for (profile, provider) in profiles.into_iter().zip(&self.providers) {
            let status = if !profile.credential_present {
                ConnectionStatus {
                    provider: profile.name,
                    connected: false,
                    error: Some("no API key configured".to_string()),
                }
            } else {
                match provider.test_connection().await {
                    Ok(()) => ConnectionStatus {
                        provider: profile.name,
                        connected: true,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!(provider = %profile.name, error = %e, "Connection check failed");
                        ConnectionStatus {
                            provider: profile.name,
                            connected: false,
                            error: Some(e.to_string()),
                        }
                    }
                }
            };
            statuses.push(status);
        }
        statuses
    }

    async fn run(&self, text: &str, operation: Operation<'_>) -> ChainOutcome {
        for (idx, provider) in self.providers.iter().enumerate() {
            let now = self.clock.now();
            let name = {
                let profiles = self.profiles.lock().await;
                let profile = &profiles[idx];
                if let Some(reason) = profile.skip_reason(now) {
                    tracing::debug!(
                        provider = %profile.name,
                        reason = ?reason,
                        operation = operation.name(),
                        "Skipping provider"
                    );
                    continue;
                }
                profile.name.clone()
            };

            let input = truncate_for_budget(text, provider.input_budget());
            let result = match operation {
                Operation::Summarize => provider.summarize(&input).await,
                Operation::DraftReply { instructions } => {
                    provider.draft_reply(&input, instructions).await
                }
                Operation::GenerateTask => provider.generate_task(&input).await,
            };

            match result {
                Ok(output) => {
                    self.record_success(idx).await;
                    tracing::debug!(provider = %name, operation = operation.name(), "Provider succeeded");
                    return ChainOutcome::Completed {
                        provider: name,
                        output,
                    };
                }
                Err(err) => self.record_failure(idx, &err).await,
            }
        }

        tracing::warn!(operation = operation.name(), "No provider available");
        ChainOutcome::NoProviderAvailable
    }

    async fn record_success(&self, idx: usize) {
        let mut profiles = self.profiles.lock().await;
        let profile = &mut profiles[idx];
        profile.backoff_until = None;
        profile.failure_count = 0;
    }

    async fn record_failure(&self, idx: usize, err: &LlmError) {
        let now = self.clock.now();
        let mut profiles = self.profiles.lock().await;
        let profile = &mut profiles[idx];

        match err.failure_kind() {
            FailureKind::Auth => {
                profile.disabled_for_session = true;
                tracing::warn!(
                    provider = %profile.name,
                    error = %err,
                    "Authentication failed, provider disabled for this session"
                );
            }
            kind @ (FailureKind::RateLimit | FailureKind::Transient) => {
                let delay = self
                    .backoff
                    .delay_with_hint(profile.failure_count, err.retry_after());
                let until = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                profile.backoff_until = Some(until);
                profile.failure_count = profile.failure_count.saturating_add(1);
                tracing::warn!(
                    provider = %profile.name,
                    kind = ?kind,
                    failure_count = profile.failure_count,
                    backoff_until = %until,
                    error = %err,
                    "Provider backing off"
                );
            }
            FailureKind::Unknown => {
                tracing::warn!(provider = %profile.name, error = %err, "Provider call failed");
            }
        }
    }
}
