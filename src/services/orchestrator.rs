//! Poll orchestrator.
//!
//! Runs one check cycle: window policy, meeting gate, mail fetch, dedupe,
//! summarization, then a pending-count report to the dispatcher. The store
//! lock is only held for bookkeeping, never across a network call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::{CheckCycleConfig, ConfigError};
use crate::domain::MessageId;
use crate::providers::email::{MailError, MailSource};
use crate::services::dispatcher::{NotificationDispatcher, Visibility};
use crate::services::meeting_gate::MeetingGate;
use crate::services::provider_chain::ProviderChain;
use crate::services::reminder_store::SharedStore;
use crate::services::window_policy::{is_eligible, ReasonCode};
use crate::services::Clock;

/// Errors that abort a check cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to fetch unread mail: {0}")]
    Mail(#[from] MailError),
}

/// Counts gathered during a completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages returned by the mail source.
    pub fetched: usize,
    /// Messages seen for the first time.
    pub created: usize,
    pub summarized: usize,
    pub summaries_unavailable: usize,
    pub pending_count: usize,
    pub reminders_due: usize,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The window policy rejected the cycle before any I/O.
    Ineligible(ReasonCode),
    /// The user is in a meeting; the next cycle should follow `free_at`.
    InMeeting { free_at: Option<DateTime<Utc>> },
    Completed(CycleReport),
}

/// Result of evaluating pending messages and due reminders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub pending_count: usize,
    pub reminders_due: usize,
    pub suppressed: bool,
}

/// Coordinates a single check cycle across the collaborators.
pub struct PollOrchestrator {
    config: RwLock<CheckCycleConfig>,
    clock: Arc<dyn Clock>,
    mail: Arc<dyn MailSource>,
    gate: MeetingGate,
    chain: Arc<ProviderChain>,
    store: SharedStore,
    dispatcher: Arc<NotificationDispatcher>,
}

impl PollOrchestrator {
    pub fn new(
        config: CheckCycleConfig,
        clock: Arc<dyn Clock>,
        mail: Arc<dyn MailSource>,
        gate: MeetingGate,
        chain: Arc<ProviderChain>,
        store: SharedStore,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            clock,
            mail,
            gate,
            chain,
            store,
            dispatcher,
        }
    }

    pub async fn config(&self) -> CheckCycleConfig {
        self.config.read().await.clone()
    }

    /// Replaces the cycle configuration after validating it.
    pub async fn update_config(&self, config: CheckCycleConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.write().await = config;
        Ok(())
    }

    /// Runs one check cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::Mail`] if unread mail cannot be fetched; nothing
    /// after the fetch runs in that case.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let config = self.config().await;
        let now = self.clock.now();

        let eligibility = is_eligible(&config, self.clock.wall_time(now));
        if !eligibility.eligible {
            tracing::info!(reason = %eligibility.reason, "Skipping check cycle");
            return Ok(CycleOutcome::Ineligible(eligibility.reason));
        }

        let busy = self.gate.check_meeting(config.skip_during_meetings).await;
        if busy.busy {
            tracing::info!(free_at = ?busy.free_at, "In a meeting, deferring check cycle");
            return Ok(CycleOutcome::InMeeting {
                free_at: busy.free_at,
            });
        }

        let emails = self
            .mail
            .fetch_unread(config.max_messages_per_check)
            .await?;

        let created: Vec<(MessageId, String)> = {
            let mut store = self.store.lock().await;
            emails
                .iter()
                .filter(|email| store.track(email))
                .map(|email| (email.id.clone(), email.summary_input()))
                .collect()
        };
        tracing::debug!(
            fetched = emails.len(),
            created = created.len(),
            "Tracked unread messages"
        );

        let mut report = CycleReport {
            fetched: emails.len(),
            created: created.len(),
            ..CycleReport::default()
        };

        for (id, input) in created {
            let summary = self.chain.summarize(&input).await.into_summary();
            if summary.is_available() {
                report.summarized += 1;
            } else {
                report.summaries_unavailable += 1;
            }
            if let Err(e) = self.store.lock().await.set_summary(&id, summary) {
                tracing::warn!(message_id = %id, error = %e, "Failed to store summary");
            }
        }

        let evaluation = self.evaluate(true).await;
        report.pending_count = evaluation.pending_count;
        report.reminders_due = evaluation.reminders_due;

        tracing::info!(
            fetched = report.fetched,
            created = report.created,
            summarized = report.summarized,
            unavailable = report.summaries_unavailable,
            pending = report.pending_count,
            reminders_due = report.reminders_due,
            "Check cycle completed"
        );
        Ok(CycleOutcome::Completed(report))
    }

    /// Re-evaluates pending messages and due reminders outside a cycle,
    /// e.g. after a UI command. Outside the window a hidden popup stays
    /// hidden and a visible one only updates its count.
    pub async fn refresh(&self) -> Evaluation {
        let config = self.config().await;
        let now = self.clock.now();
        let eligible = is_eligible(&config, self.clock.wall_time(now)).eligible;
        self.evaluate(eligible).await
    }

    async fn evaluate(&self, window_open: bool) -> Evaluation {
        let now = self.clock.now();
        let (pending_count, suppressed, due) = {
            let mut store = self.store.lock().await;
            let suppressed = store.is_suppressed(now);
            let due = if window_open {
                store.take_due_reminders(now)
            } else {
                Vec::new()
            };
            (store.pending_count(now), suppressed, due)
        };

        let visibility = Visibility::from_window(window_open, suppressed);
        let reminders_due = due.len();
        self.dispatcher.report_pending(pending_count, visibility).await;
        for reminder in due {
            tracing::info!(reminder_id = %reminder.id, "Reminder due");
            self.dispatcher.reminder_due(reminder, visibility).await;
        }

        Evaluation {
            pending_count,
            reminders_due,
            suppressed,
        }
    }
}
