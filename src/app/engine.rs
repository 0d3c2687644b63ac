//! The monitoring engine facade.
//!
//! [`MonitorEngine`] wires the scheduler, orchestrator, store, provider chain
//! and dispatcher together and exposes the commands a UI host issues.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::{CheckCycleConfig, ConfigError, ProviderKind, ProviderSettings, Settings};
use crate::domain::{
    MessageId, MonitoredMessage, ProviderProfile, Reminder, ReminderId, ReminderPatch, TaskDraft,
};
use crate::providers::ai::{AnthropicProvider, OpenAiCompatibleProvider, SummaryProvider};
use crate::providers::calendar::CalendarSource;
use crate::providers::email::{MailError, MailSource};
use crate::services::{
    BackoffPolicy, ChainOutcome, Clock, ConnectionStatus, CycleError, CycleOutcome, MeetingGate,
    NotificationDispatcher, NotificationState, PollOrchestrator, ProviderChain, ReminderStore,
    Scheduler, SharedStore, StoreError, UiEvent,
};
use crate::storage::CredentialStore;

/// Errors surfaced by engine commands.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("mail collaborator failed: {0}")]
    Mail(#[from] MailError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("no AI provider available")]
    NoProviderAvailable,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything the engine talks to outside its own state.
pub struct Collaborators {
    pub mail: Arc<dyn MailSource>,
    pub calendar: Option<Arc<dyn CalendarSource>>,
    /// Provider profiles paired with their implementations, in any order.
    pub providers: Vec<(ProviderProfile, Arc<dyn SummaryProvider>)>,
    pub clock: Arc<dyn Clock>,
}

/// Builds the provider list from settings, looking up each API key.
///
/// A provider whose key is missing, or whose key lookup fails, is still
/// listed but marked as lacking credentials so the chain skips it.
pub async fn configured_providers(
    settings: &[ProviderSettings],
    credentials: &dyn CredentialStore,
) -> Vec<(ProviderProfile, Arc<dyn SummaryProvider>)> {
    let mut providers = Vec::with_capacity(settings.len());
    for provider in settings {
        let key = provider.keychain_key();
        let api_key = match credentials.retrieve(&key).await {
            Ok(api_key) => api_key,
            Err(e) => {
                tracing::warn!(provider = %provider.name, error = %e, "Failed to read API key");
                None
            }
        };
        if api_key.is_none() {
            tracing::info!(provider = %provider.name, "No API key configured, provider disabled");
        }

        let profile = ProviderProfile::new(&provider.name, provider.priority, api_key.is_some());
        providers.push((profile, build_provider(provider, api_key.unwrap_or_default())));
    }
    providers
}

fn build_provider(settings: &ProviderSettings, api_key: String) -> Arc<dyn SummaryProvider> {
    match settings.kind {
        ProviderKind::OpenAi | ProviderKind::OpenRouter => {
            let provider = match (&settings.base_url, settings.kind) {
                (Some(base_url), _) => {
                    OpenAiCompatibleProvider::custom(base_url, Some(api_key), &settings.model)
                }
                (None, ProviderKind::OpenRouter) => {
                    OpenAiCompatibleProvider::openrouter(api_key, &settings.model)
                }
                (None, _) => OpenAiCompatibleProvider::openai(api_key, &settings.model),
            };
            let provider = provider.with_name(&settings.name);
            Arc::new(match settings.input_budget {
                Some(budget) => provider.with_input_budget(budget),
                None => provider,
            })
        }
        ProviderKind::Anthropic => {
            let provider = AnthropicProvider::new(api_key, &settings.model).with_name(&settings.name);
            Arc::new(match settings.input_budget {
                Some(budget) => provider.with_input_budget(budget),
                None => provider,
            })
        }
    }
}

/// The engine a host process embeds.
///
/// Commands may arrive while a cycle runs; they go through the same store
/// lock, so a snooze issued mid-cycle is seen by the next evaluation.
pub struct MonitorEngine {
    clock: Arc<dyn Clock>,
    mail: Arc<dyn MailSource>,
    store: SharedStore,
    chain: Arc<ProviderChain>,
    dispatcher: Arc<NotificationDispatcher>,
    orchestrator: Arc<PollOrchestrator>,
    scheduler: Scheduler,
}

impl MonitorEngine {
    /// Validates `settings` and wires the engine. Nothing runs until
    /// [`MonitorEngine::start`].
    pub fn new(settings: &Settings, collaborators: Collaborators) -> Result<Self> {
        settings.validate()?;
        let Collaborators {
            mail,
            calendar,
            providers,
            clock,
        } = collaborators;

        let chain = Arc::new(ProviderChain::new(
            providers,
            BackoffPolicy::from(&settings.backoff),
            clock.clone(),
        )?);
        let store = ReminderStore::shared();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            settings.notifications.auto_dismiss(),
        ));
        let gate = MeetingGate::new(calendar, settings.calendar.request_timeout());
        let orchestrator = Arc::new(PollOrchestrator::new(
            settings.check.clone(),
            clock.clone(),
            mail.clone(),
            gate,
            chain.clone(),
            store.clone(),
            dispatcher.clone(),
        ));
        let scheduler = Scheduler::new(
            orchestrator.clone(),
            dispatcher.clone(),
            clock.clone(),
            settings.notifications.meeting_buffer(),
        );

        Ok(Self {
            clock,
            mail,
            store,
            chain,
            dispatcher,
            orchestrator,
            scheduler,
        })
    }

    // --- Lifecycle ---

    /// Starts (or restarts) the scheduler with `config`.
    pub async fn start(&self, config: CheckCycleConfig) -> Result<()> {
        self.scheduler.start(config).await?;
        Ok(())
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.is_running().await
    }

    pub fn trigger_immediate_check(&self) {
        self.scheduler.trigger_immediate_check();
    }

    /// Runs a cycle on the caller's task. `Ok(None)` if one is already in
    /// flight.
    pub async fn run_cycle_now(&self) -> Result<Option<CycleOutcome>> {
        match self.scheduler.run_cycle_now().await {
            Some(result) => Ok(Some(result?)),
            None => Ok(None),
        }
    }

    pub async fn config(&self) -> CheckCycleConfig {
        self.orchestrator.config().await
    }

    // --- UI events ---

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.dispatcher.subscribe()
    }

    /// Expires the popup countdown if its deadline has passed.
    pub async fn tick(&self) {
        self.dispatcher.tick().await;
    }

    pub async fn notification_state(&self) -> NotificationState {
        self.dispatcher.state().await
    }

    pub async fn dismiss_popup(&self) {
        self.dispatcher.dismiss().await;
    }

    /// Returns false if the popup was not counting down.
    pub async fn keep_popup_open(&self) -> bool {
        self.dispatcher.keep_open().await
    }

    // --- Messages ---

    pub async fn messages(&self) -> Vec<MonitoredMessage> {
        self.store.lock().await.messages()
    }

    pub async fn message(&self, id: &MessageId) -> Option<MonitoredMessage> {
        self.store.lock().await.message(id).cloned()
    }

    pub async fn pending_messages(&self) -> Vec<MonitoredMessage> {
        self.store.lock().await.pending_messages(self.clock.now())
    }

    pub async fn pending_count(&self) -> usize {
        self.store.lock().await.pending_count(self.clock.now())
    }

    /// Hides a message until `now + minutes`.
    pub async fn snooze_message(&self, id: &MessageId, minutes: i64) -> Result<DateTime<Utc>> {
        let until = self
            .store
            .lock()
            .await
            .snooze_message(id, minutes, self.clock.now())?;
        tracing::info!(message_id = %id, %until, "Message snoozed");
        self.orchestrator.refresh().await;
        Ok(until)
    }

    /// Snoozes a message for the configured default duration.
    pub async fn snooze_message_default(&self, id: &MessageId) -> Result<DateTime<Utc>> {
        let minutes = self.orchestrator.config().await.default_snooze_minutes;
        self.snooze_message(id, i64::from(minutes)).await
    }

    /// Suppresses every popup and reminder until `now + minutes`, hiding the
    /// popup if it is showing.
    pub async fn global_snooze(&self, minutes: i64) -> Result<DateTime<Utc>> {
        let until = self
            .store
            .lock()
            .await
            .global_snooze(minutes, self.clock.now())?;
        tracing::info!(%until, "Global snooze set");
        self.orchestrator.refresh().await;
        Ok(until)
    }

    pub async fn clear_global_snooze(&self) {
        self.store.lock().await.clear_global_snooze();
        self.orchestrator.refresh().await;
    }

    /// Marks a message read at the mail source, then locally.
    pub async fn mark_read(&self, id: &MessageId) -> Result<()> {
        self.ensure_tracked(id).await?;
        self.mail.mark_read(id).await?;
        self.store.lock().await.mark_read(id)?;
        self.orchestrator.refresh().await;
        Ok(())
    }

    /// Retires a message without touching the mail source.
    pub async fn assess(&self, id: &MessageId) -> Result<()> {
        self.store.lock().await.mark_assessed(id)?;
        self.orchestrator.refresh().await;
        Ok(())
    }

    /// Asks the provider chain for a reply draft and stores it on the message.
    pub async fn draft_reply(&self, id: &MessageId, instructions: &str) -> Result<String> {
        let input = self
            .store
            .lock()
            .await
            .message(id)
            .map(MonitoredMessage::prompt_input)
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;

        match self.chain.draft_reply(&input, instructions).await {
            ChainOutcome::Completed { provider, output } => {
                tracing::debug!(message_id = %id, provider = %provider, "Reply drafted");
                self.store.lock().await.set_reply_draft(id, output.clone())?;
                Ok(output)
            }
            ChainOutcome::NoProviderAvailable => Err(EngineError::NoProviderAvailable),
        }
    }

    /// Sends a reply through the mail source; the message is then read and
    /// assessed.
    pub async fn send_reply(&self, id: &MessageId, text: &str) -> Result<()> {
        self.ensure_tracked(id).await?;
        self.mail.send_reply(id, text).await?;
        {
            let mut store = self.store.lock().await;
            store.mark_read(id)?;
            store.mark_assessed(id)?;
        }
        tracing::info!(message_id = %id, "Reply sent");
        self.orchestrator.refresh().await;
        Ok(())
    }

    /// Turns a message into a follow-up reminder due after the default
    /// snooze. Without a working provider the task is titled from the
    /// subject instead.
    pub async fn create_task(&self, id: &MessageId) -> Result<Reminder> {
        let (input, subject) = self
            .store
            .lock()
            .await
            .message(id)
            .map(|m| (m.prompt_input(), m.subject.clone()))
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;

        let draft = match self.chain.generate_task(&input).await {
            ChainOutcome::Completed { provider, output } => {
                tracing::debug!(message_id = %id, provider = %provider, "Task generated");
                TaskDraft::parse(&output, &subject)
            }
            ChainOutcome::NoProviderAvailable => {
                tracing::warn!(message_id = %id, "No provider for task, using subject");
                TaskDraft::fallback(&subject)
            }
        };

        let minutes = self.orchestrator.config().await.default_snooze_minutes;
        let due_at = self.clock.now() + chrono::Duration::minutes(i64::from(minutes));
        let reminder = draft.into_reminder(due_at).for_message(id.clone());
        self.store.lock().await.create(reminder.clone())?;
        tracing::info!(message_id = %id, reminder_id = %reminder.id, %due_at, "Task created");
        Ok(reminder)
    }

    async fn ensure_tracked(&self, id: &MessageId) -> Result<()> {
        if self.store.lock().await.contains_message(id) {
            Ok(())
        } else {
            Err(StoreError::MessageNotFound(id.clone()).into())
        }
    }

    // --- Reminders ---

    pub async fn create_reminder(&self, reminder: Reminder) -> Result<ReminderId> {
        Ok(self.store.lock().await.create(reminder)?)
    }

    pub async fn update_reminder(&self, id: &ReminderId, patch: &ReminderPatch) -> Result<Reminder> {
        Ok(self.store.lock().await.update(id, patch)?)
    }

    pub async fn delete_reminder(&self, id: &ReminderId) -> Result<Reminder> {
        Ok(self.store.lock().await.delete(id)?)
    }

    pub async fn reminder(&self, id: &ReminderId) -> Option<Reminder> {
        self.store.lock().await.get(id).cloned()
    }

    pub async fn reminders(&self, active_only: bool) -> Vec<Reminder> {
        self.store.lock().await.list(active_only)
    }

    pub async fn reminders_for_message(&self, id: &MessageId, active_only: bool) -> Vec<Reminder> {
        self.store.lock().await.reminders_for_message(id, active_only)
    }

    pub async fn snooze_reminder(&self, id: &ReminderId, minutes: i64) -> Result<Reminder> {
        Ok(self
            .store
            .lock()
            .await
            .snooze_reminder(id, minutes, self.clock.now())?)
    }

    pub async fn complete_reminder(&self, id: &ReminderId) -> Result<()> {
        Ok(self.store.lock().await.complete(id)?)
    }

    // --- Providers ---

    pub async fn provider_profiles(&self) -> Vec<ProviderProfile> {
        self.chain.profiles().await
    }

    /// Sends a connection check to every configured provider.
    pub async fn check_providers(&self) -> Vec<ConnectionStatus> {
        self.chain.check_connections().await
    }
}
