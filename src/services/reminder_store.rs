//! Monitored message, reminder and snooze store.
//!
//! The store is a plain in-memory structure; callers share it as a
//! [`SharedStore`] so every mutation goes through one `tokio::sync::Mutex`.
//! All time-dependent queries take `now` explicitly and re-evaluate snooze
//! state lazily, so no timers are needed for snoozes to expire.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{
    IncomingEmail, MessageId, MonitoredMessage, Reminder, ReminderId, ReminderPatch, Summary,
};

/// Errors that can occur during store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(ReminderId),

    #[error("Reminder already exists: {0}")]
    DuplicateReminder(ReminderId),

    #[error("Snooze duration must be positive, got {0} minutes")]
    InvalidMinutes(i64),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store handle shared between the orchestrator and UI commands.
pub type SharedStore = Arc<Mutex<ReminderStore>>;

fn snooze_deadline(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    if minutes <= 0 {
        return Err(StoreError::InvalidMinutes(minutes));
    }
    Duration::try_minutes(minutes)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or(StoreError::InvalidMinutes(minutes))
}

/// In-memory state for monitored messages, reminders and global snooze.
#[derive(Debug, Default)]
pub struct ReminderStore {
    messages: HashMap<MessageId, MonitoredMessage>,
    /// Message ids in the order they were first tracked.
    order: Vec<MessageId>,
    reminders: HashMap<ReminderId, Reminder>,
    global_suppress_until: Option<DateTime<Utc>>,
}

impl ReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new store for sharing.
    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    // --- Messages ---

    /// Starts tracking `email`, returning `false` if its id is already known.
    pub fn track(&mut self, email: &IncomingEmail) -> bool {
        if self.messages.contains_key(&email.id) {
            return false;
        }
        self.order.push(email.id.clone());
        self.messages
            .insert(email.id.clone(), MonitoredMessage::from_incoming(email));
        true
    }

    pub fn message(&self, id: &MessageId) -> Option<&MonitoredMessage> {
        self.messages.get(id)
    }

    pub fn contains_message(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    /// All monitored messages in tracking order.
    pub fn messages(&self) -> Vec<MonitoredMessage> {
        self.order
            .iter()
            .filter_map(|id| self.messages.get(id))
            .cloned()
            .collect()
    }

    fn message_mut(&mut self, id: &MessageId) -> Result<&mut MonitoredMessage> {
        self.messages
            .get_mut(id)
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))
    }

    pub fn set_summary(&mut self, id: &MessageId, summary: Summary) -> Result<()> {
        self.message_mut(id)?.summary = Some(summary);
        Ok(())
    }

    pub fn set_reply_draft(&mut self, id: &MessageId, draft: impl Into<String>) -> Result<()> {
        self.message_mut(id)?.reply_draft = Some(draft.into());
        Ok(())
    }

    pub fn mark_read(&mut self, id: &MessageId) -> Result<()> {
        self.message_mut(id)?.is_read = true;
        Ok(())
    }

    pub fn mark_assessed(&mut self, id: &MessageId) -> Result<()> {
        self.message_mut(id)?.is_assessed = true;
        Ok(())
    }

    /// Hides a message from dispatch until `now + minutes`.
    pub fn snooze_message(
        &mut self,
        id: &MessageId,
        minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let until = snooze_deadline(now, minutes)?;
        self.message_mut(id)?.snoozed_until = Some(until);
        Ok(until)
    }

    /// Messages that are unread, unassessed and not snoozed, in tracking
    /// order. Empty while a global snooze is active.
    pub fn pending_messages(&self, now: DateTime<Utc>) -> Vec<MonitoredMessage> {
        if self.is_suppressed(now) {
            return Vec::new();
        }
        self.order
            .iter()
            .filter_map(|id| self.messages.get(id))
            .filter(|m| m.is_pending_at(now))
            .cloned()
            .collect()
    }

    pub fn pending_count(&self, now: DateTime<Utc>) -> usize {
        if self.is_suppressed(now) {
            return 0;
        }
        self.messages
            .values()
            .filter(|m| m.is_pending_at(now))
            .count()
    }

    /// Messages not yet marked read, regardless of snooze state.
    pub fn unread_count(&self) -> usize {
        self.messages.values().filter(|m| !m.is_read).count()
    }

    // --- Global snooze ---

    /// Suppresses all reminders and popups until `now + minutes`.
    pub fn global_snooze(&mut self, minutes: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let until = snooze_deadline(now, minutes)?;
        self.global_suppress_until = Some(until);
        Ok(until)
    }

    pub fn clear_global_snooze(&mut self) {
        self.global_suppress_until = None;
    }

    pub fn global_suppress_until(&self) -> Option<DateTime<Utc>> {
        self.global_suppress_until
    }

    pub fn is_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.global_suppress_until.is_some_and(|until| now < until)
    }

    // --- Reminders ---

    /// Adds a reminder.
    ///
    /// # Errors
    ///
    /// Fails if the id is already used or the reminder points at an unknown
    /// message.
    pub fn create(&mut self, reminder: Reminder) -> Result<ReminderId> {
        if self.reminders.contains_key(&reminder.id) {
            return Err(StoreError::DuplicateReminder(reminder.id));
        }
        if let Some(message_id) = &reminder.message_id {
            if !self.messages.contains_key(message_id) {
                return Err(StoreError::MessageNotFound(message_id.clone()));
            }
        }
        let id = reminder.id.clone();
        self.reminders.insert(id.clone(), reminder);
        Ok(id)
    }

    pub fn update(&mut self, id: &ReminderId, patch: &ReminderPatch) -> Result<Reminder> {
        if let Some(Some(message_id)) = &patch.message_id {
            if !self.messages.contains_key(message_id) {
                return Err(StoreError::MessageNotFound(message_id.clone()));
            }
        }
        let reminder = self.reminder_mut(id)?;
        patch.apply_to(reminder);
        Ok(reminder.clone())
    }

    pub fn delete(&mut self, id: &ReminderId) -> Result<Reminder> {
        self.reminders
            .remove(id)
            .ok_or_else(|| StoreError::ReminderNotFound(id.clone()))
    }

    pub fn get(&self, id: &ReminderId) -> Option<&Reminder> {
        self.reminders.get(id)
    }

    fn reminder_mut(&mut self, id: &ReminderId) -> Result<&mut Reminder> {
        self.reminders
            .get_mut(id)
            .ok_or_else(|| StoreError::ReminderNotFound(id.clone()))
    }

    /// Reminders ordered by due time.
    pub fn list(&self, active_only: bool) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self
            .reminders
            .values()
            .filter(|r| !active_only || r.active)
            .cloned()
            .collect();
        reminders.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
        reminders
    }

    pub fn reminders_for_message(&self, message_id: &MessageId, active_only: bool) -> Vec<Reminder> {
        self.list(active_only)
            .into_iter()
            .filter(|r| r.message_id.as_ref() == Some(message_id))
            .collect()
    }

    /// Pushes a reminder to `now + minutes` and re-arms it.
    pub fn snooze_reminder(
        &mut self,
        id: &ReminderId,
        minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        let due_at = snooze_deadline(now, minutes)?;
        let reminder = self.reminder_mut(id)?;
        reminder.due_at = due_at;
        reminder.snooze_count = reminder.snooze_count.saturating_add(1);
        reminder.active = true;
        Ok(reminder.clone())
    }

    pub fn complete(&mut self, id: &ReminderId) -> Result<()> {
        self.reminder_mut(id)?.active = false;
        Ok(())
    }

    /// Reminders that should be shown at `now`, ordered by due time.
    ///
    /// Nothing is due while a global snooze is active. A reminder tied to a
    /// snoozed message is withheld until the message snooze lapses.
    pub fn due_reminders(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        if self.is_suppressed(now) {
            return Vec::new();
        }
        self.list(true)
            .into_iter()
            .filter(|r| r.is_due_at(now))
            .filter(|r| {
                r.message_id
                    .as_ref()
                    .and_then(|id| self.messages.get(id))
                    .map_or(true, |m| !m.is_snoozed_at(now))
            })
            .collect()
    }

    /// Returns the due reminders and marks them fired.
    pub fn take_due_reminders(&mut self, now: DateTime<Utc>) -> Vec<Reminder> {
        let due = self.due_reminders(now);
        for reminder in &due {
            if let Some(stored) = self.reminders.get_mut(&reminder.id) {
                stored.active = false;
            }
        }
        due
    }
}
