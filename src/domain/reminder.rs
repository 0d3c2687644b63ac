//! Reminder domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, ReminderId};

/// A user reminder, optionally tied to a monitored message.
///
/// Lifecycle: active, snoozed (due time pushed forward, `snooze_count`
/// incremented), active again once due, then completed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub message_id: Option<MessageId>,
    pub text: String,
    /// Longer description, e.g. from a generated follow-up task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub active: bool,
    pub snooze_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Creates an active reminder with a generated id.
    pub fn new(text: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            id: ReminderId::generate(),
            message_id: None,
            text: text.into(),
            notes: None,
            due_at,
            active: true,
            snooze_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Ties the reminder to a monitored message.
    pub fn for_message(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Whether the reminder should fire at `now`.
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.due_at <= now
    }
}

/// Description used when none could be generated.
pub const DEFAULT_TASK_DESCRIPTION: &str = "Review and respond to this email";

/// A follow-up task proposed for a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
}

impl TaskDraft {
    /// The task used when no provider could propose one.
    pub fn fallback(subject: &str) -> Self {
        Self {
            title: format!("Follow up: {subject}"),
            description: DEFAULT_TASK_DESCRIPTION.to_string(),
        }
    }

    /// Reads `Title:` and `Description:` lines from a provider response.
    /// Missing or blank fields fall back individually.
    pub fn parse(response: &str, subject: &str) -> Self {
        let mut draft = Self::fallback(subject);
        for line in response.lines().map(str::trim) {
            if let Some(title) = line.strip_prefix("Title:").map(str::trim) {
                if !title.is_empty() {
                    draft.title = title.to_string();
                }
            } else if let Some(description) = line.strip_prefix("Description:").map(str::trim) {
                if !description.is_empty() {
                    draft.description = description.to_string();
                }
            }
        }
        draft
    }

    /// Turns the task into a reminder due at `due_at`.
    pub fn into_reminder(self, due_at: DateTime<Utc>) -> Reminder {
        Reminder::new(self.title, due_at).with_notes(self.description)
    }
}

/// Partial update applied by `ReminderStore::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderPatch {
    pub text: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub active: Option<bool>,
    /// `Some(None)` detaches the reminder from its message.
    pub message_id: Option<Option<MessageId>>,
}

impl ReminderPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn message_id(mut self, message_id: Option<MessageId>) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch in place.
    pub fn apply_to(&self, reminder: &mut Reminder) {
        if let Some(text) = &self.text {
            reminder.text = text.clone();
        }
        if let Some(due_at) = self.due_at {
            reminder.due_at = due_at;
        }
        if let Some(active) = self.active {
            reminder.active = active;
        }
        if let Some(message_id) = &self.message_id {
            reminder.message_id = message_id.clone();
        }
    }
}
