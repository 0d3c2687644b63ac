//! Messages as seen by the monitoring engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// An unread message as reported by the mail collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEmail {
    /// Transport-assigned identifier.
    pub id: MessageId,
    /// Display name or address of the sender.
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// When the transport received the message.
    pub received_at: DateTime<Utc>,
    /// Plain-text body preview handed to the summarizer.
    pub body_preview: String,
}

impl IncomingEmail {
    /// Text submitted to the provider chain for summarization.
    pub fn summary_input(&self) -> String {
        prompt_text(&self.sender, &self.subject, &self.body_preview)
    }
}

fn prompt_text(sender: &str, subject: &str, body: &str) -> String {
    format!("From: {sender}\nSubject: {subject}\n\n{body}")
}

/// Outcome of summarizing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum Summary {
    /// A provider produced a summary.
    Available(String),
    /// Every provider was skipped or failed.
    Unavailable,
}

impl Summary {
    /// Text shown to the user.
    pub fn display_text(&self) -> &str {
        match self {
            Summary::Available(text) => text,
            Summary::Unavailable => "Summary unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Summary::Available(_))
    }
}

/// A message tracked by the engine.
///
/// Rows are created once per transport id on first sighting and are never
/// deleted; they are retired by marking them assessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredMessage {
    pub id: MessageId,
    pub sender: String,
    pub subject: String,
    pub body_preview: String,
    pub received_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_assessed: bool,
    pub snoozed_until: Option<DateTime<Utc>>,
    /// `None` until summarization has been attempted.
    pub summary: Option<Summary>,
    pub reply_draft: Option<String>,
}

impl MonitoredMessage {
    /// Creates a row for a message seen for the first time.
    pub fn from_incoming(email: &IncomingEmail) -> Self {
        Self {
            id: email.id.clone(),
            sender: email.sender.clone(),
            subject: email.subject.clone(),
            body_preview: email.body_preview.clone(),
            received_at: email.received_at,
            is_read: false,
            is_assessed: false,
            snoozed_until: None,
            summary: None,
            reply_draft: None,
        }
    }

    /// Same text the summarizer saw, used as the basis for reply drafts.
    pub fn prompt_input(&self) -> String {
        prompt_text(&self.sender, &self.subject, &self.body_preview)
    }

    /// Whether a snooze is still in effect at `now`.
    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| now < until)
    }

    /// Whether the message still wants the user's attention at `now`.
    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_read && !self.is_assessed && !self.is_snoozed_at(now)
    }
}
