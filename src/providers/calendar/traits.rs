//! Calendar collaborator traits and event types.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Result type alias for calendar operations.
pub type Result<T> = std::result::Result<T, CalendarError>;

/// Errors that can occur while querying a calendar.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("calendar request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Provider-specific error.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Availability of the user right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusyStatus {
    pub busy: bool,
    /// When the current meeting ends, if known.
    pub free_at: Option<DateTime<Utc>>,
}

impl BusyStatus {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn busy_until(free_at: DateTime<Utc>) -> Self {
        Self {
            busy: true,
            free_at: Some(free_at),
        }
    }
}

/// How an event shows on the user's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Busy,
    Free,
    Tentative,
    OutOfOffice,
}

impl EventStatus {
    /// Whether the event blocks the user's time.
    pub fn blocks_time(self) -> bool {
        matches!(self, EventStatus::Busy | EventStatus::OutOfOffice)
    }
}

/// A single calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: EventStatus,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            start,
            end,
            status: EventStatus::Busy,
        }
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }
}

/// The calendar collaborator consulted by the meeting gate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Reports whether the user is in a meeting right now.
    async fn is_busy_now(&self) -> Result<BusyStatus>;
}

/// A calendar backend able to list upcoming events.
#[async_trait]
pub trait CalendarEventSource: Send + Sync {
    /// Events overlapping the next `horizon`, in any order.
    async fn upcoming_events(&self, horizon: Duration) -> Result<Vec<CalendarEvent>>;
}
