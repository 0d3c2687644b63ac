//! Domain layer types for the mailwatch engine.
//!
//! This module contains the entities the engine owns: monitored messages,
//! reminders, provider profiles, and the time ranges used by the window
//! policy.

mod message;
mod provider;
mod reminder;
mod time_range;
mod types;

pub use message::{IncomingEmail, MonitoredMessage, Summary};
pub use provider::{ProviderProfile, SkipReason};
pub use reminder::{Reminder, ReminderPatch, TaskDraft, DEFAULT_TASK_DESCRIPTION};
pub use time_range::TimeRange;
pub use types::{MessageId, ReminderId};
