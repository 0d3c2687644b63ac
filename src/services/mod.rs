//! Monitoring services layer.
//!
//! These services hold the engine's behavior: when to check, what to ask the
//! AI providers, what to remember, and when to show the popup.
//!
//! # Architecture
//!
//! ```text
//! Application Layer (MonitorEngine, UiCommand)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (Providers, Keychain)
//! ```
//!
//! # Services Overview
//!
//! - [`PollOrchestrator`]: Runs one check cycle end to end
//! - [`Scheduler`]: Drives cycles on an interval and around meetings
//! - [`ProviderChain`]: Priority-ordered AI failover with backoff
//! - [`ReminderStore`]: Tracked messages, reminders and snooze state
//! - [`NotificationDispatcher`]: Popup state machine and UI event fan-out

mod clock;
pub mod dispatcher;
pub mod meeting_gate;
pub mod orchestrator;
pub mod provider_chain;
pub mod reminder_store;
pub mod scheduler;
pub mod truncation;
pub mod window_policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{
    NotificationDispatcher, NotificationState, PopupState, UiEvent, Visibility,
};
pub use meeting_gate::MeetingGate;
pub use orchestrator::{CycleError, CycleOutcome, CycleReport, Evaluation, PollOrchestrator};
pub use provider_chain::{
    BackoffPolicy, ChainOutcome, ConnectionStatus, ProviderChain, ReplyResult, SummaryResult,
    TaskResult,
};
pub use reminder_store::{ReminderStore, SharedStore, StoreError};
pub use scheduler::{next_cycle_delay, Scheduler};
pub use truncation::truncate_for_budget;
pub use window_policy::{is_eligible, Eligibility, ReasonCode};
