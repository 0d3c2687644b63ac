//! Configuration and settings management.
//!
//! This module provides the engine's settings types and their persistence.
//! Settings are stored in the user's config directory as JSON and validated
//! before the scheduler starts.

mod settings;

pub use settings::{
    BackoffSettings, CalendarSettings, CheckCycleConfig, ConfigError, ConfigResult,
    NotificationSettings, ProviderKind, ProviderSettings, Settings,
};
