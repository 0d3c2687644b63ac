//! Engine settings and configuration types.
//!
//! Settings are persisted to `settings.json` in the user's config directory
//! (or XDG equivalent). Every section carries serde defaults, so a partial
//! file is merged over the built-in defaults when loaded.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TimeRange;

/// Errors raised while validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Check-cycle window policy.
    pub check: CheckCycleConfig,
    /// LLM providers, tried in ascending `priority`.
    pub providers: Vec<ProviderSettings>,
    /// Provider cool-down after rate limits and transient failures.
    pub backoff: BackoffSettings,
    /// Popup and snooze preferences.
    pub notifications: NotificationSettings,
    /// Calendar collaborator settings.
    pub calendar: CalendarSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check: CheckCycleConfig::default(),
            providers: vec![
                ProviderSettings::new("openai", ProviderKind::OpenAi, "gpt-4o-mini", 0),
                ProviderSettings::new(
                    "anthropic",
                    ProviderKind::Anthropic,
                    "claude-3-5-haiku-20241022",
                    1,
                ),
            ],
            backoff: BackoffSettings::default(),
            notifications: NotificationSettings::default(),
            calendar: CalendarSettings::default(),
        }
    }
}

impl Settings {
    /// Default location of the settings file, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "mailwatch", "mailwatch")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from `path`, writing the defaults there if the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            settings.save_to(path)?;
            tracing::info!(path = %path.display(), "Created default settings file");
            return Ok(settings);
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?;
        tracing::info!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Writes settings as pretty-printed JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        Ok(())
    }

    /// Checks every section, rejecting configurations the engine cannot run.
    pub fn validate(&self) -> ConfigResult<()> {
        self.check.validate()?;
        self.backoff.validate()?;
        self.notifications.validate()?;

        let mut names = HashSet::new();
        let mut priorities = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(invalid("provider name must not be empty"));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(invalid(format!("duplicate provider name: {}", provider.name)));
            }
            if !priorities.insert(provider.priority) {
                return Err(invalid(format!(
                    "duplicate provider priority {} ({})",
                    provider.priority, provider.name
                )));
            }
        }
        Ok(())
    }
}

/// Declarative policy deciding when a check cycle may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckCycleConfig {
    /// Minutes between scheduled cycles.
    pub interval_minutes: u32,
    /// Upper bound on messages fetched per cycle.
    pub max_messages_per_check: usize,
    /// Days on which cycles may run.
    pub active_days: Vec<Weekday>,
    /// Time of day during which cycles may run.
    pub active_hours: TimeRange,
    /// Sub-window, possibly wrapping midnight, during which cycles are suppressed.
    pub quiet_hours: Option<TimeRange>,
    /// Defer cycles while the calendar reports a meeting.
    pub skip_during_meetings: bool,
    /// Snooze length offered when the user picks no explicit duration.
    pub default_snooze_minutes: u32,
}

impl Default for CheckCycleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            max_messages_per_check: 20,
            active_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            active_hours: TimeRange::new(
                chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
                chrono::NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            ),
            quiet_hours: Some(TimeRange::new(
                chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
                chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            )),
            skip_during_meetings: true,
            default_snooze_minutes: 60,
        }
    }
}

impl CheckCycleConfig {
    /// Interval between scheduled cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_minutes == 0 {
            return Err(invalid("interval must be at least 1 minute"));
        }
        if self.max_messages_per_check == 0 {
            return Err(invalid("max messages per check must be positive"));
        }
        if self.active_days.is_empty() {
            return Err(invalid("at least one active day is required"));
        }
        if self.active_hours.is_empty() {
            return Err(invalid(format!(
                "active hours start and end are both {}",
                self.active_hours.start.format("%H:%M")
            )));
        }
        if let Some(quiet) = &self.quiet_hours {
            if quiet.is_empty() {
                return Err(invalid(format!(
                    "quiet hours start and end are both {}",
                    quiet.start.format("%H:%M")
                )));
            }
        }
        if self.default_snooze_minutes == 0 {
            return Err(invalid("default snooze must be at least 1 minute"));
        }
        Ok(())
    }
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// api.openai.com
    OpenAi,
    /// openrouter.ai (OpenAI-compatible)
    OpenRouter,
    /// api.anthropic.com
    Anthropic,
}

/// Configuration for a single LLM provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Unique provider name, also used to derive the keychain entry.
    pub name: String,
    pub kind: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Lower values are tried first.
    pub priority: u32,
    /// Custom API endpoint for compatible or self-hosted APIs.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Keychain identifier for the API key; defaults to `ai.api_key.<name>`.
    #[serde(default)]
    pub api_key_keychain_id: Option<String>,
    /// Character budget for input text; provider default when unset.
    #[serde(default)]
    pub input_budget: Option<usize>,
}

impl ProviderSettings {
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        model: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            model: model.into(),
            priority,
            base_url: None,
            api_key_keychain_id: None,
            input_budget: None,
        }
    }

    /// Keychain key holding this provider's API key.
    pub fn keychain_key(&self) -> String {
        self.api_key_keychain_id
            .clone()
            .unwrap_or_else(|| crate::storage::KeychainAccess::ai_api_key(&self.name))
    }
}

/// Exponential backoff applied to providers after rate limits or transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_secs: 30,
            max_delay_secs: 900,
        }
    }
}

impl BackoffSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_delay_secs == 0 {
            return Err(invalid("backoff base delay must be positive"));
        }
        if self.base_delay_secs > self.max_delay_secs {
            return Err(invalid("backoff base delay exceeds maximum delay"));
        }
        Ok(())
    }
}

/// Popup and snooze preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Seconds before a popup that was not kept open hides itself.
    pub auto_dismiss_secs: u64,
    /// Seconds after a meeting ends before the deferred cycle runs.
    pub meeting_buffer_secs: u64,
    /// Snooze durations, in minutes, offered to the user.
    pub snooze_options: Vec<u32>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            auto_dismiss_secs: 10,
            meeting_buffer_secs: 60,
            snooze_options: vec![15, 30, 60, 120, 240],
        }
    }
}

impl NotificationSettings {
    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_secs(self.auto_dismiss_secs)
    }

    pub fn meeting_buffer(&self) -> Duration {
        Duration::from_secs(self.meeting_buffer_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.auto_dismiss_secs == 0 {
            return Err(invalid("auto-dismiss countdown must be positive"));
        }
        if self.snooze_options.iter().any(|m| *m == 0) {
            return Err(invalid("snooze options must be at least 1 minute"));
        }
        Ok(())
    }
}

/// Calendar collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Upper bound on a single busy-status request.
    pub request_timeout_secs: u64,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

impl CalendarSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.check.interval(), Duration::from_secs(900));
        assert_eq!(settings.check.max_messages_per_check, 20);
        assert_eq!(settings.notifications.auto_dismiss(), Duration::from_secs(10));
        assert_eq!(settings.providers.len(), 2);
    }

    #[test]
    fn equal_active_hours_rejected() {
        let mut settings = Settings::default();
        settings.check.active_hours = TimeRange::from_hm((9, 0), (9, 0)).unwrap();

        let err = settings.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Validation("active hours start and end are both 09:00".to_string())
        );
    }

    #[test]
    fn equal_quiet_hours_rejected() {
        let mut check = CheckCycleConfig::default();
        check.quiet_hours = TimeRange::from_hm((12, 0), (12, 0));
        assert!(check.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut check = CheckCycleConfig::default();
        check.interval_minutes = 0;
        assert!(check.validate().is_err());
    }

    #[test]
    fn empty_active_days_rejected() {
        let mut check = CheckCycleConfig::default();
        check.active_days.clear();
        assert!(check.validate().is_err());
    }

    #[test]
    fn duplicate_provider_priority_rejected() {
        let mut settings = Settings::default();
        settings.providers[1].priority = settings.providers[0].priority;
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn duplicate_provider_name_rejected() {
        let mut settings = Settings::default();
        settings.providers[1].name = settings.providers[0].name.clone();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn backoff_base_above_max_rejected() {
        let backoff = BackoffSettings {
            base_delay_secs: 600,
            max_delay_secs: 60,
        };
        assert!(backoff.validate().is_err());
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let json = r#"{
            "check": {
                "interval_minutes": 5,
                "active_days": ["mon", "Sat"],
                "active_hours": {"start": "09:00", "end": "17:00"},
                "quiet_hours": null
            }
        }"#;

        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.check.interval_minutes, 5);
        assert_eq!(settings.check.active_days, vec![Weekday::Mon, Weekday::Sat]);
        assert_eq!(settings.check.quiet_hours, None);
        assert_eq!(settings.check.max_messages_per_check, 20);
        assert_eq!(settings.backoff, BackoffSettings::default());
        assert_eq!(settings.providers.len(), 2);
    }

    #[test]
    fn provider_kind_serialization() {
        let json = serde_json::to_string(&ProviderKind::OpenRouter).unwrap();
        assert_eq!(json, "\"open_router\"");

        let kind: ProviderKind = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(kind, ProviderKind::Anthropic);
    }

    #[test]
    fn keychain_key_defaults_to_provider_name() {
        let mut provider = ProviderSettings::new("openai", ProviderKind::OpenAi, "gpt-4o-mini", 0);
        assert_eq!(provider.keychain_key(), "ai.api_key.openai");

        provider.api_key_keychain_id = Some("work.openai".to_string());
        assert_eq!(provider.keychain_key(), "work.openai");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.check.interval_minutes = 30;
        settings.notifications.snooze_options = vec![10, 20];
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_creates_missing_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, Settings::default());
        assert!(path.exists());
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings"));
    }
}
