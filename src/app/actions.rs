//! Commands issued by the UI.
//!
//! Hosts that talk to the engine over a message channel deserialize these
//! and hand them to [`MonitorEngine::apply`].

use serde::{Deserialize, Serialize};

use super::engine::{MonitorEngine, Result};
use crate::domain::MessageId;

/// A user action from the popup or tray menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiCommand {
    /// Snooze one message; `minutes` defaults to the configured snooze.
    SnoozeMessage {
        id: MessageId,
        #[serde(default)]
        minutes: Option<i64>,
    },
    GlobalSnooze { minutes: i64 },
    ClearGlobalSnooze,
    MarkRead { id: MessageId },
    /// Turn a message into a follow-up reminder.
    CreateTask { id: MessageId },
    DismissPopup,
    KeepPopupOpen,
    CheckNow,
}

impl MonitorEngine {
    /// Applies a UI command.
    pub async fn apply(&self, command: UiCommand) -> Result<()> {
        tracing::debug!(command = ?command, "Applying UI command");
        match command {
            UiCommand::SnoozeMessage { id, minutes: Some(minutes) } => {
                self.snooze_message(&id, minutes).await?;
            }
            UiCommand::SnoozeMessage { id, minutes: None } => {
                self.snooze_message_default(&id).await?;
            }
            UiCommand::GlobalSnooze { minutes } => {
                self.global_snooze(minutes).await?;
            }
            UiCommand::ClearGlobalSnooze => self.clear_global_snooze().await,
            UiCommand::MarkRead { id } => self.mark_read(&id).await?,
            UiCommand::CreateTask { id } => {
                self.create_task(&id).await?;
            }
            UiCommand::DismissPopup => self.dismiss_popup().await,
            UiCommand::KeepPopupOpen => {
                self.keep_popup_open().await;
            }
            UiCommand::CheckNow => self.trigger_immediate_check(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_json() {
        let snooze: UiCommand =
            serde_json::from_str(r#"{"type":"snooze_message","id":"m-7"}"#).unwrap();
        assert_eq!(
            snooze,
            UiCommand::SnoozeMessage {
                id: MessageId::from("m-7"),
                minutes: None
            }
        );

        let global: UiCommand =
            serde_json::from_str(r#"{"type":"global_snooze","minutes":30}"#).unwrap();
        assert_eq!(global, UiCommand::GlobalSnooze { minutes: 30 });

        let task: UiCommand =
            serde_json::from_str(r#"{"type":"create_task","id":"m-9"}"#).unwrap();
        assert_eq!(
            task,
            UiCommand::CreateTask {
                id: MessageId::from("m-9")
            }
        );

        let keep: UiCommand = serde_json::from_str(r#"{"type":"keep_popup_open"}"#).unwrap();
        assert_eq!(keep, UiCommand::KeepPopupOpen);
    }

    #[test]
    fn unknown_command_rejected() {
        assert!(serde_json::from_str::<UiCommand>(r#"{"type":"archive"}"#).is_err());
    }
}
