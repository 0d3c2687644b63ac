//! In-memory mailbox.
//!
//! Holds messages delivered by the host application (or a test) and serves
//! them through [`MailSource`]. Read state and sent replies are tracked so
//! callers can observe what the engine did.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{MailError, MailSource, Result};
use crate::domain::{IncomingEmail, MessageId};

#[derive(Default)]
struct MailboxState {
    messages: Vec<IncomingEmail>,
    read: HashSet<MessageId>,
    sent: Vec<(MessageId, String)>,
    fail_next_fetch: Option<String>,
}

/// A [`MailSource`] backed by a vector of messages.
#[derive(Default)]
pub struct InMemoryMailbox {
    state: Mutex<MailboxState>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message to the mailbox as unread.
    pub async fn deliver(&self, email: IncomingEmail) {
        let mut state = self.state.lock().await;
        state.read.remove(&email.id);
        state.messages.retain(|m| m.id != email.id);
        state.messages.push(email);
    }

    /// Makes the next `fetch_unread` call fail with a connection error.
    pub async fn fail_next_fetch(&self, reason: impl Into<String>) {
        self.state.lock().await.fail_next_fetch = Some(reason.into());
    }

    pub async fn is_read(&self, id: &MessageId) -> bool {
        self.state.lock().await.read.contains(id)
    }

    /// Replies sent so far, in order.
    pub async fn sent_replies(&self) -> Vec<(MessageId, String)> {
        self.state.lock().await.sent.clone()
    }
}

#[async_trait]
impl MailSource for InMemoryMailbox {
    async fn fetch_unread(&self, limit: usize) -> Result<Vec<IncomingEmail>> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.fail_next_fetch.take() {
            return Err(MailError::Connection(reason));
        }

        let mut unread: Vec<IncomingEmail> = state
            .messages
            .iter()
            .filter(|m| !state.read.contains(&m.id))
            .cloned()
            .collect();
        unread.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        unread.truncate(limit);
        Ok(unread)
    }

    async fn mark_read(&self, id: &MessageId) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.messages.iter().any(|m| &m.id == id) {
            return Err(MailError::NotFound(id.clone()));
        }
        state.read.insert(id.clone());
        Ok(())
    }

    async fn send_reply(&self, id: &MessageId, body: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.messages.iter().any(|m| &m.id == id) {
            return Err(MailError::NotFound(id.clone()));
        }
        state.sent.push((id.clone(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn email(id: &str, minutes_ago: i64) -> IncomingEmail {
        let base = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        IncomingEmail {
            id: MessageId::from(id),
            sender: "alice@example.com".to_string(),
            subject: format!("Message {id}"),
            received_at: base - Duration::minutes(minutes_ago),
            body_preview: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn fetch_returns_newest_unread_first() {
        let mailbox = InMemoryMailbox::new();
        mailbox.deliver(email("old", 30)).await;
        mailbox.deliver(email("new", 5)).await;
        mailbox.deliver(email("mid", 10)).await;

        let fetched = mailbox.fetch_unread(2).await.unwrap();
        let ids: Vec<_> = fetched.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn read_messages_are_not_fetched() {
        let mailbox = InMemoryMailbox::new();
        mailbox.deliver(email("a", 1)).await;
        mailbox.mark_read(&MessageId::from("a")).await.unwrap();

        assert!(mailbox.fetch_unread(10).await.unwrap().is_empty());
        assert!(mailbox.is_read(&MessageId::from("a")).await);
    }

    #[tokio::test]
    async fn unknown_message_is_not_found() {
        let mailbox = InMemoryMailbox::new();
        let result = mailbox.mark_read(&MessageId::from("missing")).await;
        assert!(matches!(result, Err(MailError::NotFound(_))));
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let mailbox = InMemoryMailbox::new();
        mailbox.fail_next_fetch("offline").await;

        assert!(matches!(
            mailbox.fetch_unread(10).await,
            Err(MailError::Connection(_))
        ));
        assert!(mailbox.fetch_unread(10).await.is_ok());
    }

    #[tokio::test]
    async fn replies_are_recorded() {
        let mailbox = InMemoryMailbox::new();
        mailbox.deliver(email("a", 1)).await;
        mailbox
            .send_reply(&MessageId::from("a"), "Thanks!")
            .await
            .unwrap();

        assert_eq!(
            mailbox.sent_replies().await,
            vec![(MessageId::from("a"), "Thanks!".to_string())]
        );
    }
}
