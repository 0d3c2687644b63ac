//! Mail source trait definition.
//!
//! This module defines the [`MailSource`] trait which abstracts over the
//! mailbox the engine monitors. The engine only needs to list unread
//! messages, mark them read and send replies; connection management and
//! authentication belong to the implementation.

use async_trait::async_trait;

use crate::domain::{IncomingEmail, MessageId};

/// Result type alias for mail source operations.
pub type Result<T> = std::result::Result<T, MailError>;

/// Errors that can occur during mail source operations.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested message was not found.
    #[error("message not found: {0}")]
    NotFound(MessageId),

    /// Provider-specific error.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Trait for the mailbox collaborator.
///
/// # Example
///
/// ```ignore
/// use mailwatch::providers::email::MailSource;
///
/// async fn newest(source: &dyn MailSource) -> Result<()> {
///     for email in source.fetch_unread(20).await? {
///         println!("{}: {}", email.sender, email.subject);
///     }
///     Ok(())
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetches up to `limit` unread messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Connection`] or [`MailError::Authentication`] when
    /// the mailbox cannot be reached; the check cycle treats either as a
    /// failed cycle.
    async fn fetch_unread(&self, limit: usize) -> Result<Vec<IncomingEmail>>;

    /// Marks a message as read in the mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::NotFound`] if the message does not exist.
    async fn mark_read(&self, id: &MessageId) -> Result<()>;

    /// Sends `body` as a reply to the message.
    async fn send_reply(&self, id: &MessageId, body: &str) -> Result<()>;
}
