//! Mail source abstraction.
//!
//! This module contains the [`MailSource`] trait the check cycle reads from,
//! plus [`InMemoryMailbox`], a mailbox the host application feeds directly.
//!
//! # Example
//!
//! ```ignore
//! use mailwatch::providers::email::{InMemoryMailbox, MailSource};
//!
//! async fn count_unread(source: &dyn MailSource) -> usize {
//!     source.fetch_unread(20).await.map(|m| m.len()).unwrap_or(0)
//! }
//! ```

mod memory;
mod traits;

pub use memory::InMemoryMailbox;
#[cfg(test)]
pub use traits::MockMailSource;
pub use traits::{MailError, MailSource, Result};
