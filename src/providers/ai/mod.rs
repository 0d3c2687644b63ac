//! AI/LLM provider implementations.
//!
//! This module provides a unified interface for summarizing messages,
//! drafting replies and proposing follow-up tasks with various LLM providers.
//!
//! # Supported Providers
//!
//! - **OpenAI-compatible**: OpenAI, OpenRouter, and other compatible endpoints
//! - **Anthropic**: Claude models via Anthropic's API
//!
//! # Example
//!
//! ```rust,no_run
//! use mailwatch::providers::ai::{AnthropicProvider, OpenAiCompatibleProvider, SummaryProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let openai = OpenAiCompatibleProvider::openai("sk-...", "gpt-4o-mini");
//! let anthropic = AnthropicProvider::claude_haiku("sk-ant-...");
//!
//! // Both providers implement the same trait
//! let summary = openai.summarize("From: alice@example.com\nSubject: Q3\n\nReport?").await?;
//! let reply = anthropic.draft_reply("Can we meet Friday?", "Accept").await?;
//! println!("{summary}\n{reply}");
//! # Ok(())
//! # }
//! ```

mod anthropic;
mod openai;
mod prompts;
mod traits;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatibleProvider;
pub use prompts::{
    connection_check_request, reply_request, summary_request, task_request,
    DEFAULT_REPLY_INSTRUCTIONS,
};
#[cfg(test)]
pub use traits::MockSummaryProvider;
pub use traits::{
    CompletionRequest, CompletionResponse, FailureKind, LlmError, LlmResult, Message, Role,
    SummaryProvider,
};
