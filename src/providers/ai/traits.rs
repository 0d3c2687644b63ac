//! Summary provider trait and supporting types.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Provider not available: {0}")]
    Unavailable(String),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// How the fallback chain should treat a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad or revoked credentials; the provider is disabled for the session.
    Auth,
    /// The provider asked us to slow down.
    RateLimit,
    /// Server errors, timeouts and connection failures.
    Transient,
    /// Anything else. The chain moves on without penalizing the provider.
    Unknown,
}

impl LlmError {
    /// Classifies the error for fallback bookkeeping.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            LlmError::AuthenticationError(_) => FailureKind::Auth,
            LlmError::ApiError { status, .. } if matches!(status, 401 | 403) => FailureKind::Auth,
            LlmError::RateLimited { .. } => FailureKind::RateLimit,
            LlmError::ApiError { status: 429, .. } => FailureKind::RateLimit,
            LlmError::ApiError { status, .. } if *status >= 500 => FailureKind::Transient,
            LlmError::HttpError(e) if e.is_timeout() || e.is_connect() => FailureKind::Transient,
            LlmError::HttpError(e) => match e.status() {
                Some(status) if status.is_server_error() => FailureKind::Transient,
                _ => FailureKind::Unknown,
            },
            LlmError::Unavailable(_) => FailureKind::Transient,
            _ => FailureKind::Unknown,
        }
    }

    /// Server-requested delay before the next attempt, if one was given.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request for a completion from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Optional system prompt to set context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Conversation messages.
    pub messages: Vec<Message>,

    /// Sampling temperature (0.0 to 2.0, lower is more deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            system_prompt: None,
            messages: Vec::new(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Text generated by a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub text: String,
}

/// An LLM backend able to summarize messages, draft replies and propose
/// follow-up tasks.
///
/// Implementations receive text already cut down to [`input_budget`]
/// characters by the caller.
///
/// [`input_budget`]: SummaryProvider::input_budget
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Returns the provider's name (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Maximum number of input characters this provider accepts.
    fn input_budget(&self) -> usize;

    /// Produces a short summary of `text`.
    async fn summarize(&self, text: &str) -> LlmResult<String>;

    /// Drafts a reply to `text` following the user's `instructions`.
    async fn draft_reply(&self, text: &str, instructions: &str) -> LlmResult<String>;

    /// Proposes a follow-up task for `text` as `Title:` and `Description:`
    /// lines.
    async fn generate_task(&self, text: &str) -> LlmResult<String>;

    /// Sends a minimal request to confirm the provider answers.
    async fn test_connection(&self) -> LlmResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let system = Message::system("You are helpful.");
        assert_eq!(system.role, Role::System);
        assert_eq!(system.content, "You are helpful.");

        let user = Message::user("Hello");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![Message::user("Test")])
            .with_system_prompt("Be helpful")
            .with_temperature(0.3)
            .with_max_tokens(150);

        assert_eq!(request.system_prompt, Some("Be helpful".to_string()));
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, Some(150));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_auth_classification() {
        let err = LlmError::AuthenticationError("bad key".to_string());
        assert_eq!(err.failure_kind(), FailureKind::Auth);

        let err = LlmError::ApiError {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Auth);
    }

    #[test]
    fn test_rate_limit_classification() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(45),
        };
        assert_eq!(err.failure_kind(), FailureKind::RateLimit);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(45)));

        let err = LlmError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Transient);
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_other_errors_are_unknown() {
        let err = LlmError::ApiError {
            status: 400,
            message: "bad request".to_string(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Unknown);

        let err = LlmError::InvalidResponse("no choices".to_string());
        assert_eq!(err.failure_kind(), FailureKind::Unknown);
    }
}
