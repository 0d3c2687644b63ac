//! Anthropic Claude API provider implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::traits::{
    CompletionRequest, CompletionResponse, LlmError, LlmResult, Message, Role, SummaryProvider,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Characters of message text sent per request unless overridden.
pub const DEFAULT_INPUT_BUDGET: usize = 12_000;

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

impl From<&Message> for AnthropicMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::Assistant => "assistant".to_string(),
                // System messages travel in the top-level `system` field
                Role::User | Role::System => "user".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

/// Anthropic API error response.
#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Provider for Anthropic's Claude API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    name: String,
    api_key: String,
    model: String,
    input_budget: usize,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: "anthropic".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            input_budget: DEFAULT_INPUT_BUDGET,
        }
    }

    /// Creates a provider with Claude 3.5 Haiku (fast and cost-effective).
    pub fn claude_haiku(api_key: impl Into<String>) -> Self {
        Self::new(api_key, "claude-3-5-haiku-20241022")
    }

    /// Overrides the name reported to the fallback chain.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the input character budget.
    pub fn with_input_budget(mut self, budget: usize) -> Self {
        self.input_budget = budget;
        self
    }

    /// Overrides the HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers
    }

    fn build_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let messages: Vec<AnthropicMessage> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(AnthropicMessage::from)
            .collect();

        let system_prompt = {
            let system_messages: Vec<&str> = request
                .messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .collect();

            match (&request.system_prompt, system_messages.is_empty()) {
                (Some(prompt), true) => Some(prompt.clone()),
                (Some(prompt), false) => {
                    Some(format!("{}\n\n{}", prompt, system_messages.join("\n\n")))
                }
                (None, false) => Some(system_messages.join("\n\n")),
                (None, true) => None,
            }
        };

        AnthropicRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens.unwrap_or(1024),
            system: system_prompt,
            temperature: Some(request.temperature),
        }
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> LlmError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());

            return LlmError::RateLimited {
                retry_after_secs: retry_after,
            };
        }

        match response.json::<AnthropicError>().await {
            Ok(error) => Self::classify_error(status, error.error),
            Err(_) if matches!(status, 401 | 403) => {
                LlmError::AuthenticationError(format!("HTTP {}", status))
            }
            Err(_) => LlmError::ApiError {
                status,
                message: format!("HTTP {}", status),
            },
        }
    }

    fn classify_error(status: u16, detail: AnthropicErrorDetail) -> LlmError {
        match detail.error_type.as_str() {
            "authentication_error" | "permission_error" => {
                LlmError::AuthenticationError(detail.message)
            }
            "rate_limit_error" => LlmError::RateLimited {
                retry_after_secs: None,
            },
            _ if matches!(status, 401 | 403) => LlmError::AuthenticationError(detail.message),
            _ => LlmError::ApiError {
                status,
                message: detail.message,
            },
        }
    }

    /// Performs a completion request and returns the generated text.
    pub async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .headers(self.build_headers())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(CompletionResponse {
            text: Self::extract_text(api_response),
        })
    }

    fn extract_text(response: AnthropicResponse) -> String {
        response
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string()
    }
}

#[async_trait]
impl SummaryProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_budget(&self) -> usize {
        self.input_budget
    }

    async fn summarize(&self, text: &str) -> LlmResult<String> {
        let response = self.complete(&prompts::summary_request(text)).await?;
        Ok(response.text)
    }

    async fn draft_reply(&self, text: &str, instructions: &str) -> LlmResult<String> {
        let response = self
            .complete(&prompts::reply_request(text, instructions))
            .await?;
        Ok(response.text)
    }

    async fn generate_task(&self, text: &str) -> LlmResult<String> {
        let response = self.complete(&prompts::task_request(text)).await?;
        Ok(response.text)
    }

    async fn test_connection(&self) -> LlmResult<()> {
        self.complete(&prompts::connection_check_request()).await?;
        Ok(())
    }
}
