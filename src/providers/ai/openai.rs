//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, and other compatible endpoints.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::traits::{
    CompletionRequest, CompletionResponse, LlmError, LlmResult, Message, Role, SummaryProvider,
};

/// Default base URL for OpenAI API.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL for OpenRouter's OpenAI-compatible API.
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Characters of message text sent per request unless overridden.
pub const DEFAULT_INPUT_BUDGET: usize = 8_000;

/// OpenAI API request format.
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    code: Option<String>,
}

/// Provider for OpenAI-compatible APIs.
///
/// Works with:
/// - OpenAI API (api.openai.com)
/// - OpenRouter (openrouter.ai)
/// - Any other OpenAI-compatible endpoint
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    input_budget: usize,
}

impl OpenAiCompatibleProvider {
    /// Creates a new provider for OpenAI's API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::build("openai", OPENAI_BASE_URL, Some(api_key.into()), model.into())
    }

    /// Creates a new provider for OpenRouter.
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::build(
            "openrouter",
            OPENROUTER_BASE_URL,
            Some(api_key.into()),
            model.into(),
        )
    }

    /// Creates a new provider for a custom endpoint.
    pub fn custom(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self::build(
            "openai-compatible",
            base_url.trim_end_matches('/'),
            api_key,
            model.into(),
        )
    }

    fn build(name: &str, base_url: &str, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key,
            model,
            input_budget: DEFAULT_INPUT_BUDGET,
        }
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

    /// Overrides the HTTP client (useful for custom timeouts or proxies).
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

        if let Some(ref api_key) = self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAiRequest {
        let mut messages: Vec<OpenAiMessage> = Vec::new();

        if let Some(ref system) = request.system_prompt {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.extend(request.messages.iter().map(OpenAiMessage::from));

        OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(request.temperature),
            max_tokens: request.max_tokens,
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

        match response.json::<OpenAiError>().await {
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

    fn classify_error(status: u16, detail: OpenAiErrorDetail) -> LlmError {
        if matches!(status, 401 | 403) || detail.code.as_deref() == Some("invalid_api_key") {
            return LlmError::AuthenticationError(detail.message);
        }
        LlmError::ApiError {
            status,
            message: detail.message,
        }
    }

    /// Performs a completion request and returns the generated text.
    pub async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Self::extract_text(api_response).map(|text| CompletionResponse { text })
    }

    fn extract_text(response: OpenAiResponse) -> LlmResult<String> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl SummaryProvider for OpenAiCompatibleProvider {
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
