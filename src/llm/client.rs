//! OpenAI-compatible chat completion client.

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default model when none is configured.
const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// CONTENTFORGE_API_BASE is not set.
    #[error("Missing API base: CONTENTFORGE_API_BASE environment variable not set")]
    MissingApiBase,

    /// The HTTP request failed.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The API returned a non-success status.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The API answered but the response carried no usable content.
    #[error("Empty response from model")]
    EmptyResponse,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user" or "assistant".
    pub role: String,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct ChatClient {
    api_base: String,
    api_key: Option<String>,
    model: String,
    http_client: Client,
}

impl ChatClient {
    /// Creates a client with explicit configuration.
    pub fn new(api_base: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .map_err(|e| LlmError::RequestFailed(e.to_string()))?,
        })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `CONTENTFORGE_API_BASE` (required), `CONTENTFORGE_API_KEY`
    /// (optional) and `CONTENTFORGE_MODEL` (optional).
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("CONTENTFORGE_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("CONTENTFORGE_API_KEY").ok();
        let model = env::var("CONTENTFORGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(api_base, api_key, model)
    }

    /// Returns the configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system+user exchange and returns the assistant text.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = ApiRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let system = Message::system("be helpful");
        assert_eq!(system.role, "system");
        let user = Message::user("hello");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "hello");
    }

    #[test]
    fn test_from_env_requires_api_base() {
        // Only assert behavior when the variable is absent; CI may set it.
        if env::var("CONTENTFORGE_API_BASE").is_err() {
            assert!(matches!(
                ChatClient::from_env(),
                Err(LlmError::MissingApiBase)
            ));
        }
    }

    #[tokio::test]
    async fn test_complete_connection_error() {
        let client = ChatClient::new("http://127.0.0.1:1", None, "test-model").expect("client");
        let result = client.complete("system", "user", 0.7, 100).await;
        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }
}
