//! Single-attempt calls to an upstream generation provider.
//!
//! A [`Transport`] performs exactly one request and classifies the outcome.
//! Queueing, pacing and retries live in [`crate::gateway`].

use crate::{
    config::{LlmConfig, Provider},
    error::CallError,
    gemini::{GenerateContentRequest, GenerateContentResponse, group_messages},
    message::ChatMessage,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const AZURE_API_VERSION: &str = "2024-02-01";

/// One request/response exchange with an LLM provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the full message history and returns the generated text.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, CallError>;
}

/// Turns a non-2xx response into [`CallError::Status`], keeping the raw body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CallError::Status { status, body })
}

/// Calls `{base}/models/{model}:generateContent`.
pub struct GeminiTransport {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiTransport {
    pub fn new(api_base: String, model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            model,
            api_key,
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, CallError> {
        let body = GenerateContentRequest {
            contents: group_messages(messages),
        };
        let response = self
            .client
            .post(self.endpoint())
            .header("X-Goog-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let raw = response.text().await?;
        let data: GenerateContentResponse = serde_json::from_str(&raw)?;
        data.first_text()
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::error!(body = %raw, "Invalid response structure from Gemini");
                CallError::MalformedResponse(
                    "candidates[0].content.parts[0].text is missing or blank".into(),
                )
            })
    }
}

#[derive(Deserialize)]
struct AzureChatResponse {
    #[serde(default)]
    choices: Vec<AzureChoice>,
}

#[derive(Deserialize)]
struct AzureChoice {
    message: Option<AzureMessage>,
}

#[derive(Deserialize)]
struct AzureMessage {
    content: Option<String>,
}

/// Calls an Azure OpenAI chat-completions deployment.
pub struct AzureTransport {
    client: reqwest::Client,
    endpoint: String,
    deployment_id: String,
    api_key: String,
}

impl AzureTransport {
    pub fn new(endpoint: String, deployment_id: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            deployment_id,
            api_key,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment_id,
            AZURE_API_VERSION
        )
    }
}

#[async_trait]
impl Transport for AzureTransport {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, CallError> {
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&json!({ "messages": messages }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let data: AzureChatResponse = serde_json::from_str(&response.text().await?)?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                CallError::MalformedResponse(
                    "choices[0].message.content is missing or blank".into(),
                )
            })
    }
}

/// Builds the transport for the configured provider. Gemini is the fallback.
pub fn transport_from_config(config: &LlmConfig) -> Arc<dyn Transport> {
    match config.provider {
        Some(Provider::Azure) => Arc::new(AzureTransport::new(
            config.azure_endpoint.clone().unwrap_or_default(),
            config.azure_deployment_id.clone().unwrap_or_default(),
            config.azure_api_key.clone().unwrap_or_default(),
        )),
        Some(Provider::Gemini) | None => Arc::new(GeminiTransport::new(
            config.gemini_api_base.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone().unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-test";

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("persona"),
            ChatMessage::user("Teacher (to the student): Hi!"),
            ChatMessage::assistant("Student (to the teacher): Hello."),
            ChatMessage::user("Teacher (to the student): Ready?"),
        ]
    }

    fn gemini_for(server: &MockServer) -> Arc<dyn Transport> {
        transport_from_config(&LlmConfig {
            provider: Some(Provider::Gemini),
            gemini_api_key: Some("test-key".into()),
            gemini_model: MODEL.into(),
            gemini_api_base: server.uri(),
            ..LlmConfig::default()
        })
    }

    fn azure_for(server: &MockServer) -> Arc<dyn Transport> {
        transport_from_config(&LlmConfig {
            provider: Some(Provider::Azure),
            azure_endpoint: Some(server.uri()),
            azure_api_key: Some("azure-key".into()),
            azure_deployment_id: Some("tutor".into()),
            ..LlmConfig::default()
        })
    }

    fn gemini_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
    }

    #[test]
    fn test_gemini_endpoint() {
        let transport = GeminiTransport::new(
            "https://generativelanguage.googleapis.com/v1beta/".into(),
            "gemini-1.5-flash-latest".into(),
            "key".into(),
        );
        assert_eq!(
            transport.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_azure_url() {
        let transport = AzureTransport::new(
            "https://example.openai.azure.com".into(),
            "tutor".into(),
            "key".into(),
        );
        assert_eq!(
            transport.url(),
            "https://example.openai.azure.com/openai/deployments/tutor/chat/completions?api-version=2024-02-01"
        );
    }

    #[tokio::test]
    async fn test_gemini_sends_key_and_grouped_contents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{MODEL}:generateContent")))
            .and(header("X-Goog-Api-Key", "test-key"))
            .and(body_json(json!({
                "contents": [
                    { "role": "user", "parts": [
                        { "text": "persona" },
                        { "text": "Teacher (to the student): Hi!" }
                    ] },
                    { "role": "model", "parts": [{ "text": "Student (to the teacher): Hello." }] },
                    { "role": "user", "parts": [{ "text": "Teacher (to the student): Ready?" }] }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Yes!")))
            .expect(1)
            .mount(&server)
            .await;

        let text = gemini_for(&server).generate(&history()).await.unwrap();
        assert_eq!(text, "Yes!");
    }

    #[tokio::test]
    async fn test_gemini_non_success_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        match gemini_for(&server).generate(&history()).await {
            Err(CallError::Status { status, body }) => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gemini_missing_text_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let err = gemini_for(&server).generate(&history()).await.unwrap_err();
        assert!(matches!(err, CallError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_gemini_blank_text_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("  \n ")))
            .mount(&server)
            .await;

        let err = gemini_for(&server).generate(&history()).await.unwrap_err();
        assert!(matches!(err, CallError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_azure_sends_key_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/tutor/chat/completions"))
            .and(query_param("api-version", AZURE_API_VERSION))
            .and(header("api-key", "azure-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = azure_for(&server).generate(&history()).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_azure_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = azure_for(&server).generate(&history()).await.unwrap_err();
        assert!(matches!(err, CallError::MalformedResponse(_)));
    }
}
