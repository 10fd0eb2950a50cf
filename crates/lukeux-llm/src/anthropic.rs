//! Anthropic Messages API (`POST /v1/messages`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;
use crate::types::{Completion, CompletionRequest, ContentPart, Usage};
use crate::{LlmProvider, Result};

const NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Vec<WireBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn to_wire<'a>(model: &'a str, req: &'a CompletionRequest) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens: req.max_tokens,
        system: req.system.as_deref(),
        temperature: req.temperature,
        messages: req
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: m
                    .content
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => WireBlock::Text { text },
                        ContentPart::Image { media_type, data } => WireBlock::Image {
                            source: ImageSource {
                                kind: "base64",
                                media_type,
                                data,
                            },
                        },
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(model = %self.model, messages = req.messages.len(), "anthropic request");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&to_wire(&self.model, req))
            .send()
            .await
            .map_err(|source| LlmError::Transport {
                provider: NAME,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "anthropic request rejected");
            return Err(LlmError::Api {
                provider: NAME,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| LlmError::Decode {
            provider: NAME,
            message: e.to_string(),
        })?;
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: NAME });
        }
        Ok(Completion {
            text,
            model: parsed.model,
            stop_reason: parsed.stop_reason,
            usage: Usage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn provider(url: &str) -> AnthropicProvider {
        AnthropicProvider::new("test-key", "claude-test", url, 5).unwrap()
    }

    #[tokio::test]
    async fn maps_request_and_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-test",
                "max_tokens": 256,
                "system": "be brief",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "hi"},
                        {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}}
                    ]
                }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "msg_1",
                    "model": "claude-test",
                    "content": [{"type": "text", "text": "Hello"}, {"type": "text", "text": " there"}],
                    "stop_reason": "end_turn",
                    "usage": {"input_tokens": 12, "output_tokens": 3}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let req = CompletionRequest::new("hi", 256)
            .with_system("be brief")
            .with_image("image/png", "AAAA");
        let out = provider(&server.url()).complete(&req).await.unwrap();
        mock.assert_async().await;
        assert_eq!(out.text, "Hello there");
        assert_eq!(out.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(out.usage.input_tokens, 12);
    }

    #[tokio::test]
    async fn non_success_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;
        let err = provider(&server.url())
            .complete(&CompletionRequest::new("hi", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 529, ref body, .. } if body == "overloaded"));
    }

    #[tokio::test]
    async fn no_text_blocks_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(json!({"model": "m", "content": []}).to_string())
            .create_async()
            .await;
        let err = provider(&server.url())
            .complete(&CompletionRequest::new("hi", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }
}
