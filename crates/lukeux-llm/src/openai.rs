//! OpenAI Chat Completions API (`POST /v1/chat/completions`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;
use crate::types::{Completion, CompletionRequest, ContentPart, Usage};
use crate::{LlmProvider, Result};

const NAME: &str = "openai";

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
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
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn to_wire<'a>(model: &'a str, req: &CompletionRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system) = &req.system {
        messages.push(WireMessage {
            role: "system",
            content: WireContent::Text(system.clone()),
        });
    }
    for m in &req.messages {
        let content = match m.content.as_slice() {
            [ContentPart::Text { text }] => WireContent::Text(text.clone()),
            parts => WireContent::Parts(
                parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => WirePart::Text { text: text.clone() },
                        ContentPart::Image { media_type, data } => WirePart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:{media_type};base64,{data}"),
                            },
                        },
                    })
                    .collect(),
            ),
        };
        messages.push(WireMessage {
            role: m.role.as_str(),
            content,
        });
    }
    ChatRequest {
        model,
        max_tokens: req.max_tokens,
        temperature: req.temperature,
        messages,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, messages = req.messages.len(), "openai request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
            tracing::warn!(status = status.as_u16(), "openai request rejected");
            return Err(LlmError::Api {
                provider: NAME,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::Decode {
            provider: NAME,
            message: e.to_string(),
        })?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(LlmError::EmptyResponse { provider: NAME });
        };
        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: NAME });
        }
        Ok(Completion {
            text,
            model: parsed.model,
            stop_reason: choice.finish_reason,
            usage: Usage {
                input_tokens: parsed.usage.prompt_tokens,
                output_tokens: parsed.usage.completion_tokens,
            },
        })
    }
}
