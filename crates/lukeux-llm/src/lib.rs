//! `lukeux-llm`: thin completion clients for the hosted model APIs.
//!
//! Each provider turns a [`CompletionRequest`] into one HTTP call and maps
//! the answer back to a [`Completion`]. There is no streaming, no tool use
//! and no retry: a failed call surfaces as an [`LlmError`] and the caller
//! decides what to do.
//!
//! ```rust,ignore
//! use lukeux_llm::{provider_from_settings, CompletionRequest, ProviderSettings, Vendor};
//!
//! let provider = provider_from_settings(&ProviderSettings {
//!     vendor: Vendor::Anthropic,
//!     model: "claude-sonnet-4-5".into(),
//!     api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
//!     base_url: None,
//!     timeout_secs: 120,
//! })?;
//! let out = provider.complete(&CompletionRequest::new("hello", 512)).await?;
//! ```

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod types;

use std::sync::Arc;

pub use anthropic::AnthropicProvider;
pub use async_trait::async_trait;
pub use error::LlmError;
pub use openai::OpenAiProvider;
pub use types::{
    ChatMessage, Completion, CompletionRequest, ContentPart, ProviderSettings, Role, Usage,
    Vendor,
};

pub type Result<T> = std::result::Result<T, LlmError>;

/// A hosted model that answers one request with one completion.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Vendor name, used in logs and stored on tasks.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion>;
}

/// Build the provider named by `settings`. A missing or blank API key is a
/// configuration error, reported before any request is made.
pub fn provider_from_settings(settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>> {
    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(LlmError::MissingApiKey {
            env: settings.vendor.api_key_env(),
        })?;
    if settings.model.trim().is_empty() {
        return Err(LlmError::Config("model is required".into()));
    }
    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| settings.vendor.default_base_url().to_string());
    let provider: Arc<dyn LlmProvider> = match settings.vendor {
        Vendor::Anthropic => Arc::new(AnthropicProvider::new(
            api_key,
            &settings.model,
            base_url,
            settings.timeout_secs,
        )?),
        Vendor::Openai => Arc::new(OpenAiProvider::new(
            api_key,
            &settings.model,
            base_url,
            settings.timeout_secs,
        )?),
    };
    tracing::info!(provider = provider.name(), model = provider.model(), "llm provider ready");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vendor: Vendor, key: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            vendor,
            model: "m".into(),
            api_key: key.map(str::to_string),
            base_url: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn picks_vendor() {
        let p = provider_from_settings(&settings(Vendor::Openai, Some("k"))).unwrap();
        assert_eq!(p.name(), "openai");
        let p = provider_from_settings(&settings(Vendor::Anthropic, Some("k"))).unwrap();
        assert_eq!(p.name(), "anthropic");
        assert_eq!(p.model(), "m");
    }

    #[test]
    fn missing_key_names_the_env_var() {
        let err = provider_from_settings(&settings(Vendor::Anthropic, Some("  "))).err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        let err = provider_from_settings(&settings(Vendor::Openai, None)).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey { env: "OPENAI_API_KEY" }));
    }

    #[test]
    fn vendor_parse() {
        assert_eq!("Claude".parse::<Vendor>().unwrap(), Vendor::Anthropic);
        assert!("mistral".parse::<Vendor>().is_err());
    }
}
