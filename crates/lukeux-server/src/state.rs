use std::path::PathBuf;
use std::sync::Arc;

use lukeux_core::config::{Config, LlmConfig, LlmVendor};
use lukeux_core::store::Store;
use lukeux_llm::{provider_from_settings, LlmProvider, ProviderSettings, Vendor};

use crate::error::AppError;
use crate::figma::FigmaClient;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    /// `None` when the provider's API key is not set. The server still
    /// starts; generation answers 503 until the key is provided.
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub figma: FigmaClient,
}

impl AppState {
    pub fn new(
        root: PathBuf,
        config: Config,
        store: Store,
        llm: Option<Arc<dyn LlmProvider>>,
        figma: FigmaClient,
    ) -> Self {
        Self {
            root,
            config: Arc::new(config),
            store: Arc::new(store),
            llm,
            figma,
        }
    }

    /// Load config and store from `root` and build the clients from the
    /// environment.
    pub fn open(root: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        for w in config.validate() {
            tracing::warn!("config: {}", w.message);
        }
        let store = Store::open_root(&root)?;
        crate::routes::accounts::purge_expired_sessions(&store)?;

        let llm = match provider_from_settings(&provider_settings(&config.llm)) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!("llm provider disabled: {e}");
                None
            }
        };
        let secret = std::env::var("FIGMA_CLIENT_SECRET").ok();
        let figma = FigmaClient::new(&config.figma, secret)?;

        Ok(Self::new(root, config, store, llm, figma))
    }

    pub fn provider(&self) -> Result<Arc<dyn LlmProvider>, AppError> {
        self.llm.clone().ok_or_else(|| {
            AppError::unavailable(format!(
                "llm provider is not configured: set {}",
                self.config.llm.provider.api_key_env()
            ))
        })
    }

    /// Public URL a browser can use for a stored wireframe image.
    pub fn wireframe_url(&self, id: &str) -> String {
        format!(
            "{}/api/wireframes/{id}/image",
            self.config.server.public_url.trim_end_matches('/')
        )
    }
}

/// Map the config section onto provider settings, resolving the API key
/// from the vendor's environment variable.
pub fn provider_settings(llm: &LlmConfig) -> ProviderSettings {
    let vendor = match llm.provider {
        LlmVendor::Anthropic => Vendor::Anthropic,
        LlmVendor::Openai => Vendor::Openai,
    };
    ProviderSettings {
        vendor,
        model: llm.model.clone(),
        api_key: std::env::var(vendor.api_key_env()).ok(),
        base_url: llm.base_url.clone(),
        timeout_secs: llm.timeout_secs,
    }
}
