use crate::error::{LukeError, Result};
use crate::paths;
use crate::validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL. Wireframe image links handed to Figma
    /// are built from it.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmVendor {
    Anthropic,
    Openai,
}

impl LlmVendor {
    pub fn api_key_env(self) -> &'static str {
        match self {
            LlmVendor::Anthropic => "ANTHROPIC_API_KEY",
            LlmVendor::Openai => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_vendor")]
    pub provider: LlmVendor,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override the vendor API base URL (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_vendor() -> LlmVendor {
    LlmVendor::Anthropic
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_vendor(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// FigmaConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigmaConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_figma_redirect")]
    pub redirect_uri: String,
    #[serde(default = "default_figma_api")]
    pub api_base: String,
    #[serde(default = "default_figma_oauth")]
    pub oauth_base: String,
    #[serde(default = "default_figma_scope")]
    pub scope: String,
    /// Where the browser lands after the OAuth callback completes.
    #[serde(default = "default_app_redirect")]
    pub app_redirect: String,
}

fn default_figma_redirect() -> String {
    "http://localhost:3000/api/integrations/figma/callback".to_string()
}

fn default_figma_api() -> String {
    "https://api.figma.com".to_string()
}

fn default_figma_oauth() -> String {
    "https://www.figma.com".to_string()
}

fn default_figma_scope() -> String {
    "files:read,file_comments:write".to_string()
}

fn default_app_redirect() -> String {
    "/integrations/figma".to_string()
}

impl Default for FigmaConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_figma_redirect(),
            api_base: default_figma_api(),
            oauth_base: default_figma_oauth(),
            scope: default_figma_scope(),
            app_redirect: default_app_redirect(),
        }
    }
}

// ---------------------------------------------------------------------------
// AttachmentLimits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentLimits {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

fn default_max_files() -> usize {
    5
}

fn default_max_text_bytes() -> usize {
    512 * 1024
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_document_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_text_bytes: default_max_text_bytes(),
            max_image_bytes: default_max_image_bytes(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

fn default_ttl_hours() -> i64 {
    24 * 14
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub figma: FigmaConfig,
    #[serde(default)]
    pub attachments: AttachmentLimits,
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Accounts registered with these emails are created as admins.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            figma: FigmaConfig::default(),
            attachments: AttachmentLimits::default(),
            sessions: SessionConfig::default(),
            admin_emails: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LukeError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("unsupported config version {}", self.version),
            });
        }

        if !self.server.public_url.starts_with("http://")
            && !self.server.public_url.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "server.public_url '{}' must be an http(s) URL",
                    self.server.public_url
                ),
            });
        }

        if self.llm.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "llm.model is empty".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "llm.temperature={} is outside 0.0..=2.0",
                    self.llm.temperature
                ),
            });
        }
        if std::env::var(self.llm.provider.api_key_env()).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "{} is not set; task generation will fail",
                    self.llm.provider.api_key_env()
                ),
            });
        }

        if self.figma.client_id.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "figma.client_id is empty; the Figma integration is disabled"
                    .to_string(),
            });
        }

        if self.attachments.max_files == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "attachments.max_files=0 rejects every upload".to_string(),
            });
        }

        if self.sessions.ttl_hours <= 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "sessions.ttl_hours={} must be positive",
                    self.sessions.ttl_hours
                ),
            });
        }

        for email in &self.admin_emails {
            if validate::validate_email(email).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("admin_emails entry '{email}' is not a valid email"),
                });
            }
        }

        warnings
    }
}
