use thiserror::Error;

#[derive(Debug, Error)]
pub enum LukeError {
    #[error("not initialized: run 'lukeux init'")]
    NotInitialized,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("an account already exists for {0}")]
    UserExists(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("history entry not found: {0}")]
    HistoryNotFound(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template already exists: {0}")]
    TemplateExists(String),

    #[error("playbook entry not found: {0}")]
    PlaybookNotFound(String),

    #[error("promo signup not found: {0}")]
    PromoNotFound(String),

    #[error("{0} is already signed up")]
    PromoExists(String),

    #[error("feedback not found: {0}")]
    FeedbackNotFound(String),

    #[error("wireframe not found: {0}")]
    WireframeNotFound(String),

    #[error("figma is not connected")]
    FigmaNotConnected,

    #[error("invalid or expired oauth state")]
    InvalidOAuthState,

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("too many attachments: {count} (limit {limit})")]
    TooManyAttachments { count: usize, limit: usize },

    #[error("attachment '{name}' is {size} bytes (limit {limit})")]
    AttachmentTooLarge {
        name: String,
        size: usize,
        limit: usize,
    },

    #[error("attachment '{name}' has unsupported type {mime}")]
    UnsupportedAttachment { name: String, mime: String },

    #[error("attachment '{name}' is unreadable: {reason}")]
    InvalidAttachment { name: String, reason: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] ::csv::Error),
}

pub type Result<T> = std::result::Result<T, LukeError>;
