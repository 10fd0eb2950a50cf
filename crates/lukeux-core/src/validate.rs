//! Input validation shared by the API and the CLI.

use crate::error::{LukeError, Result};
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 120;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$").unwrap()
    })
}

/// Validate and normalize an email address (trimmed, lowercased).
pub fn validate_email(email: &str) -> Result<String> {
    let trimmed = email.trim();
    if trimmed.len() > 254 || !email_re().is_match(trimmed) {
        return Err(LukeError::InvalidEmail(email.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LukeError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Trim a display name or title and enforce `1..=MAX_NAME_LEN` characters.
pub fn validate_name(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LukeError::InvalidInput(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(LukeError::InvalidInput(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn is_http_url(value: &str) -> bool {
    let v = value.trim();
    (v.starts_with("http://") && v.len() > "http://".len())
        || (v.starts_with("https://") && v.len() > "https://".len())
}
