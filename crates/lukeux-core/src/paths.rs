use crate::error::{LukeError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const LUKEUX_DIR: &str = ".lukeux";
pub const CONFIG_FILE: &str = ".lukeux/config.yaml";
pub const STORE_FILE: &str = ".lukeux/lukeux.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn lukeux_dir(root: &Path) -> PathBuf {
    root.join(LUKEUX_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_FILE)
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(LukeError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Derive a slug from free text: lowercase, runs of other characters become
/// a single hyphen.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    trimmed.chars().take(64).collect::<String>().trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["onboarding-flow", "a", "checkout-v2", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in ["", "-dash", "dash-", "has spaces", "UPPER", "a_b"] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("User Journey: Map!"), "user-journey-map");
        assert_eq!(slugify("  --Hello__World--  "), "hello-world");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/srv/lukeux");
        assert_eq!(
            config_path(root),
            PathBuf::from("/srv/lukeux/.lukeux/config.yaml")
        );
        assert_eq!(
            store_path(root),
            PathBuf::from("/srv/lukeux/.lukeux/lukeux.redb")
        );
    }
}
