//! Promo signups: public early-access registrations managed by admins.
//!
//! Status moves PENDING → ACTIVATED → EXPIRED. Admins may set any status
//! directly; activating stamps `activated_at` and an expiry.

use crate::csv::CsvRow;
use crate::error::{LukeError, Result};
use crate::store::{Record, RecordTable, Store, PROMO_SIGNUPS};
use crate::validate;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ACTIVATION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromoStatus {
    Pending,
    Activated,
    Expired,
}

impl PromoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PromoStatus::Pending => "PENDING",
            PromoStatus::Activated => "ACTIVATED",
            PromoStatus::Expired => "EXPIRED",
        }
    }
}

impl std::str::FromStr for PromoStatus {
    type Err = LukeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PromoStatus::Pending),
            "ACTIVATED" => Ok(PromoStatus::Activated),
            "EXPIRED" => Ok(PromoStatus::Expired),
            other => Err(LukeError::InvalidInput(format!(
                "unknown promo status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoSignup {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub status: PromoStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record for PromoSignup {
    const TABLE: RecordTable = PROMO_SIGNUPS;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl CsvRow for PromoSignup {
    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "email",
            "name",
            "code",
            "status",
            "created_at",
            "activated_at",
            "expires_at",
        ]
    }

    fn row(&self) -> Vec<String> {
        let ts = |t: Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
        vec![
            self.id.clone(),
            self.email.clone(),
            self.name.clone().unwrap_or_default(),
            self.code.clone().unwrap_or_default(),
            self.status.as_str().to_string(),
            self.created_at.to_rfc3339(),
            ts(self.activated_at),
            ts(self.expires_at),
        ]
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn find_by_email(store: &Store, email: &str) -> Result<Option<PromoSignup>> {
    let email = email.trim().to_ascii_lowercase();
    Ok(store
        .filter::<PromoSignup>(|p| p.email == email)?
        .into_iter()
        .next())
}

pub fn signup(
    store: &Store,
    email: &str,
    name: Option<String>,
    code: Option<String>,
) -> Result<PromoSignup> {
    let email = validate::validate_email(email)?;
    if find_by_email(store, &email)?.is_some() {
        return Err(LukeError::PromoExists(email));
    }
    let signup = PromoSignup {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        name: non_empty(name),
        code: non_empty(code).map(|c| c.to_ascii_uppercase()),
        status: PromoStatus::Pending,
        created_at: Utc::now(),
        activated_at: None,
        expires_at: None,
    };
    if !store.put_unique(&signup, |p| p.email == signup.email)? {
        return Err(LukeError::PromoExists(signup.email));
    }
    tracing::info!(signup = %signup.id, "promo signup");
    Ok(signup)
}

pub fn get(store: &Store, id: &str) -> Result<PromoSignup> {
    store
        .get(id)?
        .ok_or_else(|| LukeError::PromoNotFound(id.to_string()))
}

/// Newest first, optionally filtered by status.
pub fn list(store: &Store, status: Option<PromoStatus>) -> Result<Vec<PromoSignup>> {
    let mut all = store.filter::<PromoSignup>(|p| status.map_or(true, |s| p.status == s))?;
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(all)
}

/// Set the status. Activation stamps `activated_at` and an expiry
/// `activation_days` out; returning to pending clears both.
pub fn set_status(
    store: &Store,
    id: &str,
    status: PromoStatus,
    activation_days: i64,
) -> Result<PromoSignup> {
    let mut signup = get(store, id)?;
    let now = Utc::now();
    match status {
        PromoStatus::Activated => {
            signup.activated_at = Some(now);
            signup.expires_at = Some(now + Duration::days(activation_days));
        }
        PromoStatus::Pending => {
            signup.activated_at = None;
            signup.expires_at = None;
        }
        PromoStatus::Expired => {
            signup.expires_at = Some(signup.expires_at.map_or(now, |e| e.min(now)));
        }
    }
    signup.status = status;
    store.put(&signup)?;
    tracing::info!(signup = %signup.id, status = status.as_str(), "promo status changed");
    Ok(signup)
}

/// Expire every activated signup whose expiry has passed. Returns how many
/// changed.
pub fn expire_due(store: &Store, now: DateTime<Utc>) -> Result<usize> {
    let due = store.filter::<PromoSignup>(|p| {
        p.status == PromoStatus::Activated && p.expires_at.is_some_and(|e| e <= now)
    })?;
    for mut signup in due.iter().cloned() {
        signup.status = PromoStatus::Expired;
        store.put(&signup)?;
    }
    if !due.is_empty() {
        tracing::info!(count = due.len(), "promo signups expired");
    }
    Ok(due.len())
}

pub fn delete(store: &Store, id: &str) -> Result<()> {
    if !store.delete::<PromoSignup>(id)? {
        return Err(LukeError::PromoNotFound(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    #[test]
    fn signup_normalizes_and_rejects_duplicates() {
        let (_dir, store) = temp_store();
        let s = signup(&store, " Ada@Example.com ", Some("Ada".into()), Some("launch".into()))
            .unwrap();
        assert_eq!(s.email, "ada@example.com");
        assert_eq!(s.code.as_deref(), Some("LAUNCH"));
        assert_eq!(s.status, PromoStatus::Pending);
        assert!(matches!(
            signup(&store, "ADA@example.com", None, None),
            Err(LukeError::PromoExists(_))
        ));
    }

    #[test]
    fn concurrent_signups_store_one_row() {
        let (_dir, store) = temp_store();
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || signup(&store, "rush@example.com", None, None).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(list(&store, None).unwrap().len(), 1);
    }

    #[test]
    fn invalid_email_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            signup(&store, "not-an-email", None, None),
            Err(LukeError::InvalidEmail(_))
        ));
    }

    #[test]
    fn activation_and_expiry() {
        let (_dir, store) = temp_store();
        let s = signup(&store, "a@example.com", None, None).unwrap();
        let s = set_status(&store, &s.id, PromoStatus::Activated, 30).unwrap();
        assert!(s.activated_at.is_some());
        let expires = s.expires_at.unwrap();

        assert_eq!(expire_due(&store, expires - Duration::days(1)).unwrap(), 0);
        assert_eq!(expire_due(&store, expires).unwrap(), 1);
        assert_eq!(get(&store, &s.id).unwrap().status, PromoStatus::Expired);
        assert_eq!(list(&store, Some(PromoStatus::Activated)).unwrap().len(), 0);
    }

    #[test]
    fn status_serializes_screaming() {
        assert_eq!(
            serde_json::to_value(PromoStatus::Activated).unwrap(),
            "ACTIVATED"
        );
        assert_eq!("expired".parse::<PromoStatus>().unwrap(), PromoStatus::Expired);
        assert!("gone".parse::<PromoStatus>().is_err());
    }

    #[test]
    fn csv_row_matches_headers() {
        let (_dir, store) = temp_store();
        let s = signup(&store, "a@example.com", None, None).unwrap();
        assert_eq!(s.row().len(), PromoSignup::headers().len());
    }
}
