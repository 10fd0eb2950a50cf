//! Login sessions: opaque random tokens with an expiry.

use crate::error::Result;
use crate::store::{Record, RecordTable, Store, SESSIONS};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Record for Session {
    const TABLE: RecordTable = SESSIONS;

    fn key(&self) -> String {
        self.token.clone()
    }
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn create(store: &Store, user_id: &str, ttl_hours: i64) -> Result<Session> {
    let now = Utc::now();
    let session = Session {
        token: random_token(),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + Duration::hours(ttl_hours),
    };
    store.put(&session)?;
    Ok(session)
}

/// Resolve a token to its live session. Expired sessions are removed.
pub fn lookup(store: &Store, token: &str) -> Result<Option<Session>> {
    let Some(session) = store.get::<Session>(token)? else {
        return Ok(None);
    };
    if session.is_expired(Utc::now()) {
        store.delete::<Session>(token)?;
        return Ok(None);
    }
    Ok(Some(session))
}

pub fn revoke(store: &Store, token: &str) -> Result<bool> {
    store.delete::<Session>(token)
}

pub fn revoke_all_for_user(store: &Store, user_id: &str) -> Result<usize> {
    store.delete_where::<Session>(|s| s.user_id == user_id)
}

pub fn purge_expired(store: &Store) -> Result<usize> {
    let now = Utc::now();
    store.delete_where::<Session>(|s| s.is_expired(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn create_lookup_revoke() {
        let (_dir, store) = temp_store();
        let s = create(&store, "u1", 24).unwrap();
        assert_eq!(lookup(&store, &s.token).unwrap().unwrap().user_id, "u1");
        assert!(revoke(&store, &s.token).unwrap());
        assert!(lookup(&store, &s.token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_dropped_on_lookup() {
        let (_dir, store) = temp_store();
        let s = create(&store, "u1", -1).unwrap();
        assert!(lookup(&store, &s.token).unwrap().is_none());
        assert!(store.get::<Session>(&s.token).unwrap().is_none());
    }

    #[test]
    fn purge_and_revoke_all() {
        let (_dir, store) = temp_store();
        create(&store, "u1", -1).unwrap();
        create(&store, "u1", 24).unwrap();
        create(&store, "u2", 24).unwrap();
        assert_eq!(purge_expired(&store).unwrap(), 1);
        assert_eq!(revoke_all_for_user(&store, "u1").unwrap(), 1);
        assert_eq!(store.count::<Session>().unwrap(), 1);
    }
}
