//! Accounts: registration, password verification and roles.

use crate::error::{LukeError, Result};
use crate::store::{Record, RecordTable, Store, USERS};
use crate::validate;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const TABLE: RecordTable = USERS;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The API view of a user: no password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role,
            created_at: u.created_at,
        }
    }
}

impl crate::csv::CsvRow for User {
    fn headers() -> &'static [&'static str] {
        &["id", "email", "name", "role", "created_at"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.email.clone(),
            self.name.clone(),
            self.role.as_str().to_string(),
            self.created_at.to_rfc3339(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| LukeError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub fn register(
    store: &Store,
    email: &str,
    name: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    let email = validate::validate_email(email)?;
    let name = validate::validate_name("name", name)?;
    validate::validate_password(password)?;
    if find_by_email(store, &email)?.is_some() {
        return Err(LukeError::UserExists(email));
    }
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        name,
        password_hash: hash_password(password)?,
        role,
        created_at: Utc::now(),
    };
    if !store.put_unique(&user, |u| u.email == user.email)? {
        return Err(LukeError::UserExists(user.email));
    }
    tracing::info!(user = %user.id, role = user.role.as_str(), "user registered");
    Ok(user)
}

/// Look up by email and check the password. Unknown email and wrong password
/// are indistinguishable to the caller.
pub fn authenticate(store: &Store, email: &str, password: &str) -> Result<User> {
    let email = email.trim().to_ascii_lowercase();
    let user = find_by_email(store, &email)?.ok_or(LukeError::InvalidCredentials)?;
    if !verify_password(password, &user.password_hash) {
        return Err(LukeError::InvalidCredentials);
    }
    Ok(user)
}

pub fn find_by_email(store: &Store, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_ascii_lowercase();
    Ok(store
        .filter::<User>(|u| u.email == email)?
        .into_iter()
        .next())
}

pub fn get(store: &Store, id: &str) -> Result<User> {
    store
        .get(id)?
        .ok_or_else(|| LukeError::UserNotFound(id.to_string()))
}

/// All users, oldest first.
pub fn list(store: &Store) -> Result<Vec<User>> {
    let mut users = store.list::<User>()?;
    users.sort_by_key(|u| u.created_at);
    Ok(users)
}

pub fn set_role(store: &Store, id: &str, role: Role) -> Result<User> {
    let mut user = get(store, id)?;
    user.role = role;
    store.put(&user)?;
    tracing::info!(user = %user.id, role = role.as_str(), "role changed");
    Ok(user)
}

pub fn set_password(store: &Store, id: &str, password: &str) -> Result<User> {
    validate::validate_password(password)?;
    let mut user = get(store, id)?;
    user.password_hash = hash_password(password)?;
    store.put(&user)?;
    Ok(user)
}
