//! One-shot import of the legacy MongoDB data set.
//!
//! Input is a single JSON object with one array per collection, each
//! document in MongoDB extended JSON as produced by `mongoexport
//! --jsonArray`:
//!
//! ```json
//! {
//!   "users":         [{ "_id": {"$oid": "…"}, "email": "…", "createdAt": {"$date": "…"} }],
//!   "projects":      [...],
//!   "templates":     [...],
//!   "playbook":      [...],
//!   "promo_signups": [...]
//! }
//! ```
//!
//! Legacy ids are kept as record keys, so re-running an import skips
//! everything already present. Documents that fail to decode or validate
//! are skipped with a reason; one bad document never aborts the run.
//!
//! Legacy password hashes are only carried over when they are argon2 PHC
//! strings. Anything else is replaced with an unusable hash and the user
//! must be given a new password (`lukeux user passwd`).

use crate::error::Result;
use crate::playbook::PlaybookEntry;
use crate::project::Project;
use crate::promo::{PromoSignup, PromoStatus};
use crate::store::{Record, Store};
use crate::template::{TaskTemplate, TemplateTab};
use crate::user::{Role, User};
use crate::{paths, validate};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Placeholder stored for users whose legacy hash cannot be verified.
pub const UNUSABLE_PASSWORD: &str = "!imported";

// ---------------------------------------------------------------------------
// Extended JSON scalars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MongoId {
    Oid {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Plain(String),
}

impl MongoId {
    fn into_string(self) -> String {
        match self {
            MongoId::Oid { oid } => oid,
            MongoId::Plain(s) => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DateValue {
    Iso(DateTime<Utc>),
    Millis(i64),
    NumberLong {
        #[serde(rename = "$numberLong")]
        number_long: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MongoDate {
    Wrapped {
        #[serde(rename = "$date")]
        date: DateValue,
    },
    Bare(DateValue),
}

impl MongoDate {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        let value = match self {
            MongoDate::Wrapped { date } | MongoDate::Bare(date) => date,
        };
        match value {
            DateValue::Iso(d) => Some(*d),
            DateValue::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            DateValue::NumberLong { number_long } => number_long
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }
}

fn date_or_now(d: &Option<MongoDate>) -> DateTime<Utc> {
    d.as_ref().and_then(MongoDate::to_utc).unwrap_or_else(Utc::now)
}

fn opt_date(d: &Option<MongoDate>) -> Option<DateTime<Utc>> {
    d.as_ref().and_then(MongoDate::to_utc)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Legacy document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyUser {
    #[serde(rename = "_id")]
    id: MongoId,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "passwordHash")]
    password: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    created_at: Option<MongoDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProject {
    #[serde(rename = "_id")]
    id: MongoId,
    #[serde(alias = "ownerId")]
    user_id: MongoId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_at: Option<MongoDate>,
    #[serde(default)]
    updated_at: Option<MongoDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTemplate {
    #[serde(rename = "_id")]
    id: MongoId,
    #[serde(default)]
    slug: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(alias = "promptTemplate")]
    prompt: String,
    #[serde(default)]
    tabs: Vec<TemplateTab>,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    created_at: Option<MongoDate>,
    #[serde(default)]
    updated_at: Option<MongoDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPlaybook {
    #[serde(rename = "_id")]
    id: MongoId,
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(alias = "content")]
    body: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, alias = "isPublished")]
    published: bool,
    #[serde(default, alias = "order")]
    position: i64,
    #[serde(default)]
    created_at: Option<MongoDate>,
    #[serde(default)]
    updated_at: Option<MongoDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPromo {
    #[serde(rename = "_id")]
    id: MongoId,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "promoCode")]
    code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<MongoDate>,
    #[serde(default)]
    activated_at: Option<MongoDate>,
    #[serde(default)]
    expires_at: Option<MongoDate>,
}

#[derive(Debug, Default, Deserialize)]
struct Dump {
    #[serde(default)]
    users: Vec<serde_json::Value>,
    #[serde(default)]
    projects: Vec<serde_json::Value>,
    #[serde(default, alias = "taskTemplates")]
    templates: Vec<serde_json::Value>,
    #[serde(default, alias = "playbookEntries")]
    playbook: Vec<serde_json::Value>,
    #[serde(default, alias = "promoSignups")]
    promo_signups: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skipped {
    /// Legacy id when one could be read, else the document's position.
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collection: String,
    pub read: usize,
    pub inserted: usize,
    pub skipped: Vec<Skipped>,
}

impl CollectionReport {
    fn new(collection: &str, read: usize) -> Self {
        Self {
            collection: collection.to_string(),
            read,
            inserted: 0,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            id: id.into(),
            reason: reason.into(),
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub collections: Vec<CollectionReport>,
    /// Users whose password could not be carried over.
    pub password_resets: Vec<String>,
}

impl ImportReport {
    pub fn total_read(&self) -> usize {
        self.collections.iter().map(|c| c.read).sum()
    }

    pub fn total_inserted(&self) -> usize {
        self.collections.iter().map(|c| c.inserted).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.collections.iter().map(|c| c.skipped.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Decode every document of a collection, recording decode failures.
fn decode_all<T: DeserializeOwned>(
    docs: Vec<serde_json::Value>,
    report: &mut CollectionReport,
) -> Vec<T> {
    let mut out = Vec::with_capacity(docs.len());
    for (i, doc) in docs.into_iter().enumerate() {
        let id = doc
            .get("_id")
            .and_then(|v| v.get("$oid").or(Some(v)))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{i}"));
        match serde_json::from_value::<T>(doc) {
            Ok(v) => out.push(v),
            Err(e) => report.skip(id, format!("malformed document: {e}")),
        }
    }
    out
}

fn insert<R: Record>(store: &Store, record: &R, report: &mut CollectionReport) -> Result<()> {
    if store.insert_new(record)? {
        report.inserted += 1;
    } else {
        report.skip(record.key(), "already exists");
    }
    Ok(())
}

fn import_users(
    store: &Store,
    docs: Vec<serde_json::Value>,
    report: &mut ImportReport,
) -> Result<CollectionReport> {
    let mut col = CollectionReport::new("users", docs.len());
    let mut emails: HashSet<String> = store.list::<User>()?.into_iter().map(|u| u.email).collect();
    for legacy in decode_all::<LegacyUser>(docs, &mut col) {
        let id = legacy.id.into_string();
        if store.get::<User>(&id)?.is_some() {
            col.skip(id, "already exists");
            continue;
        }
        let email = match validate::validate_email(&legacy.email) {
            Ok(e) => e,
            Err(e) => {
                col.skip(id, e.to_string());
                continue;
            }
        };
        if !emails.insert(email.clone()) {
            col.skip(id, format!("duplicate email {email}"));
            continue;
        }
        let password_hash = match legacy.password {
            Some(h) if h.starts_with("$argon2") => h,
            _ => {
                report.password_resets.push(email.clone());
                UNUSABLE_PASSWORD.to_string()
            }
        };
        let role = match legacy.role.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("admin") => Role::Admin,
            _ => Role::User,
        };
        let name = non_empty(legacy.name)
            .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());
        let user = User {
            id,
            email,
            name,
            password_hash,
            role,
            created_at: date_or_now(&legacy.created_at),
        };
        insert(store, &user, &mut col)?;
    }
    Ok(col)
}

fn import_projects(store: &Store, docs: Vec<serde_json::Value>) -> Result<CollectionReport> {
    let mut col = CollectionReport::new("projects", docs.len());
    for legacy in decode_all::<LegacyProject>(docs, &mut col) {
        let id = legacy.id.into_string();
        let owner_id = legacy.user_id.into_string();
        if store.get::<User>(&owner_id)?.is_none() {
            col.skip(id, format!("unknown owner {owner_id}"));
            continue;
        }
        let name = match validate::validate_name("name", &legacy.name) {
            Ok(n) => n,
            Err(e) => {
                col.skip(id, e.to_string());
                continue;
            }
        };
        let created_at = date_or_now(&legacy.created_at);
        let project = Project {
            id,
            owner_id,
            name,
            description: non_empty(legacy.description),
            created_at,
            updated_at: opt_date(&legacy.updated_at).unwrap_or(created_at),
        };
        insert(store, &project, &mut col)?;
    }
    Ok(col)
}

fn import_templates(store: &Store, docs: Vec<serde_json::Value>) -> Result<CollectionReport> {
    let mut col = CollectionReport::new("templates", docs.len());
    let mut slugs: HashSet<String> = store
        .list::<TaskTemplate>()?
        .into_iter()
        .map(|t| t.slug)
        .collect();
    for legacy in decode_all::<LegacyTemplate>(docs, &mut col) {
        let id = legacy.id.into_string();
        if store.get::<TaskTemplate>(&id)?.is_some() {
            col.skip(id, "already exists");
            continue;
        }
        let slug = non_empty(legacy.slug).unwrap_or_else(|| paths::slugify(&legacy.name));
        if let Err(e) = paths::validate_slug(&slug) {
            col.skip(id, e.to_string());
            continue;
        }
        if !slugs.insert(slug.clone()) {
            col.skip(id, format!("duplicate slug {slug}"));
            continue;
        }
        if legacy.prompt.trim().is_empty() {
            col.skip(id, "empty prompt");
            continue;
        }
        let created_at = date_or_now(&legacy.created_at);
        let template = TaskTemplate {
            id,
            slug,
            name: legacy.name.trim().to_string(),
            description: legacy.description.unwrap_or_default(),
            category: legacy.category.unwrap_or_default(),
            system_prompt: non_empty(legacy.system_prompt),
            prompt: legacy.prompt,
            tabs: legacy.tabs,
            is_public: legacy.is_public,
            created_at,
            updated_at: opt_date(&legacy.updated_at).unwrap_or(created_at),
        };
        insert(store, &template, &mut col)?;
    }
    Ok(col)
}

fn import_playbook(store: &Store, docs: Vec<serde_json::Value>) -> Result<CollectionReport> {
    let mut col = CollectionReport::new("playbook", docs.len());
    for legacy in decode_all::<LegacyPlaybook>(docs, &mut col) {
        let id = legacy.id.into_string();
        if legacy.title.trim().is_empty() || legacy.body.trim().is_empty() {
            col.skip(id, "missing title or body");
            continue;
        }
        let created_at = date_or_now(&legacy.created_at);
        let entry = PlaybookEntry {
            id,
            title: legacy.title.trim().to_string(),
            category: legacy.category.unwrap_or_default(),
            body: legacy.body,
            tags: legacy.tags,
            published: legacy.published,
            position: legacy.position,
            created_at,
            updated_at: opt_date(&legacy.updated_at).unwrap_or(created_at),
        };
        insert(store, &entry, &mut col)?;
    }
    Ok(col)
}

fn import_promo(store: &Store, docs: Vec<serde_json::Value>) -> Result<CollectionReport> {
    let mut col = CollectionReport::new("promo_signups", docs.len());
    let mut emails: HashSet<String> = store
        .list::<PromoSignup>()?
        .into_iter()
        .map(|p| p.email)
        .collect();
    for legacy in decode_all::<LegacyPromo>(docs, &mut col) {
        let id = legacy.id.into_string();
        if store.get::<PromoSignup>(&id)?.is_some() {
            col.skip(id, "already exists");
            continue;
        }
        let email = match validate::validate_email(&legacy.email) {
            Ok(e) => e,
            Err(e) => {
                col.skip(id, e.to_string());
                continue;
            }
        };
        let status = match legacy.status.as_deref().map(str::parse::<PromoStatus>) {
            None => PromoStatus::Pending,
            Some(Ok(s)) => s,
            Some(Err(e)) => {
                col.skip(id, e.to_string());
                continue;
            }
        };
        if !emails.insert(email.clone()) {
            col.skip(id, format!("duplicate email {email}"));
            continue;
        }
        let signup = PromoSignup {
            id,
            email,
            name: non_empty(legacy.name),
            code: non_empty(legacy.code),
            status,
            created_at: date_or_now(&legacy.created_at),
            activated_at: opt_date(&legacy.activated_at),
            expires_at: opt_date(&legacy.expires_at),
        };
        insert(store, &signup, &mut col)?;
    }
    Ok(col)
}

/// Import a dump given as a JSON string. Collections are imported users
/// first so project owners resolve.
pub fn import_json(store: &Store, json: &str) -> Result<ImportReport> {
    let dump: Dump = serde_json::from_str(json)?;
    let mut report = ImportReport::default();
    let users = import_users(store, dump.users, &mut report)?;
    report.collections.push(users);
    report.collections.push(import_projects(store, dump.projects)?);
    report.collections.push(import_templates(store, dump.templates)?);
    report.collections.push(import_playbook(store, dump.playbook)?);
    report.collections.push(import_promo(store, dump.promo_signups)?);
    tracing::info!(
        read = report.total_read(),
        inserted = report.total_inserted(),
        skipped = report.total_skipped(),
        "legacy import finished"
    );
    Ok(report)
}

pub fn import_file(store: &Store, path: &Path) -> Result<ImportReport> {
    let json = std::fs::read_to_string(path)?;
    import_json(store, &json)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
