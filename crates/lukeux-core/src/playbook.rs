//! UX playbook: short editorial entries curated by admins and shown publicly
//! once published.

use crate::csv::CsvRow;
use crate::error::{LukeError, Result};
use crate::store::{Record, RecordTable, Store, PLAYBOOK};
use crate::validate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for PlaybookEntry {
    const TABLE: RecordTable = PLAYBOOK;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl CsvRow for PlaybookEntry {
    fn headers() -> &'static [&'static str] {
        &["id", "title", "category", "tags", "published", "position", "updated_at"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.title.clone(),
            self.category.clone(),
            self.tags.join(";"),
            self.published.to_string(),
            self.position.to_string(),
            self.updated_at.to_rfc3339(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookInput {
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    /// Defaults to the end of the list on create.
    #[serde(default)]
    pub position: Option<i64>,
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn check(input: &PlaybookInput) -> Result<String> {
    let title = validate::validate_name("title", &input.title)?;
    if input.body.trim().is_empty() {
        return Err(LukeError::InvalidInput("body is required".into()));
    }
    Ok(title)
}

pub fn create(store: &Store, input: PlaybookInput) -> Result<PlaybookEntry> {
    let title = check(&input)?;
    let position = match input.position {
        Some(p) => p,
        None => store
            .list::<PlaybookEntry>()?
            .iter()
            .map(|e| e.position + 1)
            .max()
            .unwrap_or(0),
    };
    let now = Utc::now();
    let entry = PlaybookEntry {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        category: input.category.trim().to_string(),
        body: input.body,
        tags: clean_tags(input.tags),
        published: input.published,
        position,
        created_at: now,
        updated_at: now,
    };
    store.put(&entry)?;
    Ok(entry)
}

pub fn update(store: &Store, id: &str, input: PlaybookInput) -> Result<PlaybookEntry> {
    let title = check(&input)?;
    let mut entry = get(store, id)?;
    entry.title = title;
    entry.category = input.category.trim().to_string();
    entry.body = input.body;
    entry.tags = clean_tags(input.tags);
    entry.published = input.published;
    if let Some(p) = input.position {
        entry.position = p;
    }
    entry.updated_at = Utc::now();
    store.put(&entry)?;
    Ok(entry)
}

pub fn get(store: &Store, id: &str) -> Result<PlaybookEntry> {
    store
        .get(id)?
        .ok_or_else(|| LukeError::PlaybookNotFound(id.to_string()))
}

/// All entries ordered by position, then title.
pub fn list(store: &Store) -> Result<Vec<PlaybookEntry>> {
    let mut all = store.list::<PlaybookEntry>()?;
    all.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.title.cmp(&b.title)));
    Ok(all)
}

pub fn list_published(store: &Store) -> Result<Vec<PlaybookEntry>> {
    Ok(list(store)?.into_iter().filter(|e| e.published).collect())
}

pub fn delete(store: &Store, id: &str) -> Result<()> {
    if !store.delete::<PlaybookEntry>(id)? {
        return Err(LukeError::PlaybookNotFound(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    fn input(title: &str, published: bool) -> PlaybookInput {
        PlaybookInput {
            title: title.into(),
            category: "forms".into(),
            body: "Keep labels above inputs.".into(),
            tags: vec![" Forms ".into(), "a11y".into(), "forms".into()],
            published,
            position: None,
        }
    }

    #[test]
    fn positions_append_and_published_filter() {
        let (_dir, store) = temp_store();
        let a = create(&store, input("Labels", true)).unwrap();
        let b = create(&store, input("Drafts", false)).unwrap();
        let c = create(&store, input("Errors", true)).unwrap();
        assert_eq!((a.position, b.position, c.position), (0, 1, 2));
        assert_eq!(a.tags, vec!["a11y", "forms"]);

        let public: Vec<String> = list_published(&store)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(public, vec!["Labels", "Errors"]);
    }

    #[test]
    fn reorder_through_update() {
        let (_dir, store) = temp_store();
        let a = create(&store, input("Labels", true)).unwrap();
        create(&store, input("Errors", true)).unwrap();
        let mut moved = input("Labels", true);
        moved.position = Some(10);
        update(&store, &a.id, moved).unwrap();
        assert_eq!(list(&store).unwrap()[1].id, a.id);
    }

    #[test]
    fn body_required_and_missing_delete() {
        let (_dir, store) = temp_store();
        let mut bad = input("Labels", true);
        bad.body = " ".into();
        assert!(matches!(create(&store, bad), Err(LukeError::InvalidInput(_))));
        assert!(matches!(
            delete(&store, "missing"),
            Err(LukeError::PlaybookNotFound(_))
        ));
    }
}
