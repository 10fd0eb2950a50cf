//! History: a lightweight log of completed generations.

use crate::error::{LukeError, Result};
use crate::store::{Record, RecordTable, Store, HISTORY};
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const EXCERPT_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub owner_id: String,
    pub task_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub title: String,
    pub excerpt: String,
    pub concept_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Record for HistoryEntry {
    const TABLE: RecordTable = HISTORY;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Collapse whitespace and cut to `EXCERPT_MAX_CHARS`.
pub fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_MAX_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_MAX_CHARS - 1).collect();
    format!("{}…", cut.trim_end())
}

/// Record a completed task. `prose` is the response with blueprint blocks
/// removed.
pub fn record(store: &Store, task: &Task, prose: &str) -> Result<HistoryEntry> {
    let entry = HistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: task.owner_id.clone(),
        task_id: task.id.clone(),
        project_id: task.project_id.clone(),
        title: task.title.clone(),
        excerpt: excerpt(prose),
        concept_count: task.concepts.len(),
        created_at: Utc::now(),
    };
    store.put(&entry)?;
    Ok(entry)
}

/// Newest first.
pub fn list_for_owner(store: &Store, owner_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
    let mut entries = store.filter::<HistoryEntry>(|h| h.owner_id == owner_id)?;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    Ok(entries)
}

pub fn delete(store: &Store, owner_id: &str, id: &str) -> Result<()> {
    let found = store
        .get::<HistoryEntry>(id)?
        .filter(|h| h.owner_id == owner_id)
        .ok_or_else(|| LukeError::HistoryNotFound(id.to_string()))?;
    store.delete::<HistoryEntry>(&found.id)?;
    Ok(())
}

pub fn clear(store: &Store, owner_id: &str) -> Result<usize> {
    store.delete_where::<HistoryEntry>(|h| h.owner_id == owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;
    use crate::task::{self, tests::new_task};

    fn completed(store: &Store, owner: &str, prompt: &str) -> Task {
        let t = task::create_pending(store, new_task(owner, prompt)).unwrap();
        task::complete(store, &t.id, "response".into(), vec![], None).unwrap()
    }

    #[test]
    fn excerpt_flattens_and_cuts() {
        assert_eq!(excerpt("  a\n\n b\tc "), "a b c");
        let long = excerpt(&"x".repeat(500));
        assert_eq!(long.chars().count(), EXCERPT_MAX_CHARS);
    }

    #[test]
    fn record_list_newest_first_with_limit() {
        let (_dir, store) = temp_store();
        for prompt in ["first", "second", "third"] {
            let t = completed(&store, "u1", prompt);
            record(&store, &t, "prose").unwrap();
        }
        let t = completed(&store, "u2", "other");
        record(&store, &t, "prose").unwrap();

        let all = list_for_owner(&store, "u1", None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "third");
        assert_eq!(list_for_owner(&store, "u1", Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn delete_is_owner_scoped_and_clear_counts() {
        let (_dir, store) = temp_store();
        let t = completed(&store, "u1", "a");
        let e = record(&store, &t, "p").unwrap();
        record(&store, &t, "p").unwrap();
        assert!(matches!(
            delete(&store, "u2", &e.id),
            Err(LukeError::HistoryNotFound(_))
        ));
        delete(&store, "u1", &e.id).unwrap();
        assert_eq!(clear(&store, "u1").unwrap(), 1);
        assert!(list_for_owner(&store, "u1", None).unwrap().is_empty());
    }
}
