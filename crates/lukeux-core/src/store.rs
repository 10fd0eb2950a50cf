//! Embedded record store backed by redb.
//!
//! # Table design
//!
//! One table per record type. Keys are the record's string key (UUID, session
//! token, user id, ...); values are the JSON-encoded record. Secondary
//! lookups (by owner, by email) scan the table; the data set of a single
//! deployment is small enough that this is not worth an index.

use std::path::Path;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{LukeError, Result};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

pub const USERS: RecordTable = TableDefinition::new("users");
pub const SESSIONS: RecordTable = TableDefinition::new("sessions");
pub const PROJECTS: RecordTable = TableDefinition::new("projects");
pub const TASKS: RecordTable = TableDefinition::new("tasks");
pub const HISTORY: RecordTable = TableDefinition::new("history");
pub const TEMPLATES: RecordTable = TableDefinition::new("templates");
pub const PLAYBOOK: RecordTable = TableDefinition::new("playbook");
pub const PROMO_SIGNUPS: RecordTable = TableDefinition::new("promo_signups");
pub const FEEDBACK: RecordTable = TableDefinition::new("recommendation_feedback");
pub const WIREFRAMES: RecordTable = TableDefinition::new("wireframes");
pub const FIGMA_CONNECTIONS: RecordTable = TableDefinition::new("figma_connections");
pub const FIGMA_WIZARDS: RecordTable = TableDefinition::new("figma_wizards");
pub const OAUTH_STATES: RecordTable = TableDefinition::new("oauth_states");

const ALL_TABLES: [RecordTable; 13] = [
    USERS,
    SESSIONS,
    PROJECTS,
    TASKS,
    HISTORY,
    TEMPLATES,
    PLAYBOOK,
    PROMO_SIGNUPS,
    FEEDBACK,
    WIREFRAMES,
    FIGMA_CONNECTIONS,
    FIGMA_WIZARDS,
    OAUTH_STATES,
];

/// A value persisted in its own store table.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: RecordTable;

    fn key(&self) -> String;
}

fn store_err(e: impl std::fmt::Display) -> LukeError {
    LukeError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        for table in ALL_TABLES {
            wt.open_table(table).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    /// Open the store under a Luke UX root (`.lukeux/lukeux.redb`).
    pub fn open_root(root: &Path) -> Result<Self> {
        Self::open(&crate::paths::store_path(root))
    }

    /// Insert or replace a record.
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let key = record.key();
        let value = serde_json::to_vec(record)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(R::TABLE).map_err(store_err)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    /// Insert a record only if its key is free. Returns false when a record
    /// with the same key already exists.
    pub fn insert_new<R: Record>(&self, record: &R) -> Result<bool> {
        let key = record.key();
        let value = serde_json::to_vec(record)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        let inserted = {
            let mut table = wt.open_table(R::TABLE).map_err(store_err)?;
            let exists = table.get(key.as_str()).map_err(store_err)?.is_some();
            if !exists {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(store_err)?;
            }
            !exists
        };
        wt.commit().map_err(store_err)?;
        Ok(inserted)
    }

    /// Insert or replace `record` unless another stored record `clashes`
    /// with it. The scan and the write share one write transaction, so two
    /// callers racing on the same unique field cannot both succeed. Returns
    /// false on a clash.
    pub fn put_unique<R: Record>(&self, record: &R, clashes: impl Fn(&R) -> bool) -> Result<bool> {
        let key = record.key();
        let value = serde_json::to_vec(record)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        let written = {
            let mut table = wt.open_table(R::TABLE).map_err(store_err)?;
            let mut clash = false;
            for entry in table.iter().map_err(store_err)? {
                let (_, existing) = entry.map_err(store_err)?;
                let existing: R = serde_json::from_slice(existing.value())?;
                if clashes(&existing) {
                    clash = true;
                    break;
                }
            }
            if !clash {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(store_err)?;
            }
            !clash
        };
        wt.commit().map_err(store_err)?;
        Ok(written)
    }

    pub fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(R::TABLE).map_err(store_err)?;
        match table.get(key).map_err(store_err)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Delete a record by key. Returns whether a record was removed.
    pub fn delete<R: Record>(&self, key: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let removed = {
            let mut table = wt.open_table(R::TABLE).map_err(store_err)?;
            let old = table.remove(key).map_err(store_err)?;
            old.is_some()
        };
        wt.commit().map_err(store_err)?;
        Ok(removed)
    }

    /// All records of a type, in key order.
    pub fn list<R: Record>(&self) -> Result<Vec<R>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(R::TABLE).map_err(store_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, value) = entry.map_err(store_err)?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    /// Records of a type matching `pred`.
    pub fn filter<R: Record>(&self, pred: impl Fn(&R) -> bool) -> Result<Vec<R>> {
        Ok(self.list::<R>()?.into_iter().filter(|r| pred(r)).collect())
    }

    /// Delete every record matching `pred` in one transaction. Returns the
    /// number removed.
    pub fn delete_where<R: Record>(&self, pred: impl Fn(&R) -> bool) -> Result<usize> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let removed = {
            let mut table = wt.open_table(R::TABLE).map_err(store_err)?;
            let mut doomed = Vec::new();
            for entry in table.iter().map_err(store_err)? {
                let (key, value) = entry.map_err(store_err)?;
                let record: R = serde_json::from_slice(value.value())?;
                if pred(&record) {
                    doomed.push(key.value().to_string());
                }
            }
            for key in &doomed {
                table.remove(key.as_str()).map_err(store_err)?;
            }
            doomed.len()
        };
        wt.commit().map_err(store_err)?;
        Ok(removed)
    }

    pub fn count<R: Record>(&self) -> Result<usize> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(R::TABLE).map_err(store_err)?;
        let n = table.len().map_err(store_err)?;
        Ok(n as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    /// Fresh store in a temp dir; keep the `TempDir` alive for the test.
    pub(crate) fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open_root(dir.path()).unwrap();
        (dir, store)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Record for Note {
        const TABLE: RecordTable = PLAYBOOK;

        fn key(&self) -> String {
            self.id.clone()
        }
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.into(),
            body: body.into(),
        }
    }

    #[test]
    fn put_get_overwrite() {
        let (_dir, store) = temp_store();
        store.put(&note("a", "first")).unwrap();
        store.put(&note("a", "second")).unwrap();
        let got: Note = store.get("a").unwrap().unwrap();
        assert_eq!(got.body, "second");
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn get_missing_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.get::<Note>("nope").unwrap().is_none());
    }

    #[test]
    fn insert_new_refuses_existing_key() {
        let (_dir, store) = temp_store();
        assert!(store.insert_new(&note("a", "first")).unwrap());
        assert!(!store.insert_new(&note("a", "second")).unwrap());
        assert_eq!(store.get::<Note>("a").unwrap().unwrap().body, "first");
    }

    #[test]
    fn put_unique_refuses_clash_and_allows_self() {
        let (_dir, store) = temp_store();
        assert!(store.put_unique(&note("a", "same"), |n| n.body == "same").unwrap());
        assert!(!store.put_unique(&note("b", "same"), |n| n.body == "same").unwrap());
        assert!(store
            .put_unique(&note("a", "same"), |n| n.body == "same" && n.id != "a")
            .unwrap());
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn put_unique_is_atomic_across_threads() {
        let (_dir, store) = temp_store();
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .put_unique(&note(&format!("n{i}"), "same"), |n| n.body == "same")
                        .unwrap()
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn list_is_key_ordered() {
        let (_dir, store) = temp_store();
        store.put(&note("b", "2")).unwrap();
        store.put(&note("a", "1")).unwrap();
        let ids: Vec<String> = store.list::<Note>().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn delete_and_delete_where() {
        let (_dir, store) = temp_store();
        for (id, body) in [("a", "keep"), ("b", "drop"), ("c", "drop")] {
            store.put(&note(id, body)).unwrap();
        }
        assert!(store.delete::<Note>("a").unwrap());
        assert!(!store.delete::<Note>("a").unwrap());
        assert_eq!(store.delete_where::<Note>(|n| n.body == "drop").unwrap(), 2);
        assert!(store.list::<Note>().unwrap().is_empty());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = Store::open_root(dir.path()).unwrap();
            store.put(&note("a", "persisted")).unwrap();
        }
        let store = Store::open_root(dir.path()).unwrap();
        assert_eq!(store.get::<Note>("a").unwrap().unwrap().body, "persisted");
    }
}
