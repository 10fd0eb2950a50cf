//! Projects group a user's tasks and history.

use crate::error::{LukeError, Result};
use crate::history::HistoryEntry;
use crate::store::{Record, RecordTable, Store, PROJECTS};
use crate::task::Task;
use crate::validate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Project {
    const TABLE: RecordTable = PROJECTS;

    fn key(&self) -> String {
        self.id.clone()
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

pub fn create(
    store: &Store,
    owner_id: &str,
    name: &str,
    description: Option<String>,
) -> Result<Project> {
    let now = Utc::now();
    let project = Project {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        name: validate::validate_name("name", name)?,
        description: clean_description(description),
        created_at: now,
        updated_at: now,
    };
    store.put(&project)?;
    Ok(project)
}

/// Fetch a project owned by `owner_id`. Projects of other users are reported
/// as not found.
pub fn get_owned(store: &Store, owner_id: &str, id: &str) -> Result<Project> {
    store
        .get::<Project>(id)?
        .filter(|p| p.owner_id == owner_id)
        .ok_or_else(|| LukeError::ProjectNotFound(id.to_string()))
}

/// The owner's projects, most recently updated first.
pub fn list_for_owner(store: &Store, owner_id: &str) -> Result<Vec<Project>> {
    let mut projects = store.filter::<Project>(|p| p.owner_id == owner_id)?;
    projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(projects)
}

pub fn update(
    store: &Store,
    owner_id: &str,
    id: &str,
    name: Option<&str>,
    description: Option<String>,
) -> Result<Project> {
    let mut project = get_owned(store, owner_id, id)?;
    if let Some(name) = name {
        project.name = validate::validate_name("name", name)?;
    }
    if description.is_some() {
        project.description = clean_description(description);
    }
    project.updated_at = Utc::now();
    store.put(&project)?;
    Ok(project)
}

/// Delete a project. Its tasks and history entries are kept and detached.
pub fn delete(store: &Store, owner_id: &str, id: &str) -> Result<()> {
    let project = get_owned(store, owner_id, id)?;
    for mut task in store.filter::<Task>(|t| t.project_id.as_deref() == Some(id))? {
        task.project_id = None;
        store.put(&task)?;
    }
    for mut entry in store.filter::<HistoryEntry>(|h| h.project_id.as_deref() == Some(id))? {
        entry.project_id = None;
        store.put(&entry)?;
    }
    store.delete::<Project>(&project.id)?;
    tracing::info!(project = %project.id, "project deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    #[test]
    fn create_and_list_by_owner() {
        let (_dir, store) = temp_store();
        create(&store, "u1", "Checkout", Some("  ".into())).unwrap();
        create(&store, "u2", "Onboarding", None).unwrap();
        let mine = list_for_owner(&store, "u1").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Checkout");
        assert!(mine[0].description.is_none());
    }

    #[test]
    fn other_owner_sees_not_found() {
        let (_dir, store) = temp_store();
        let p = create(&store, "u1", "Checkout", None).unwrap();
        assert!(matches!(
            get_owned(&store, "u2", &p.id),
            Err(LukeError::ProjectNotFound(_))
        ));
        assert!(matches!(
            delete(&store, "u2", &p.id),
            Err(LukeError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn empty_name_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            create(&store, "u1", "   ", None),
            Err(LukeError::InvalidInput(_))
        ));
    }

    #[test]
    fn update_renames() {
        let (_dir, store) = temp_store();
        let p = create(&store, "u1", "Checkout", None).unwrap();
        let p = update(&store, "u1", &p.id, Some("Checkout v2"), Some("flows".into())).unwrap();
        assert_eq!(p.name, "Checkout v2");
        assert_eq!(p.description.as_deref(), Some("flows"));
    }

    #[test]
    fn delete_detaches_tasks() {
        let (_dir, store) = temp_store();
        let p = create(&store, "u1", "Checkout", None).unwrap();
        let task = crate::task::create_pending(
            &store,
            crate::task::NewTask {
                owner_id: "u1".into(),
                project_id: Some(p.id.clone()),
                template_id: None,
                title: "Cart".into(),
                prompt: "design a cart".into(),
                attachments: vec![],
                provider: "fake".into(),
                model: "m".into(),
            },
        )
        .unwrap();
        delete(&store, "u1", &p.id).unwrap();
        let task = crate::task::get_owned(&store, "u1", &task.id).unwrap();
        assert!(task.project_id.is_none());
        assert!(list_for_owner(&store, "u1").unwrap().is_empty());
    }
}
