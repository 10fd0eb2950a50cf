//! Generated tasks: one prompt, one model response, the concepts parsed out
//! of it.
//!
//! A task is persisted as `pending` before the provider is called, then
//! moved to `completed` or `failed` exactly once.

use crate::attachment::AttachmentSummary;
use crate::blueprint::Concept;
use crate::error::{LukeError, Result};
use crate::history::HistoryEntry;
use crate::project;
use crate::recommendation::RecommendationFeedback;
use crate::store::{Record, RecordTable, Store, TASKS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    pub title: String,
    pub prompt: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub attachments: Vec<AttachmentSummary>,
    pub provider: String,
    pub model: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Record for Task {
    const TABLE: RecordTable = TASKS;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Everything known about a task before the provider answers.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub owner_id: String,
    pub project_id: Option<String>,
    pub template_id: Option<String>,
    pub title: String,
    pub prompt: String,
    pub attachments: Vec<AttachmentSummary>,
    pub provider: String,
    pub model: String,
}

/// First non-empty line of `prompt`, cut to a display-sized title.
pub fn derive_title(prompt: &str) -> String {
    let line = prompt
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Untitled task");
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_MAX_CHARS - 1).collect();
    format!("{}…", cut.trim_end())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

pub fn create_pending(store: &Store, new: NewTask) -> Result<Task> {
    if new.prompt.trim().is_empty() {
        return Err(LukeError::InvalidInput("prompt is required".into()));
    }
    if let Some(pid) = &new.project_id {
        project::get_owned(store, &new.owner_id, pid)?;
    }
    let title = if new.title.trim().is_empty() {
        derive_title(&new.prompt)
    } else {
        crate::validate::validate_name("title", &new.title)?
    };
    let task = Task {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: new.owner_id,
        project_id: new.project_id,
        template_id: new.template_id,
        title,
        prompt: new.prompt,
        response: None,
        concepts: Vec::new(),
        attachments: new.attachments,
        provider: new.provider,
        model: new.model,
        status: TaskStatus::Pending,
        error: None,
        usage: None,
        created_at: Utc::now(),
        completed_at: None,
    };
    store.put(&task)?;
    Ok(task)
}

fn pending(store: &Store, id: &str, to: TaskStatus) -> Result<Task> {
    let task = store
        .get::<Task>(id)?
        .ok_or_else(|| LukeError::TaskNotFound(id.to_string()))?;
    if task.status != TaskStatus::Pending {
        return Err(LukeError::InvalidTransition {
            from: task.status.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: "task already finished".into(),
        });
    }
    Ok(task)
}

pub fn complete(
    store: &Store,
    id: &str,
    response: String,
    concepts: Vec<Concept>,
    usage: Option<TokenUsage>,
) -> Result<Task> {
    let mut task = pending(store, id, TaskStatus::Completed)?;
    task.response = Some(response);
    task.concepts = concepts;
    task.usage = usage;
    task.status = TaskStatus::Completed;
    task.completed_at = Some(Utc::now());
    store.put(&task)?;
    tracing::info!(task = %task.id, concepts = task.concepts.len(), "task completed");
    Ok(task)
}

pub fn fail(store: &Store, id: &str, error: &str) -> Result<Task> {
    let mut task = pending(store, id, TaskStatus::Failed)?;
    task.status = TaskStatus::Failed;
    task.error = Some(error.to_string());
    task.completed_at = Some(Utc::now());
    store.put(&task)?;
    tracing::warn!(task = %task.id, error, "task failed");
    Ok(task)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn get_owned(store: &Store, owner_id: &str, id: &str) -> Result<Task> {
    store
        .get::<Task>(id)?
        .filter(|t| t.owner_id == owner_id)
        .ok_or_else(|| LukeError::TaskNotFound(id.to_string()))
}

/// The owner's tasks, newest first, optionally limited to one project.
pub fn list_for_owner(
    store: &Store,
    owner_id: &str,
    project_id: Option<&str>,
) -> Result<Vec<Task>> {
    let mut tasks = store.filter::<Task>(|t| {
        t.owner_id == owner_id && project_id.map_or(true, |p| t.project_id.as_deref() == Some(p))
    })?;
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(tasks)
}

/// Move a task into a project, or out of any project with `None`.
pub fn move_to_project(
    store: &Store,
    owner_id: &str,
    id: &str,
    project_id: Option<&str>,
) -> Result<Task> {
    let mut task = get_owned(store, owner_id, id)?;
    if let Some(pid) = project_id {
        project::get_owned(store, owner_id, pid)?;
    }
    task.project_id = project_id.map(str::to_string);
    store.put(&task)?;
    Ok(task)
}

pub fn delete(store: &Store, owner_id: &str, id: &str) -> Result<()> {
    let task = get_owned(store, owner_id, id)?;
    let history = store.delete_where::<HistoryEntry>(|h| h.task_id == task.id)?;
    let feedback = store.delete_where::<RecommendationFeedback>(|f| f.task_id == task.id)?;
    store.delete::<Task>(&task.id)?;
    tracing::info!(task = %task.id, history, feedback, "task deleted");
    Ok(())
}
