//! Recommendation feedback: users rate generated concepts as helpful or not.
//!
//! Admins read the accumulated ratings and export them as CSV.

use crate::csv::CsvRow;
use crate::error::{LukeError, Result};
use crate::store::{Record, RecordTable, Store, FEEDBACK};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const COMMENT_MAX_CHARS: usize = 2000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Helpful,
    NotHelpful,
}

impl Rating {
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Helpful => "helpful",
            Rating::NotHelpful => "not_helpful",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationFeedback {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    #[serde(default)]
    pub concept_index: Option<u32>,
    pub rating: Rating,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for RecommendationFeedback {
    const TABLE: RecordTable = FEEDBACK;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl CsvRow for RecommendationFeedback {
    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "user_id",
            "task_id",
            "concept_index",
            "rating",
            "comment",
            "created_at",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.user_id.clone(),
            self.task_id.clone(),
            self.concept_index.map(|i| i.to_string()).unwrap_or_default(),
            self.rating.as_str().to_string(),
            self.comment.clone().unwrap_or_default(),
            self.created_at.to_rfc3339(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Record a rating. Rating the same concept of the same task again replaces
/// the earlier rating.
pub fn add(
    store: &Store,
    user_id: &str,
    task_id: &str,
    concept_index: Option<u32>,
    rating: Rating,
    comment: Option<String>,
) -> Result<RecommendationFeedback> {
    let comment = comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(c) = &comment {
        if c.chars().count() > COMMENT_MAX_CHARS {
            return Err(LukeError::InvalidInput(format!(
                "comment must be at most {COMMENT_MAX_CHARS} characters"
            )));
        }
    }
    store.delete_where::<RecommendationFeedback>(|f| {
        f.user_id == user_id && f.task_id == task_id && f.concept_index == concept_index
    })?;
    let feedback = RecommendationFeedback {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        task_id: task_id.to_string(),
        concept_index,
        rating,
        comment,
        created_at: Utc::now(),
    };
    store.put(&feedback)?;
    Ok(feedback)
}

/// All feedback, newest first.
pub fn list(store: &Store) -> Result<Vec<RecommendationFeedback>> {
    let mut all = store.list::<RecommendationFeedback>()?;
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(all)
}

pub fn list_for_task(store: &Store, task_id: &str) -> Result<Vec<RecommendationFeedback>> {
    Ok(list(store)?
        .into_iter()
        .filter(|f| f.task_id == task_id)
        .collect())
}

pub fn delete(store: &Store, id: &str) -> Result<()> {
    if !store.delete::<RecommendationFeedback>(id)? {
        return Err(LukeError::FeedbackNotFound(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
