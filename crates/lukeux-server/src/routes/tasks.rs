use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use lukeux_core::attachment::{self, AttachmentKind, AttachmentUpload, ProcessedAttachment};
use lukeux_core::blueprint::{self, FORMAT_INSTRUCTIONS};
use lukeux_core::error::LukeError;
use lukeux_core::recommendation::{self, Rating};
use lukeux_core::task::{self, NewTask, Task, TokenUsage};
use lukeux_core::{gating, history, template};
use lukeux_llm::CompletionRequest;
use serde::Deserialize;

use super::templates::visible_template;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// System prompt used when a template does not bring its own.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Luke, a senior UX designer. Answer the brief with concrete, \
buildable recommendations: name the screens, the key interactions and the \
reasoning a product team needs to act on them. Prefer specifics over \
general advice.";

// ---------------------------------------------------------------------------
// List / get / delete
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub project_id: Option<String>,
}

/// GET /api/tasks — the caller's tasks, newest first
pub async fn list_tasks(
    State(app): State<AppState>,
    current: CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let tasks = task::list_for_owner(&store, &current.user.id, q.project_id.as_deref())?;
        Ok::<_, LukeError>(serde_json::json!(tasks))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = task::get_owned(&store, &current.user.id, &id)?;
        let feedback = recommendation::list_for_task(&store, &t.id)?;
        Ok::<_, LukeError>(serde_json::json!({ "task": t, "feedback": feedback }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || task::delete(&store, &current.user.id, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct MoveBody {
    #[serde(default)]
    pub project_id: Option<String>,
}

/// PUT /api/tasks/{id}/project — file under a project, or `null` to unfile
pub async fn move_task(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<MoveBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = task::move_to_project(&store, &current.user.id, &id, body.project_id.as_deref())?;
        Ok::<_, LukeError>(serde_json::json!(t))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct FeedbackBody {
    #[serde(default)]
    pub concept_index: Option<u32>,
    pub rating: Rating,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /api/tasks/{id}/feedback — rate the response or one of its concepts
pub async fn add_feedback(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = task::get_owned(&store, &current.user.id, &id)?;
        if let Some(i) = body.concept_index {
            if i as usize >= t.concepts.len() {
                return Err(LukeError::InvalidInput(format!(
                    "concept_index {i} is out of range ({} concepts)",
                    t.concepts.len()
                )));
            }
        }
        let f = recommendation::add(
            &store,
            &current.user.id,
            &t.id,
            body.concept_index,
            body.rating,
            body.comment,
        )?;
        Ok::<_, LukeError>(serde_json::json!(f))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::CREATED, Json(result)))
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// The whole brief when no template is used; extra notes otherwise.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

/// What the blocking preparation step hands to the provider call.
struct Prepared {
    task: Task,
    system: String,
    images: Vec<ProcessedAttachment>,
}

fn system_prompt(template_prompt: Option<&str>) -> String {
    let base = template_prompt
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    format!("{base}\n\n{FORMAT_INSTRUCTIONS}")
}

fn build_request(prep: &Prepared, max_tokens: u32, temperature: f32) -> CompletionRequest {
    let mut req = CompletionRequest::new(prep.task.prompt.clone(), max_tokens)
        .with_system(prep.system.clone())
        .with_temperature(temperature);
    for img in &prep.images {
        if let Some(data) = img.base64_data() {
            req = req.with_image(img.mime_type.clone(), data);
        }
    }
    req
}

/// POST /api/tasks/generate — render the brief, ask the provider, store the result
///
/// A template must pass its gate first (422 with the report otherwise). The
/// task is persisted as pending before the provider is called so a failed
/// call still leaves a failed task behind; the provider error is returned
/// as 502.
pub async fn generate(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let provider = app.provider()?;
    let store = app.store.clone();
    let limits = app.config.attachments.clone();
    let provider_name = provider.name().to_string();
    let model = provider.model().to_string();
    let user_id = current.user.id.clone();

    let prep = tokio::task::spawn_blocking(move || {
        let (prompt, system, template_id) = match body.template_id.as_deref() {
            Some(tid) => {
                let t = visible_template(&store, &current.user, tid)?;
                let report = gating::gate(&t, &body.values);
                if !report.ready {
                    tracing::info!(
                        template = %t.id,
                        issues = report.issue_count(),
                        tabs = ?report.blocking_tabs(),
                        "generation blocked by gate"
                    );
                    return Err(AppError::gate_blocked(report));
                }
                let mut prompt = template::render(&t, &body.values);
                if let Some(notes) = body.prompt.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                    prompt.push_str("\n\nAdditional notes:\n");
                    prompt.push_str(notes);
                }
                (prompt, system_prompt(t.system_prompt.as_deref()), Some(t.id))
            }
            None => {
                let prompt = body.prompt.unwrap_or_default();
                if prompt.trim().is_empty() {
                    return Err(AppError::bad_request("prompt or template_id is required"));
                }
                (prompt, system_prompt(None), None)
            }
        };

        let processed = attachment::process_attachments(&body.attachments, &limits)?;
        let task = task::create_pending(
            &store,
            NewTask {
                owner_id: current.user.id.clone(),
                project_id: body.project_id,
                template_id,
                title: body.title.unwrap_or_default(),
                prompt: attachment::splice_into_prompt(&prompt, &processed),
                attachments: processed.iter().map(|a| a.summary()).collect(),
                provider: provider_name,
                model,
            },
        )?;
        let images = processed
            .into_iter()
            .filter(|a| a.kind == AttachmentKind::Image)
            .collect();
        Ok::<_, AppError>(Prepared {
            task,
            system,
            images,
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let req = build_request(&prep, app.config.llm.max_tokens, app.config.llm.temperature);
    tracing::info!(task = %prep.task.id, user = %user_id, provider = provider.name(), "generating");
    let task_id = prep.task.id.clone();

    let completion = match provider.complete(&req).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(task = %task_id, error = %e, "provider call failed");
            let store = app.store.clone();
            let message = e.to_string();
            tokio::task::spawn_blocking(move || task::fail(&store, &task_id, &message))
                .await
                .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
            return Err(AppError::from(e));
        }
    };

    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let parsed = blueprint::parse_blueprints(&completion.text);
        let usage = TokenUsage {
            input_tokens: completion.usage.input_tokens,
            output_tokens: completion.usage.output_tokens,
        };
        let done = task::complete(
            &store,
            &task_id,
            completion.text,
            parsed.concepts,
            Some(usage),
        )?;
        let entry = history::record(&store, &done, &parsed.prose)?;
        Ok::<_, LukeError>(serde_json::json!({
            "task": done,
            "prose": parsed.prose,
            "history_id": entry.id,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::CREATED, Json(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lukeux_core::attachment::AttachmentContent;
    use lukeux_core::task::TaskStatus;

    fn prepared(images: Vec<ProcessedAttachment>) -> Prepared {
        Prepared {
            task: Task {
                id: "t1".into(),
                owner_id: "u1".into(),
                project_id: None,
                template_id: None,
                title: "Checkout".into(),
                prompt: "Redesign checkout".into(),
                response: None,
                concepts: vec![],
                attachments: vec![],
                provider: "anthropic".into(),
                model: "m".into(),
                status: TaskStatus::Pending,
                error: None,
                usage: None,
                created_at: chrono::Utc::now(),
                completed_at: None,
            },
            system: system_prompt(None),
            images,
        }
    }

    #[test]
    fn system_prompt_always_carries_format_instructions() {
        let s = system_prompt(Some("  You audit onboarding.  "));
        assert!(s.starts_with("You audit onboarding."));
        assert!(s.ends_with(FORMAT_INSTRUCTIONS));
        assert!(system_prompt(Some(" ")).starts_with("You are Luke"));
    }

    #[test]
    fn images_become_image_parts() {
        let img = ProcessedAttachment {
            name: "shot.png".into(),
            mime_type: "image/png".into(),
            kind: AttachmentKind::Image,
            size: 3,
            content: AttachmentContent::DataUrl("data:image/png;base64,AAAA".into()),
        };
        let req = build_request(&prepared(vec![img]), 1000, 0.2);
        assert_eq!(req.max_tokens, 1000);
        assert_eq!(req.temperature, Some(0.2));
        assert!(req.system.as_deref().unwrap().contains("You are Luke"));
        let parts = &req.messages[0].content;
        assert_eq!(parts.len(), 2);
        assert!(matches!(
            &parts[1],
            lukeux_llm::ContentPart::Image { media_type, data } if media_type == "image/png" && data == "AAAA"
        ));
    }
}
