use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lukeux_core::error::LukeError;
use lukeux_core::gating::GateReport;
use lukeux_llm::LlmError;

use crate::figma::FigmaError;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP status through the `anyhow::Error` chain for
/// failures that have no `LukeError` variant.
#[derive(Debug)]
struct StatusError(StatusCode, String);

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl std::error::Error for StatusError {}

/// Submission refused because a template tab does not validate. Rendered as
/// 422 with the full report under `"gate"`.
#[derive(Debug)]
struct GateBlocked(GateReport);

impl std::fmt::Display for GateBlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "form is incomplete: {}",
            self.0.blocking_tabs().join(", ")
        )
    }
}

impl std::error::Error for GateBlocked {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(StatusError(status, msg.into()).into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized() -> Self {
        Self::status(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::status(StatusCode::FORBIDDEN, "forbidden")
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    pub fn gate_blocked(report: GateReport) -> Self {
        Self(GateBlocked(report).into())
    }
}

fn luke_status(e: &LukeError) -> StatusCode {
    match e {
        LukeError::NotInitialized => StatusCode::BAD_REQUEST,
        LukeError::UserNotFound(_)
        | LukeError::ProjectNotFound(_)
        | LukeError::TaskNotFound(_)
        | LukeError::HistoryNotFound(_)
        | LukeError::TemplateNotFound(_)
        | LukeError::PlaybookNotFound(_)
        | LukeError::PromoNotFound(_)
        | LukeError::FeedbackNotFound(_)
        | LukeError::WireframeNotFound(_) => StatusCode::NOT_FOUND,
        LukeError::UserExists(_) | LukeError::TemplateExists(_) | LukeError::PromoExists(_) => {
            StatusCode::CONFLICT
        }
        LukeError::FigmaNotConnected => StatusCode::CONFLICT,
        LukeError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LukeError::InvalidOAuthState
        | LukeError::InvalidSlug(_)
        | LukeError::InvalidEmail(_)
        | LukeError::InvalidInput(_)
        | LukeError::TooManyAttachments { .. }
        | LukeError::InvalidAttachment { .. } => StatusCode::BAD_REQUEST,
        LukeError::AttachmentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        LukeError::UnsupportedAttachment { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        LukeError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LukeError::Store(_)
        | LukeError::PasswordHash(_)
        | LukeError::Io(_)
        | LukeError::Yaml(_)
        | LukeError::Json(_)
        | LukeError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn llm_status(e: &LlmError) -> StatusCode {
    match e {
        LlmError::Config(_) | LlmError::MissingApiKey { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LlmError::Transport { .. }
        | LlmError::Api { .. }
        | LlmError::EmptyResponse { .. }
        | LlmError::Decode { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(g) = self.0.downcast_ref::<GateBlocked>() {
            let body = serde_json::json!({ "error": g.to_string(), "gate": g.0 });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response();
        }

        let status = if let Some(s) = self.0.downcast_ref::<StatusError>() {
            s.0
        } else if let Some(e) = self.0.downcast_ref::<LukeError>() {
            luke_status(e)
        } else if let Some(e) = self.0.downcast_ref::<LlmError>() {
            llm_status(e)
        } else if let Some(e) = self.0.downcast_ref::<FigmaError>() {
            e.status()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(
            status_of(AppError(LukeError::TaskNotFound("t".into()).into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError(LukeError::WireframeNotFound("w".into()).into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn exists_maps_to_409() {
        assert_eq!(
            status_of(AppError(LukeError::PromoExists("a@b.co".into()).into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn attachment_errors_map_to_specific_codes() {
        let too_big = LukeError::AttachmentTooLarge {
            name: "a.png".into(),
            size: 10,
            limit: 5,
        };
        assert_eq!(status_of(AppError(too_big.into())), StatusCode::PAYLOAD_TOO_LARGE);
        let bad_type = LukeError::UnsupportedAttachment {
            name: "a.exe".into(),
            mime: "application/x-msdownload".into(),
        };
        assert_eq!(
            status_of(AppError(bad_type.into())),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        let too_many = LukeError::TooManyAttachments { count: 6, limit: 5 };
        assert_eq!(status_of(AppError(too_many.into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_email_maps_to_400() {
        assert_eq!(
            status_of(AppError(LukeError::InvalidEmail("x".into()).into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_transition_maps_to_422() {
        let e = LukeError::InvalidTransition {
            from: "connect".into(),
            to: "pick_file".into(),
            reason: "only allowed from link_team".into(),
        };
        assert_eq!(status_of(AppError(e.into())), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn llm_errors_map_to_gateway_or_unavailable() {
        let api = LlmError::Api {
            provider: "anthropic",
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(status_of(AppError(api.into())), StatusCode::BAD_GATEWAY);
        let key = LlmError::MissingApiKey {
            env: "ANTHROPIC_API_KEY",
        };
        assert_eq!(status_of(AppError(key.into())), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn sentinels() {
        assert_eq!(status_of(AppError::unauthorized()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::forbidden()), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(AppError(anyhow::anyhow!("unexpected"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn gate_blocked_carries_report() {
        let report = GateReport {
            ready: false,
            tabs: vec![lukeux_core::gating::TabStatus {
                key: "who".into(),
                label: "Who".into(),
                valid: false,
                issues: vec![],
            }],
        };
        let resp = AppError::gate_blocked(report).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["gate"]["tabs"][0]["key"], "who");
        assert!(json["error"].as_str().unwrap().contains("who"));
    }
}
