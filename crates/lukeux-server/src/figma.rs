//! Figma REST client: OAuth code exchange and refresh, team/project/file
//! browsing for the wizard, and pinning a wireframe to a node as a comment.

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use lukeux_core::config::FigmaConfig;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum FigmaError {
    #[error("figma is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("figma request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("figma returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected figma response: {0}")]
    Decode(String),
}

impl FigmaError {
    pub fn status(&self) -> StatusCode {
        match self {
            FigmaError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

pub type Result<T> = std::result::Result<T, FigmaError>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub figma_user_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user_id_string: Option<String>,
    #[serde(default)]
    user_id: Option<serde_json::Value>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(t: TokenResponse) -> Self {
        let figma_user_id = t.user_id_string.or_else(|| {
            t.user_id.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        });
        Self {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_at: t
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            figma_user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigmaProject {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
struct TeamProjects {
    #[serde(default)]
    projects: Vec<RawProject>,
}

#[derive(Deserialize)]
struct RawProject {
    id: serde_json::Value,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigmaFile {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Deserialize)]
struct ProjectFiles {
    #[serde(default)]
    files: Vec<FigmaFile>,
}

/// A page (`CANVAS`) or one of its top-level frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigmaNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Deserialize)]
struct FileResponse {
    document: RawNode,
}

#[derive(Deserialize)]
struct RawNode {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    children: Vec<RawNode>,
}

#[derive(Deserialize)]
struct CommentResponse {
    id: String,
}

fn flatten_pages(document: RawNode) -> Vec<FigmaNode> {
    let mut out = Vec::new();
    for page in document.children {
        let page_name = page.name.clone();
        out.push(FigmaNode {
            id: page.id,
            name: page.name,
            kind: page.kind,
            page: None,
        });
        for frame in page.children {
            out.push(FigmaNode {
                id: frame.id,
                name: frame.name,
                kind: frame.kind,
                page: Some(page_name.clone()),
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FigmaClient {
    http: Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scope: String,
}

impl FigmaClient {
    pub fn new(config: &FigmaConfig, client_secret: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: client_secret.filter(|s| !s.trim().is_empty()),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
        })
    }

    fn client_id(&self) -> Result<&str> {
        if self.client_id.trim().is_empty() {
            return Err(FigmaError::NotConfigured("figma.client_id is empty"));
        }
        Ok(&self.client_id)
    }

    fn client_secret(&self) -> Result<&str> {
        self.client_secret
            .as_deref()
            .ok_or(FigmaError::NotConfigured("FIGMA_CLIENT_SECRET is not set"))
    }

    /// Browser URL that starts the OAuth consent screen.
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth", self.oauth_base),
            &[
                ("client_id", self.client_id()?),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scope.as_str()),
                ("state", state),
                ("response_type", "code"),
            ],
        )
        .map_err(|e| FigmaError::Decode(format!("invalid oauth_base: {e}")))?;
        Ok(url.to_string())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let form = [
            ("client_id", self.client_id()?),
            ("client_secret", self.client_secret()?),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        let req = self
            .http
            .post(self.endpoint(&["v1", "oauth", "token"])?)
            .form(&form);
        let token: TokenResponse = send_json(req).await?;
        Ok(token.into())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let form = [
            ("client_id", self.client_id()?),
            ("client_secret", self.client_secret()?),
            ("refresh_token", refresh_token),
        ];
        let req = self
            .http
            .post(self.endpoint(&["v1", "oauth", "refresh"])?)
            .form(&form);
        let token: TokenResponse = send_json(req).await?;
        Ok(token.into())
    }

    /// `api_base` with `segments` appended, each one percent-encoded as a
    /// single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| FigmaError::Decode(format!("invalid api_base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| FigmaError::Decode("invalid api_base: not a base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, token: &str, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.http.get(self.endpoint(segments)?).bearer_auth(token))
    }

    pub async fn team_projects(&self, token: &str, team_id: &str) -> Result<Vec<FigmaProject>> {
        let resp: TeamProjects = send_json(self.get(token, &["v1", "teams", team_id, "projects"])?).await?;
        Ok(resp
            .projects
            .into_iter()
            .map(|p| FigmaProject {
                id: match p.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                name: p.name,
            })
            .collect())
    }

    pub async fn project_files(&self, token: &str, project_id: &str) -> Result<Vec<FigmaFile>> {
        let resp: ProjectFiles =
            send_json(self.get(token, &["v1", "projects", project_id, "files"])?).await?;
        Ok(resp.files)
    }

    /// Pages and their top-level frames.
    pub async fn file_nodes(&self, token: &str, file_key: &str) -> Result<Vec<FigmaNode>> {
        let req = self
            .get(token, &["v1", "files", file_key])?
            .query(&[("depth", "2")]);
        let resp: FileResponse = send_json(req).await?;
        Ok(flatten_pages(resp.document))
    }

    /// Post `message` pinned to `node_id` and return the comment id.
    pub async fn post_comment(
        &self,
        token: &str,
        file_key: &str,
        node_id: &str,
        message: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "message": message,
            "client_meta": {
                "node_id": node_id,
                "node_offset": { "x": 0, "y": 0 }
            }
        });
        let req = self
            .http
            .post(self.endpoint(&["v1", "files", file_key, "comments"])?)
            .bearer_auth(token)
            .json(&body);
        let resp: CommentResponse = send_json(req).await?;
        Ok(resp.id)
    }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
    let resp = req.send().await?;
    let resp = check(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| FigmaError::Decode(e.to_string()))
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "figma request rejected");
    Err(FigmaError::Api {
        status: status.as_u16(),
        body,
    })
}
