//! Figma integration state: the OAuth connection, single-use OAuth states,
//! and the export wizard.
//!
//! # Wizard
//!
//! ```text
//! connect → link_team → pick_file → pick_node → exporting → done
//!                 ╰──────────── any non-terminal step ─────────→ error
//! ```
//!
//! Steps are strictly sequential. The only way back from `error` is an
//! explicit `retry` (return to the failed step; a failed export returns to
//! node selection) or `start_over`. `reset` disconnects and returns to
//! `connect` from anywhere.

use crate::error::{LukeError, Result};
use crate::progress::{PhaseView, ProgressStrip};
use crate::store::{Record, RecordTable, Store, FIGMA_CONNECTIONS, FIGMA_WIZARDS, OAUTH_STATES};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Stored OAuth grant. Never returned over the API as-is; see
/// [`ConnectionStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigmaConnection {
    pub user_id: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub figma_user_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for FigmaConnection {
    const TABLE: RecordTable = FIGMA_CONNECTIONS;

    fn key(&self) -> String {
        self.user_id.clone()
    }
}

impl FigmaConnection {
    /// True when the access token expires within a minute of `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|e| e - Duration::minutes(1) <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figma_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Option<&FigmaConnection>> for ConnectionStatus {
    fn from(c: Option<&FigmaConnection>) -> Self {
        match c {
            Some(c) => Self {
                connected: true,
                figma_user_id: c.figma_user_id.clone(),
                team_id: c.team_id.clone(),
                expires_at: c.expires_at,
            },
            None => Self {
                connected: false,
                figma_user_id: None,
                team_id: None,
                expires_at: None,
            },
        }
    }
}

pub fn get_connection(store: &Store, user_id: &str) -> Result<Option<FigmaConnection>> {
    store.get(user_id)
}

pub fn require_connection(store: &Store, user_id: &str) -> Result<FigmaConnection> {
    get_connection(store, user_id)?.ok_or(LukeError::FigmaNotConnected)
}

/// Store a fresh grant and move the wizard past `connect`.
pub fn save_connection(store: &Store, connection: &FigmaConnection) -> Result<FigmaWizard> {
    store.put(connection)?;
    let mut wizard = load_wizard(store, &connection.user_id)?;
    if wizard.step == WizardStep::Connect {
        wizard.connected()?;
    }
    save_wizard(store, &mut wizard)?;
    tracing::info!(user = %connection.user_id, "figma connected");
    Ok(wizard)
}

/// Replace tokens after a refresh, keeping everything else.
pub fn update_tokens(
    store: &Store,
    user_id: &str,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<FigmaConnection> {
    let mut conn = require_connection(store, user_id)?;
    conn.access_token = access_token;
    if refresh_token.is_some() {
        conn.refresh_token = refresh_token;
    }
    conn.expires_at = expires_at;
    store.put(&conn)?;
    Ok(conn)
}

/// Forget the grant and reset the wizard.
pub fn disconnect(store: &Store, user_id: &str) -> Result<bool> {
    let removed = store.delete::<FigmaConnection>(user_id)?;
    let mut wizard = load_wizard(store, user_id)?;
    wizard.reset();
    save_wizard(store, &mut wizard)?;
    if removed {
        tracing::info!(user = %user_id, "figma disconnected");
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// OAuth state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub state: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Record for OAuthState {
    const TABLE: RecordTable = OAUTH_STATES;

    fn key(&self) -> String {
        self.state.clone()
    }
}

pub fn begin_oauth(store: &Store, user_id: &str) -> Result<OAuthState> {
    let now = Utc::now();
    let cutoff = now - Duration::minutes(OAUTH_STATE_TTL_MINUTES);
    store.delete_where::<OAuthState>(|s| s.created_at < cutoff)?;
    let state = OAuthState {
        state: crate::session::random_token(),
        user_id: user_id.to_string(),
        created_at: now,
    };
    store.put(&state)?;
    Ok(state)
}

/// Consume a state token and return the user it was issued to. A token is
/// valid once and for `OAUTH_STATE_TTL_MINUTES`.
pub fn consume_oauth_state(store: &Store, state: &str) -> Result<String> {
    let found = store
        .get::<OAuthState>(state)?
        .ok_or(LukeError::InvalidOAuthState)?;
    store.delete::<OAuthState>(state)?;
    if Utc::now() - found.created_at > Duration::minutes(OAUTH_STATE_TTL_MINUTES) {
        return Err(LukeError::InvalidOAuthState);
    }
    Ok(found.user_id)
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Connect,
    LinkTeam,
    PickFile,
    PickNode,
    Exporting,
    Done,
    Error,
}

impl WizardStep {
    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::Connect => "connect",
            WizardStep::LinkTeam => "link_team",
            WizardStep::PickFile => "pick_file",
            WizardStep::PickNode => "pick_node",
            WizardStep::Exporting => "exporting",
            WizardStep::Done => "done",
            WizardStep::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WizardStep::Done | WizardStep::Error)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    pub wireframe_id: String,
    pub file_key: String,
    pub node_id: String,
    pub strip: ProgressStrip,
    #[serde(default)]
    pub comment_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigmaWizard {
    pub user_id: String,
    pub step: WizardStep,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub failed_step: Option<WizardStep>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub export: Option<ExportProgress>,
    pub updated_at: DateTime<Utc>,
}

impl Record for FigmaWizard {
    const TABLE: RecordTable = FIGMA_WIZARDS;

    fn key(&self) -> String {
        self.user_id.clone()
    }
}

fn invalid(from: WizardStep, to: WizardStep, reason: &str) -> LukeError {
    LukeError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

fn require_id(value: &str, what: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(LukeError::InvalidInput(format!("{what} is required")));
    }
    Ok(v.to_string())
}

impl FigmaWizard {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            step: WizardStep::Connect,
            team_id: None,
            file_key: None,
            node_id: None,
            failed_step: None,
            last_error: None,
            export: None,
            updated_at: Utc::now(),
        }
    }

    fn expect(&self, allowed: &[WizardStep], to: WizardStep) -> Result<()> {
        if allowed.contains(&self.step) {
            return Ok(());
        }
        let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
        Err(invalid(
            self.step,
            to,
            &format!("only allowed from {}", names.join(" or ")),
        ))
    }

    pub fn connected(&mut self) -> Result<()> {
        self.expect(&[WizardStep::Connect], WizardStep::LinkTeam)?;
        self.step = WizardStep::LinkTeam;
        Ok(())
    }

    /// Link (or relink) a team. Clears any file and node selection.
    pub fn link_team(&mut self, team_id: &str) -> Result<()> {
        self.expect(
            &[WizardStep::LinkTeam, WizardStep::PickFile, WizardStep::PickNode],
            WizardStep::PickFile,
        )?;
        self.team_id = Some(require_id(team_id, "team_id")?);
        self.file_key = None;
        self.node_id = None;
        self.step = WizardStep::PickFile;
        Ok(())
    }

    pub fn pick_file(&mut self, file_key: &str) -> Result<()> {
        self.expect(&[WizardStep::PickFile, WizardStep::PickNode], WizardStep::PickNode)?;
        self.file_key = Some(require_id(file_key, "file_key")?);
        self.node_id = None;
        self.step = WizardStep::PickNode;
        Ok(())
    }

    pub fn pick_node(&mut self, node_id: &str) -> Result<()> {
        self.expect(&[WizardStep::PickNode], WizardStep::PickNode)?;
        self.node_id = Some(require_id(node_id, "node_id")?);
        Ok(())
    }

    /// Start exporting `wireframe_id` to the chosen node. The strip starts at
    /// Upload.
    pub fn begin_export(&mut self, wireframe_id: &str) -> Result<()> {
        self.expect(&[WizardStep::PickNode], WizardStep::Exporting)?;
        let (Some(file_key), Some(node_id)) = (self.file_key.clone(), self.node_id.clone()) else {
            return Err(invalid(self.step, WizardStep::Exporting, "no node selected"));
        };
        self.export = Some(ExportProgress {
            wireframe_id: require_id(wireframe_id, "wireframe_id")?,
            file_key,
            node_id,
            strip: ProgressStrip::new(),
            comment_id: None,
            started_at: Utc::now(),
        });
        self.step = WizardStep::Exporting;
        Ok(())
    }

    /// Upload finished; the export is being applied in Figma.
    pub fn export_applying(&mut self) -> Result<()> {
        self.expect(&[WizardStep::Exporting], WizardStep::Exporting)?;
        let export = self
            .export
            .as_mut()
            .ok_or_else(|| invalid(WizardStep::Exporting, WizardStep::Exporting, "no export"))?;
        export.strip.advance()?;
        Ok(())
    }

    /// Figma confirmed the export with `comment_id`: verified and done.
    pub fn finish(&mut self, comment_id: &str) -> Result<()> {
        self.expect(&[WizardStep::Exporting], WizardStep::Done)?;
        let export = self
            .export
            .as_mut()
            .ok_or_else(|| invalid(WizardStep::Exporting, WizardStep::Done, "no export"))?;
        while !export.strip.is_verified() {
            export.strip.advance()?;
        }
        export.comment_id = Some(comment_id.to_string());
        self.step = WizardStep::Done;
        Ok(())
    }

    pub fn fail(&mut self, message: &str) -> Result<()> {
        if self.step.is_terminal() {
            return Err(invalid(self.step, WizardStep::Error, "wizard already finished"));
        }
        if let Some(export) = self.export.as_mut() {
            export.strip.fail();
        }
        self.failed_step = Some(self.step);
        self.last_error = Some(message.to_string());
        self.step = WizardStep::Error;
        Ok(())
    }

    /// "Try Again": back to the step that failed. A failed export returns to
    /// node selection with the node still chosen.
    pub fn retry(&mut self) -> Result<()> {
        self.expect(&[WizardStep::Error], WizardStep::PickNode)?;
        let target = match self.failed_step {
            Some(WizardStep::Exporting) | None => WizardStep::PickNode,
            Some(step) => step,
        };
        self.step = target;
        self.failed_step = None;
        self.last_error = None;
        self.export = None;
        Ok(())
    }

    /// Begin another export after success or failure, keeping the team.
    pub fn start_over(&mut self) -> Result<()> {
        self.expect(&[WizardStep::Done, WizardStep::Error], WizardStep::PickFile)?;
        self.step = if self.team_id.is_some() {
            WizardStep::PickFile
        } else if self.failed_step == Some(WizardStep::Connect) {
            WizardStep::Connect
        } else {
            WizardStep::LinkTeam
        };
        self.file_key = None;
        self.node_id = None;
        self.failed_step = None;
        self.last_error = None;
        self.export = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = FigmaWizard::new(&self.user_id);
    }

    pub fn progress(&self) -> Option<Vec<PhaseView>> {
        self.export.as_ref().map(|e| e.strip.view())
    }
}

/// The stored wizard, or a fresh one positioned by whether the user is
/// connected.
pub fn load_wizard(store: &Store, user_id: &str) -> Result<FigmaWizard> {
    if let Some(w) = store.get::<FigmaWizard>(user_id)? {
        return Ok(w);
    }
    let mut wizard = FigmaWizard::new(user_id);
    if let Some(conn) = get_connection(store, user_id)? {
        wizard.connected()?;
        if let Some(team) = conn.team_id {
            wizard.link_team(&team)?;
        }
    }
    Ok(wizard)
}

pub fn save_wizard(store: &Store, wizard: &mut FigmaWizard) -> Result<()> {
    wizard.updated_at = Utc::now();
    store.put(&*wizard)
}

/// Load, apply `f`, and save only when `f` succeeds.
pub fn update_wizard<T>(
    store: &Store,
    user_id: &str,
    f: impl FnOnce(&mut FigmaWizard) -> Result<T>,
) -> Result<(FigmaWizard, T)> {
    let mut wizard = load_wizard(store, user_id)?;
    let out = f(&mut wizard)?;
    save_wizard(store, &mut wizard)?;
    Ok((wizard, out))
}

/// Apply `f` to the stored wizard without saving the result. Callers check a
/// transition this way before doing remote work that depends on it.
pub fn check_transition<T>(
    store: &Store,
    user_id: &str,
    f: impl FnOnce(&mut FigmaWizard) -> Result<T>,
) -> Result<T> {
    let mut wizard = load_wizard(store, user_id)?;
    f(&mut wizard)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
