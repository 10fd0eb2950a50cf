//! Progressive strip: the three-phase Upload → Applying → Verified status
//! shown while an export runs.

use crate::error::{LukeError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Upload,
    Applying,
    Verified,
}

impl ProgressPhase {
    pub const ALL: [ProgressPhase; 3] = [
        ProgressPhase::Upload,
        ProgressPhase::Applying,
        ProgressPhase::Verified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressPhase::Upload => "upload",
            ProgressPhase::Applying => "applying",
            ProgressPhase::Verified => "verified",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProgressPhase::Upload => "Upload",
            ProgressPhase::Applying => "Applying",
            ProgressPhase::Verified => "Verified",
        }
    }

    fn next(self) -> Option<ProgressPhase> {
        match self {
            ProgressPhase::Upload => Some(ProgressPhase::Applying),
            ProgressPhase::Applying => Some(ProgressPhase::Verified),
            ProgressPhase::Verified => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Complete,
    Active,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseView {
    pub phase: ProgressPhase,
    pub label: &'static str,
    pub state: PhaseState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStrip {
    pub phase: ProgressPhase,
    #[serde(default)]
    pub failed: bool,
}

impl Default for ProgressStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStrip {
    pub fn new() -> Self {
        Self {
            phase: ProgressPhase::Upload,
            failed: false,
        }
    }

    /// Move to the next phase. Verified is terminal; a failed strip cannot
    /// advance.
    pub fn advance(&mut self) -> Result<ProgressPhase> {
        if self.failed {
            return Err(self.invalid("advance", "strip has failed"));
        }
        let next = self
            .phase
            .next()
            .ok_or_else(|| self.invalid("advance", "already verified"))?;
        self.phase = next;
        Ok(next)
    }

    /// Mark the current phase as failed.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn is_verified(&self) -> bool {
        self.phase == ProgressPhase::Verified && !self.failed
    }

    /// Per-phase view for rendering. The current phase is active (or failed);
    /// verified is reported complete once reached.
    pub fn view(&self) -> Vec<PhaseView> {
        ProgressPhase::ALL
            .iter()
            .map(|&phase| {
                let state = if phase < self.phase {
                    PhaseState::Complete
                } else if phase > self.phase {
                    PhaseState::Pending
                } else if self.failed {
                    PhaseState::Failed
                } else if phase == ProgressPhase::Verified {
                    PhaseState::Complete
                } else {
                    PhaseState::Active
                };
                PhaseView {
                    phase,
                    label: phase.label(),
                    state,
                }
            })
            .collect()
    }

    fn invalid(&self, to: &str, reason: &str) -> LukeError {
        LukeError::InvalidTransition {
            from: self.phase.as_str().to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(strip: &ProgressStrip) -> Vec<PhaseState> {
        strip.view().into_iter().map(|v| v.state).collect()
    }

    #[test]
    fn advances_forward_to_verified() {
        let mut strip = ProgressStrip::new();
        assert_eq!(
            states(&strip),
            vec![PhaseState::Active, PhaseState::Pending, PhaseState::Pending]
        );
        assert_eq!(strip.advance().unwrap(), ProgressPhase::Applying);
        assert_eq!(strip.advance().unwrap(), ProgressPhase::Verified);
        assert!(strip.is_verified());
        assert_eq!(states(&strip), vec![PhaseState::Complete; 3]);
        assert!(strip.advance().is_err());
    }

    #[test]
    fn failure_marks_current_phase() {
        let mut strip = ProgressStrip::new();
        strip.advance().unwrap();
        strip.fail();
        assert_eq!(
            states(&strip),
            vec![PhaseState::Complete, PhaseState::Failed, PhaseState::Pending]
        );
        assert!(!strip.is_verified());
        assert!(matches!(
            strip.advance(),
            Err(LukeError::InvalidTransition { .. })
        ));
    }
}
