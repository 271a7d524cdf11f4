use crate::models::CandidateCode;
use serde::Serialize;
use std::fmt;

/// Lifecycle of an acquisition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not started
    #[default]
    Idle,
    /// Acquiring the frame source
    Initializing,
    /// Loops are decoding frames
    Scanning,
    /// Loops are idle until resume or cooldown
    Paused,
    /// Session is over; the source has been released
    Terminated,
}

impl SessionState {
    /// Stable lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::Scanning => "scanning",
            SessionState::Paused => "paused",
            SessionState::Terminated => "terminated",
        }
    }

    /// Whether a transition from `self` to `next` is allowed
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, Scanning)
                | (Scanning, Paused)
                | (Paused, Scanning)
                | (Idle | Initializing | Scanning | Paused, Terminated)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State plus the generation token loops tag their work with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    /// Current state
    pub state: SessionState,
    /// Bumped on every transition out of `Scanning`
    pub generation: u64,
}

/// Kind of user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Scanned code is already stored for this product
    DuplicateWarning,
    /// Decoded text was unusable or the duplicate check failed
    DecodeError,
    /// Frame source failed to start
    InitError,
}

/// Event sent to the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A validated code, ready to be stored
    Candidate(CandidateCode),
    /// Throttled message for the user
    Notice {
        /// What happened
        kind: NoticeKind,
        /// Human-readable detail
        message: String,
    },
    /// The session moved to a new state
    StateChanged(SessionState),
}
