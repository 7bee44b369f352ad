use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an editor session
///
/// `starting -> ready -> busy -> ready -> ... -> closed`. `failed` can be
/// entered from any state on a transport error and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Ready,
    Busy,
    Closed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Busy => "busy",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }

    /// Whether commands may be submitted in this state
    pub fn accepts_commands(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Busy)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Check whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Starting, Ready) | (Starting, Closed) => true,
            (Ready, Busy) | (Ready, Closed) => true,
            (Busy, Ready) | (Busy, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
