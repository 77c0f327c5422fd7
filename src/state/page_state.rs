/// Page state definitions for tracking descriptor progress
///
/// Every descriptor moves through an explicit state machine. The same
/// states are persisted as the resumption cursor.
use std::fmt;

/// Represents the current state of a page descriptor in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Enqueued and waiting for a worker
    Pending,

    /// A fetch attempt is in flight
    Fetching,

    /// A transient failure occurred; waiting out the backoff
    Retrying,

    /// The payload arrived and is being parsed
    Parsing,

    /// Candidates are being folded into the entity table
    Reconciling,

    // ===== Terminal States =====
    /// Page completed and its candidates are journaled
    Done,

    /// Permanent fetch failure or unusable page
    Failed,
}

impl PageState {
    /// Returns true if no further processing will happen in this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if a transition from `self` to `next` is legal
    ///
    /// `Retrying -> Pending` and `Fetching -> Pending` are only used when a
    /// halted run is reset for resumption.
    pub fn can_transition_to(&self, next: PageState) -> bool {
        use PageState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Parsing)
                | (Fetching, Retrying)
                | (Fetching, Failed)
                | (Fetching, Pending)
                | (Retrying, Fetching)
                | (Retrying, Pending)
                | (Retrying, Failed)
                | (Parsing, Reconciling)
                | (Parsing, Failed)
                | (Reconciling, Done)
        )
    }

    /// Checks a transition, naming the descriptor in the error
    pub fn transition(&self, key: &str, next: PageState) -> crate::Result<PageState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(crate::HarvestError::InvalidTransition {
                key: key.to_string(),
                from: *self,
                to: next,
            })
        }
    }

    /// Converts the page state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Parsing => "parsing",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a page state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching" => Some(Self::Fetching),
            "retrying" => Some(Self::Retrying),
            "parsing" => Some(Self::Parsing),
            "reconciling" => Some(Self::Reconciling),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Fetching,
            Self::Retrying,
            Self::Parsing,
            Self::Reconciling,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
