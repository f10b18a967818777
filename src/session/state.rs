//! Form State Types
//!
//! The session lifecycle as an explicit state machine plus the record of each
//! transition taken.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a form session is in its validate/submit lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    /// Mounted or settled; waiting for the next interaction
    #[default]
    Idle,
    /// Re-running validation over the whole tree
    Validating,
    Valid,
    /// Errors exist; submit is disabled
    Invalid,
    /// Waiting on the submit handler
    Submitting,
    SubmitSucceeded,
    SubmitFailed,
}

impl FormState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormState::Idle => "idle",
            FormState::Validating => "validating",
            FormState::Valid => "valid",
            FormState::Invalid => "invalid",
            FormState::Submitting => "submitting",
            FormState::SubmitSucceeded => "submit_succeeded",
            FormState::SubmitFailed => "submit_failed",
        }
    }

    /// Outcome of the last submission, returned to `Idle` on the next interaction
    pub fn is_settled(&self) -> bool {
        matches!(self, FormState::SubmitSucceeded | FormState::SubmitFailed)
    }

    /// Whether the state graph has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: FormState) -> bool {
        use FormState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Valid)
                | (Validating, Invalid)
                | (Valid, Validating)
                | (Invalid, Validating)
                | (Valid, Idle)
                | (Invalid, Idle)
                | (Valid, Submitting)
                | (Submitting, SubmitSucceeded)
                | (Submitting, SubmitFailed)
                | (SubmitSucceeded, Idle)
                | (SubmitFailed, Idle)
        )
    }
}

impl std::fmt::Display for FormState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: FormState,
    pub to: FormState,
    pub at: DateTime<Utc>,
    /// Event that caused it (`set_field age`, `submit`, ...)
    pub reason: String,
}
