//! Submit handler contract and submission outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

use formkit_types::{RecordErrors, RecordValues};

/// Host-supplied collaborator receiving the normalized value tree.
///
/// Timeouts and retries are the handler's business; the session awaits it
/// exactly once per accepted submit.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, values: RecordValues) -> Result<Option<serde_json::Value>, SubmitFailure>;
}

/// Reason a handler gave for failing a submission
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{reason}")]
pub struct SubmitFailure {
    pub reason: String,
}

impl SubmitFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for SubmitFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

/// A handler task that panicked or was cancelled
impl From<JoinError> for SubmitFailure {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return Self::new("submit handler was cancelled");
        }
        let payload = err.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        match detail {
            Some(detail) => Self::new(format!("submit handler panicked: {}", detail)),
            None => Self::new("submit handler panicked"),
        }
    }
}

/// What a call to `FormSession::submit` did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SubmitOutcome {
    /// Handler accepted the values
    Succeeded { result: Option<serde_json::Value> },
    /// Handler failed; the reason is shown as the form's root message
    Failed { reason: String },
    /// Re-validation at submit time found errors; the handler was not called
    Rejected { errors: RecordErrors },
    /// Another submission was in flight; nothing happened
    Ignored,
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Succeeded { .. })
    }

    /// True when the handler was actually invoked
    pub fn reached_handler(&self) -> bool {
        matches!(self, SubmitOutcome::Succeeded { .. } | SubmitOutcome::Failed { .. })
    }
}

/// One settled submission attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRecord {
    /// 1-based handler invocation number
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: SubmitOutcome,
}
