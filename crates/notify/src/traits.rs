//! Connector trait definition and shared error types.

use esalert_core::ExecutionContext;

use crate::action::{ActionKind, ActionRequest};

/// Errors that can occur during action delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{target} returned {status}: {body}")]
    Status {
        target: &'static str,
        status: u16,
        body: String,
    },

    #[error("{target} rejected the message: {reason}")]
    Rejected { target: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Delivery mechanism for one action kind.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Perform one action. Called at most once per action per run.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        action: &ActionRequest,
    ) -> Result<(), NotifyError>;

    /// The action kind this connector handles.
    fn kind(&self) -> ActionKind;
}

/// Error for a connector handed an action of another kind.
pub(crate) fn wrong_kind(expected: ActionKind, action: &ActionRequest) -> NotifyError {
    NotifyError::Config(format!(
        "{expected} connector cannot execute a {} action",
        action.kind()
    ))
}
