use std::time::Duration;

use esalert_notify::{DecodeError, DispatchError};
use esalert_rules::templates::RenderError;
use esalert_script::ScriptError;
use esalert_search::SearchError;

/// Why a single run stopped. Each variant names the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("render failure: {0}")]
    Render(#[from] RenderError),

    #[error("search failure: {0}")]
    Search(#[from] SearchError),

    #[error("evaluation failure: {0}")]
    Evaluation(#[from] ScriptError),

    #[error("decode failure: {0}")]
    Decode(#[from] DecodeError),

    #[error("dispatch failure: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("run abandoned after {0:?}")]
    Timeout(Duration),
}

impl RunError {
    /// Pipeline stage label used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            RunError::Render(_) => "render",
            RunError::Search(_) => "search",
            RunError::Evaluation(_) => "evaluation",
            RunError::Decode(_) => "decode",
            RunError::Dispatch(_) => "dispatch",
            RunError::Timeout(_) => "timeout",
        }
    }
}
