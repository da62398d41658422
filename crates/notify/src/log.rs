//! Log action connector: writes the message as a structured log line.

use esalert_core::ExecutionContext;

use crate::action::{ActionKind, ActionRequest};
use crate::traits::{wrong_kind, Connector, NotifyError};

#[derive(Debug, Default)]
pub struct LogConnector;

#[async_trait::async_trait]
impl Connector for LogConnector {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        action: &ActionRequest,
    ) -> Result<(), NotifyError> {
        let ActionRequest::Log { message } = action else {
            return Err(wrong_kind(ActionKind::Log, action));
        };
        tracing::info!(rule = %ctx.name, action = "log", "{message}");
        Ok(())
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Log
    }
}
