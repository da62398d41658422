//! Decodes and executes a run's action list.
//!
//! Dispatch has two phases. Decoding turns every payload into an
//! [`ActionRequest`] and checks that a connector exists for it; one bad
//! payload rejects the whole list before anything is sent. Execution then
//! runs the actions strictly in order and stops at the first failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use esalert_core::config::NotifyConfig;
use esalert_core::ExecutionContext;

use crate::action::{ActionKind, ActionRequest};
use crate::dingding::DingdingConnector;
use crate::log::LogConnector;
use crate::slack::SlackConnector;
use crate::traits::{Connector, NotifyError};
use crate::webhook::HttpConnector;

/// A payload that cannot be turned into an executable action.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("action #{index} is malformed: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("action #{index} is of kind '{kind}' but no {kind} connector is configured")]
    NoConnector { index: usize, kind: ActionKind },
}

/// An action whose connector reported failure. Later actions were not attempted.
#[derive(Debug, thiserror::Error)]
#[error("action #{index} ({kind}) failed after {completed} succeeded: {source}")]
pub struct DispatchError {
    pub index: usize,
    pub kind: ActionKind,
    pub completed: usize,
    #[source]
    pub source: NotifyError,
}

/// Routes each action kind to its connector.
#[derive(Default)]
pub struct Dispatcher {
    connectors: HashMap<ActionKind, Arc<dyn Connector>>,
}

impl Dispatcher {
    /// Create a dispatcher with no connectors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Standard connector set: log and http always, Slack and DingTalk when
    /// their webhooks are configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::empty();
        dispatcher.register(Arc::new(LogConnector));
        dispatcher.register(Arc::new(HttpConnector::new()?));
        if let Some(url) = &config.slack_webhook {
            dispatcher.register(Arc::new(SlackConnector::new(url)?));
        }
        if let Some(url) = &config.dingding_webhook {
            dispatcher.register(Arc::new(DingdingConnector::new(url)?));
        }
        Ok(dispatcher)
    }

    /// Add or replace the connector for its action kind.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.kind(), connector);
    }

    pub fn has_connector(&self, kind: ActionKind) -> bool {
        self.connectors.contains_key(&kind)
    }

    /// Decode every payload, or none.
    pub fn decode(&self, payloads: &[serde_json::Value]) -> Result<Vec<ActionRequest>, DecodeError> {
        payloads
            .iter()
            .enumerate()
            .map(|(index, payload)| {
                let action = ActionRequest::decode(payload)
                    .map_err(|source| DecodeError::Malformed { index, source })?;
                if !self.has_connector(action.kind()) {
                    return Err(DecodeError::NoConnector {
                        index,
                        kind: action.kind(),
                    });
                }
                Ok(action)
            })
            .collect()
    }

    /// Execute decoded actions in order, stopping at the first failure.
    ///
    /// Returns the number of actions executed.
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        actions: &[ActionRequest],
    ) -> Result<usize, DispatchError> {
        for (index, action) in actions.iter().enumerate() {
            let kind = action.kind();
            let connector = self.connectors.get(&kind).ok_or_else(|| DispatchError {
                index,
                kind,
                completed: index,
                source: NotifyError::Config(format!("no {kind} connector configured")),
            })?;

            let start = Instant::now();
            let result = connector.execute(ctx, action).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    tracing::info!(rule = %ctx.name, action = %kind, index, duration_ms, "Action delivered");
                }
                Err(source) => {
                    tracing::warn!(
                        rule = %ctx.name,
                        action = %kind,
                        index,
                        error = %source,
                        duration_ms,
                        "Action failed, remaining actions skipped"
                    );
                    return Err(DispatchError {
                        index,
                        kind,
                        completed: index,
                        source,
                    });
                }
            }
        }
        Ok(actions.len())
    }
}
