//! Slack incoming-webhook connector.

use serde::Serialize;

use esalert_core::ExecutionContext;

use crate::action::{ActionKind, ActionRequest};
use crate::traits::{wrong_kind, Connector, NotifyError};
use crate::webhook::{check_status, http_client, resolve_env_vars};

#[derive(Debug, Serialize, PartialEq)]
struct SlackMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
}

/// Posts `slack` actions to one configured incoming webhook.
#[derive(Debug)]
pub struct SlackConnector {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackConnector {
    /// `${VAR}` references in the URL are resolved here.
    pub fn new(webhook_url: &str) -> Result<Self, NotifyError> {
        let webhook_url = resolve_env_vars(webhook_url)?;
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "Slack webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            webhook_url,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Connector for SlackConnector {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        action: &ActionRequest,
    ) -> Result<(), NotifyError> {
        let ActionRequest::Slack {
            text,
            channel,
            username,
            icon_emoji,
        } = action
        else {
            return Err(wrong_kind(ActionKind::Slack, action));
        };

        let message = SlackMessage {
            text,
            channel: channel.as_deref(),
            username: username.as_deref(),
            icon_emoji: icon_emoji.as_deref(),
        };
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;
        check_status("slack", response).await?;

        tracing::debug!(rule = %ctx.name, channel = ?channel, "slack message delivered");
        Ok(())
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Slack
    }
}
