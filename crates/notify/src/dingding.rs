//! DingTalk custom-robot connector.
//!
//! Messages are sent as `text` messages. The robot API answers 200 even for
//! rejected messages, so a non-zero `errcode` in the reply is also a failure.

use serde::{Deserialize, Serialize};

use esalert_core::ExecutionContext;

use crate::action::{ActionKind, ActionRequest};
use crate::traits::{wrong_kind, Connector, NotifyError};
use crate::webhook::{check_status, http_client, resolve_env_vars};

#[derive(Debug, Serialize)]
struct RobotMessage<'a> {
    msgtype: &'static str,
    text: RobotText<'a>,
    at: RobotAt<'a>,
}

#[derive(Debug, Serialize)]
struct RobotText<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RobotAt<'a> {
    at_mobiles: &'a [String],
    is_at_all: bool,
}

#[derive(Debug, Deserialize)]
struct RobotReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug)]
pub struct DingdingConnector {
    webhook_url: String,
    client: reqwest::Client,
}

impl DingdingConnector {
    /// `${VAR}` references in the URL are resolved here.
    pub fn new(webhook_url: &str) -> Result<Self, NotifyError> {
        let webhook_url = resolve_env_vars(webhook_url)?;
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "DingTalk webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            webhook_url,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Connector for DingdingConnector {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        action: &ActionRequest,
    ) -> Result<(), NotifyError> {
        let ActionRequest::Dingding {
            text,
            at_mobiles,
            is_at_all,
        } = action
        else {
            return Err(wrong_kind(ActionKind::Dingding, action));
        };

        let message = RobotMessage {
            msgtype: "text",
            text: RobotText { content: text },
            at: RobotAt {
                at_mobiles,
                is_at_all: *is_at_all,
            },
        };
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;
        let response = check_status("dingding", response).await?;

        // An empty or non-JSON 2xx body is taken as accepted.
        let body = response.text().await?;
        if let Ok(reply) = serde_json::from_str::<RobotReply>(&body) {
            if reply.errcode != 0 {
                return Err(NotifyError::Rejected {
                    target: "dingding",
                    reason: format!("errcode {}: {}", reply.errcode, reply.errmsg),
                });
            }
        }

        tracing::debug!(rule = %ctx.name, "dingding message delivered");
        Ok(())
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Dingding
    }
}
