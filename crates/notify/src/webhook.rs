//! Generic HTTP action connector.
//!
//! Sends the `http` action's body to its URL with its method and headers.
//! Environment variable references (`${VAR_NAME}`) in the URL and header
//! values are resolved before the request is built.

use std::collections::HashMap;
use std::time::Duration;

use esalert_core::ExecutionContext;

use crate::action::{ActionKind, ActionRequest};
use crate::traits::{wrong_kind, Connector, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared HTTP client used by the webhook-style connectors.
pub(crate) fn http_client() -> Result<reqwest::Client, NotifyError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Turn a non-2xx response into [`NotifyError::Status`].
pub(crate) async fn check_status(
    target: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    tracing::warn!(target_kind = target, %status, body = %body, "connector returned non-2xx status");
    Err(NotifyError::Status {
        target,
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client()?,
        })
    }

    fn build_request(
        &self,
        url: &str,
        method: &str,
        headers: &HashMap<String, String>,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder, NotifyError> {
        let method = method
            .to_uppercase()
            .parse::<reqwest::Method>()
            .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {method}")))?;
        let url = resolve_env_vars(url)?;

        let mut request = self.client.request(method, url);
        for (key, value) in headers {
            request = request.header(key.as_str(), resolve_env_vars(value)?);
        }
        request = match body {
            None => request,
            Some(serde_json::Value::String(text)) => request.body(text.clone()),
            Some(structured) => request.json(structured),
        };
        Ok(request)
    }
}

#[async_trait::async_trait]
impl Connector for HttpConnector {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        action: &ActionRequest,
    ) -> Result<(), NotifyError> {
        let ActionRequest::Http {
            url,
            method,
            headers,
            body,
        } = action
        else {
            return Err(wrong_kind(ActionKind::Http, action));
        };

        let response = self
            .build_request(url, method, headers, body.as_ref())?
            .send()
            .await?;
        let response = check_status("http", response).await?;

        tracing::debug!(
            rule = %ctx.name,
            %url,
            %method,
            status = %response.status(),
            "http action delivered"
        );
        Ok(())
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Http
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
