//! Elasticsearch `_search` client.

use std::time::Duration;

use esalert_core::config::ElasticsearchConfig;
use esalert_core::SearchRequest;

use crate::client::{SearchClient, SearchError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    base_url: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl ElasticsearchClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: config.base_url(),
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// `{base}/{index}[/{type}]/_search`, or `{base}/_search` for an empty index.
    pub fn search_url(&self, request: &SearchRequest) -> String {
        let index = request.index.trim();
        let doc_type = request.doc_type.trim();
        match (index.is_empty(), doc_type.is_empty()) {
            (true, _) => format!("{}/_search", self.base_url),
            (false, true) => format!("{}/{}/_search", self.base_url, index),
            (false, false) => format!("{}/{}/{}/_search", self.base_url, index, doc_type),
        }
    }
}

#[async_trait::async_trait]
impl SearchClient for ElasticsearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<serde_json::Value, SearchError> {
        let url = self.search_url(request);
        let mut builder = self.client.post(&url).json(&request.query);
        if !self.user.is_empty() {
            builder = builder.basic_auth(&self.user, Some(&self.password));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(%url, %status, "search returned non-2xx status");
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Response(e.to_string()))?;
        tracing::debug!(
            %url,
            hits = %value.pointer("/hits/total").map(|t| t.to_string()).unwrap_or_default(),
            "search completed"
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Seen {
        calls: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    async fn typed_search(
        State(seen): State<Seen>,
        Path((index, doc_type)): Path<(String, String)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.calls
            .lock()
            .unwrap()
            .push((format!("{index}/{doc_type}"), auth, body));
        Json(json!({"hits": {"total": 1, "hits": [{"_source": {"level": "error"}}]}}))
    }

    async fn broken_search() -> (StatusCode, &'static str) {
        (StatusCode::BAD_REQUEST, "index_not_found_exception")
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    fn config(addr: String) -> ElasticsearchConfig {
        ElasticsearchConfig {
            addr,
            user: "elastic".to_string(),
            password: "changeme".to_string(),
        }
    }

    fn request(index: &str, doc_type: &str) -> SearchRequest {
        SearchRequest {
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            query: json!({"query": {"match_all": {}}}),
        }
    }

    #[test]
    fn search_url_variants() {
        let client = ElasticsearchClient::new(&config("es:9200".to_string())).unwrap();
        assert_eq!(client.search_url(&request("", "")), "http://es:9200/_search");
        assert_eq!(
            client.search_url(&request("logs-*", "")),
            "http://es:9200/logs-*/_search"
        );
        assert_eq!(
            client.search_url(&request("logs", "event")),
            "http://es:9200/logs/event/_search"
        );
    }

    #[tokio::test]
    async fn posts_query_with_basic_auth() {
        let seen = Seen::default();
        let router = Router::new()
            .route("/{index}/{doc_type}/_search", post(typed_search))
            .with_state(seen.clone());
        let addr = serve(router).await;

        let client = ElasticsearchClient::new(&config(addr)).unwrap();
        let result = client.search(&request("logs", "event")).await.unwrap();
        assert_eq!(result["hits"]["total"], 1);

        let calls = seen.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, auth, body) = &calls[0];
        assert_eq!(path, "logs/event");
        // base64("elastic:changeme")
        assert_eq!(auth.as_deref(), Some("Basic ZWxhc3RpYzpjaGFuZ2VtZQ=="));
        assert_eq!(body, &json!({"query": {"match_all": {}}}));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route("/{index}/_search", post(broken_search));
        let addr = serve(router).await;

        let client = ElasticsearchClient::new(&config(addr)).unwrap();
        let err = client.search(&request("missing", "")).await.unwrap_err();
        match err {
            SearchError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("index_not_found"));
            }
            other => panic!("expected Status error, got: {other:?}"),
        }
    }
}
