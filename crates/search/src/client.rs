use esalert_core::SearchRequest;

/// Errors returned by a search backend.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid search response: {0}")]
    Response(String),
}

/// Executes rendered search parameters and returns the raw response.
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<serde_json::Value, SearchError>;
}
