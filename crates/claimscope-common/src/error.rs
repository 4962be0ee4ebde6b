use thiserror::Error;

/// Workspace-wide error taxonomy.
///
/// The retrieval variants map one-to-one onto pipeline phases so callers can
/// tell which phase failed: `InvalidQuery` / `TransientSearch` come out of
/// the literature client, `Retrieval` out of the retrieval service, and
/// `Generation` out of the RAG pipeline. Per-document enrichment failures are
/// never errors; they are collected as values (see `FailedFetch` in
/// claimscope-retrieval).
#[derive(Debug, Error)]
pub enum ClaimscopeError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query rejected by the literature index: {0}")]
    InvalidQuery(String),

    #[error("Transient search failure: {0}")]
    TransientSearch(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation backend failure: {0}")]
    Generation(String),

    #[error("Sandbox policy violation: {0}")]
    Security(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClaimscopeError {
    /// Whether the caller may reasonably retry the same call. Nothing in the
    /// workspace retries internally; this flag is how retryability surfaces.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClaimscopeError::TransientSearch(_) | ClaimscopeError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClaimscopeError>;
