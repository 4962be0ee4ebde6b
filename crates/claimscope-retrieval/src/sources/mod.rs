//! Literature source clients.

pub mod pubmed;

use async_trait::async_trait;
use claimscope_common::Result;

use crate::models::{SearchResult, SummaryBatch};

/// Common interface for literature source clients.
///
/// `search` returns ranked ids only; metadata is fetched separately so that
/// enrichment failures never cost the candidate list. Implementations report
/// per-id summary failures inside [`SummaryBatch`] and reserve `Err` for
/// call-level failures.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Search for documents matching a query. Ids come back in the remote
    /// index's relevance order.
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResult>;

    /// Fetch title/abstract metadata for a set of ids, batched internally.
    async fn fetch_summaries(&self, pmids: &[String]) -> Result<SummaryBatch>;

    /// Fetch open-access full text by PMC id. `Ok(None)` means the document
    /// is not in the open-access subset — a common, expected outcome, as
    /// opposed to a transport failure.
    async fn fetch_full_text(&self, pmcid: &str) -> Result<Option<String>>;
}
