//! Evidence data model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One retrieved literature document, normalized.
///
/// `abstract_text` and `full_text` may both be absent: enrichment is
/// best-effort and records degrade rather than disappear. A record with
/// neither a title nor an abstract is unusable and is dropped by the
/// retrieval service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceRecord {
    pub pmid: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub doi: Option<String>,
    pub pmcid: Option<String>,
    pub full_text: Option<String>,
}

impl EvidenceRecord {
    pub fn new(pmid: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            title: String::new(),
            abstract_text: None,
            authors: Vec::new(),
            journal: None,
            pub_date: None,
            doi: None,
            pmcid: None,
            full_text: None,
        }
    }

    /// Usable records carry at least a title or an abstract; anything less
    /// cannot ground an answer.
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty()
            || self
                .abstract_text
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty())
    }

    pub fn has_full_text(&self) -> bool {
        self.full_text.is_some()
    }

    /// Link to the document. Priority: DOI > PMC > PubMed landing page.
    pub fn source_url(&self) -> String {
        if let Some(doi) = &self.doi {
            format!("https://doi.org/{doi}")
        } else if let Some(pmcid) = &self.pmcid {
            format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/")
        } else {
            format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid)
        }
    }
}

/// Ranked PMIDs from one search, in remote relevance order, plus the index's
/// total hit count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub pmids: Vec<String>,
    pub total_count: u64,
}

/// One id that could not be enriched. Collected, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedFetch {
    pub pmid: String,
    pub reason: String,
}

/// Outcome of a batched summary fetch: whatever succeeded, plus the ids that
/// did not.
#[derive(Debug, Clone, Default)]
pub struct SummaryBatch {
    pub summaries: std::collections::HashMap<String, EvidenceRecord>,
    pub failed: Vec<FailedFetch>,
}

/// Final output of [`crate::RetrievalService::search`].
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Usable records in remote relevance order, deduplicated, at most top_k.
    pub records: Vec<EvidenceRecord>,
    /// Ids whose summary fetch failed.
    pub failed: Vec<FailedFetch>,
    /// Records dropped for having neither title nor abstract.
    pub dropped_unusable: u32,
}
