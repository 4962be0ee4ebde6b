//! Retrieval orchestration.
//!
//! The service turns a claim query into at most `top_k` usable evidence
//! records: over-fetch candidate ids, enrich in batches, drop what cannot
//! ground an answer, and optionally attach open-access full text. Summary
//! and full-text failures degrade the result instead of failing the call;
//! only a search that yields nothing at all is an error.

use std::collections::HashSet;
use std::sync::Arc;

use claimscope_common::{ClaimscopeError, Result};
use tracing::{debug, instrument, warn};

use crate::models::Retrieval;
use crate::sources::LiteratureSource;
use crate::tuning::RetrievalTuning;

pub struct RetrievalService {
    source: Arc<dyn LiteratureSource>,
    tuning: RetrievalTuning,
}

impl RetrievalService {
    pub fn new(source: Arc<dyn LiteratureSource>, tuning: RetrievalTuning) -> Self {
        Self { source, tuning }
    }

    /// Retrieve up to `top_k` usable evidence records for a query.
    ///
    /// Search errors propagate unchanged. An empty candidate list maps to
    /// [`ClaimscopeError::Retrieval`]. Everything after the candidate list is
    /// best-effort: per-id fetch failures land in `failed`, records without
    /// title or abstract are counted and dropped, and a full-text miss or
    /// error leaves the record abstract-only.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        include_full_text: bool,
    ) -> Result<Retrieval> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClaimscopeError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        let top_k = top_k.max(1);
        let want = top_k * self.tuning.over_fetch_factor.max(1);

        let found = self.source.search(query, want).await?;
        if found.pmids.is_empty() {
            return Err(ClaimscopeError::Retrieval(format!(
                "no documents matched query: {query}"
            )));
        }

        // Dedup first-wins so relevance order survives.
        let mut seen = HashSet::new();
        let candidates: Vec<String> = found
            .pmids
            .into_iter()
            .filter(|pmid| seen.insert(pmid.clone()))
            .collect();

        let mut batch = self.source.fetch_summaries(&candidates).await?;

        let mut records = Vec::with_capacity(top_k);
        let mut dropped_unusable = 0u32;
        for pmid in &candidates {
            if records.len() == top_k {
                break;
            }
            // Ids missing from the batch are already in `failed`.
            let Some(record) = batch.summaries.remove(pmid) else {
                continue;
            };
            if record.is_usable() {
                records.push(record);
            } else {
                debug!(%pmid, "dropping record with neither title nor abstract");
                dropped_unusable += 1;
            }
        }

        if include_full_text {
            // Only after truncation: full text is the expensive, rate-limited
            // leg and records past top_k never surface.
            for record in &mut records {
                let Some(pmcid) = record.pmcid.clone() else {
                    continue;
                };
                match self.source.fetch_full_text(&pmcid).await {
                    Ok(text) => record.full_text = text,
                    Err(err) => {
                        warn!(pmid = %record.pmid, %pmcid, error = %err, "full-text fetch failed");
                    }
                }
            }
        }

        debug!(
            returned = records.len(),
            failed = batch.failed.len(),
            dropped_unusable,
            "retrieval complete"
        );
        Ok(Retrieval {
            records,
            failed: batch.failed,
            dropped_unusable,
        })
    }
}
