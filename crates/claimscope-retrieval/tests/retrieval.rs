//! Retrieval service semantics: ordering, dedup, partial failure, and the
//! usable-record filter, against a scripted literature source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use claimscope_common::{ClaimscopeError, Result};
use claimscope_retrieval::models::{EvidenceRecord, FailedFetch, SearchResult, SummaryBatch};
use claimscope_retrieval::sources::LiteratureSource;
use claimscope_retrieval::{RetrievalService, RetrievalTuning};

struct StubSource {
    search_result: Result<SearchResult>,
    summaries: HashMap<String, EvidenceRecord>,
    failing_ids: Vec<String>,
    full_texts: HashMap<String, String>,
    full_text_calls: Mutex<Vec<String>>,
}

impl StubSource {
    fn new(pmids: &[&str]) -> Self {
        Self {
            search_result: Ok(SearchResult {
                pmids: pmids.iter().map(|s| s.to_string()).collect(),
                total_count: pmids.len() as u64,
            }),
            summaries: HashMap::new(),
            failing_ids: Vec::new(),
            full_texts: HashMap::new(),
            full_text_calls: Mutex::new(Vec::new()),
        }
    }

    fn with_record(mut self, pmid: &str, title: &str) -> Self {
        let mut record = EvidenceRecord::new(pmid);
        record.title = title.to_string();
        self.summaries.insert(pmid.to_string(), record);
        self
    }

    fn with_unusable(mut self, pmid: &str) -> Self {
        self.summaries
            .insert(pmid.to_string(), EvidenceRecord::new(pmid));
        self
    }

    fn with_failing(mut self, pmid: &str) -> Self {
        self.failing_ids.push(pmid.to_string());
        self
    }

    fn with_full_text(mut self, pmid: &str, pmcid: &str, text: &str) -> Self {
        if let Some(record) = self.summaries.get_mut(pmid) {
            record.pmcid = Some(pmcid.to_string());
        }
        self.full_texts.insert(pmcid.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl LiteratureSource for StubSource {
    async fn search(&self, _query: &str, max_results: usize) -> Result<SearchResult> {
        match &self.search_result {
            Ok(result) => Ok(SearchResult {
                pmids: result.pmids.iter().take(max_results).cloned().collect(),
                total_count: result.total_count,
            }),
            Err(err) => Err(ClaimscopeError::TransientSearch(err.to_string())),
        }
    }

    async fn fetch_summaries(&self, pmids: &[String]) -> Result<SummaryBatch> {
        let mut batch = SummaryBatch::default();
        for pmid in pmids {
            if self.failing_ids.contains(pmid) {
                batch.failed.push(FailedFetch {
                    pmid: pmid.clone(),
                    reason: "scripted failure".to_string(),
                });
            } else if let Some(record) = self.summaries.get(pmid) {
                batch.summaries.insert(pmid.clone(), record.clone());
            } else {
                batch.failed.push(FailedFetch {
                    pmid: pmid.clone(),
                    reason: "no article in efetch response".to_string(),
                });
            }
        }
        Ok(batch)
    }

    async fn fetch_full_text(&self, pmcid: &str) -> Result<Option<String>> {
        self.full_text_calls.lock().unwrap().push(pmcid.to_string());
        if pmcid == "PMC-BROKEN" {
            return Err(ClaimscopeError::TransientSearch("pmc down".to_string()));
        }
        Ok(self.full_texts.get(pmcid).cloned())
    }
}

fn service(source: StubSource) -> RetrievalService {
    RetrievalService::new(Arc::new(source), RetrievalTuning::default())
}

#[tokio::test]
async fn failed_summaries_degrade_the_result() {
    let source = StubSource::new(&["A", "B", "C", "D"])
        .with_record("A", "Alpha")
        .with_record("B", "Beta")
        .with_failing("C")
        .with_record("D", "Delta");

    let retrieval = service(source).search("claim", 10, false).await.unwrap();

    let pmids: Vec<&str> = retrieval.records.iter().map(|r| r.pmid.as_str()).collect();
    assert_eq!(pmids, vec!["A", "B", "D"]);
    assert_eq!(retrieval.failed.len(), 1);
    assert_eq!(retrieval.failed[0].pmid, "C");
    assert_eq!(retrieval.dropped_unusable, 0);
}

#[tokio::test]
async fn duplicates_keep_first_occurrence_order() {
    let source = StubSource::new(&["A", "B", "A", "C", "B"])
        .with_record("A", "Alpha")
        .with_record("B", "Beta")
        .with_record("C", "Gamma");

    let retrieval = service(source).search("claim", 10, false).await.unwrap();

    let pmids: Vec<&str> = retrieval.records.iter().map(|r| r.pmid.as_str()).collect();
    assert_eq!(pmids, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn result_is_truncated_to_top_k() {
    let source = StubSource::new(&["A", "B", "C", "D", "E"])
        .with_record("A", "Alpha")
        .with_record("B", "Beta")
        .with_record("C", "Gamma")
        .with_record("D", "Delta")
        .with_record("E", "Epsilon");

    let retrieval = service(source).search("claim", 2, false).await.unwrap();

    assert_eq!(retrieval.records.len(), 2);
    assert_eq!(retrieval.records[0].pmid, "A");
    assert_eq!(retrieval.records[1].pmid, "B");
}

#[tokio::test]
async fn unusable_records_are_dropped_and_counted() {
    let source = StubSource::new(&["A", "B", "C"])
        .with_record("A", "Alpha")
        .with_unusable("B")
        .with_record("C", "Gamma");

    let retrieval = service(source).search("claim", 10, false).await.unwrap();

    let pmids: Vec<&str> = retrieval.records.iter().map(|r| r.pmid.as_str()).collect();
    assert_eq!(pmids, vec!["A", "C"]);
    assert_eq!(retrieval.dropped_unusable, 1);
}

#[tokio::test]
async fn empty_query_is_rejected_before_any_call() {
    let source = StubSource::new(&["A"]).with_record("A", "Alpha");
    let err = service(source)
        .search("   ", 5, false)
        .await
        .expect_err("should reject");
    assert!(matches!(err, ClaimscopeError::InvalidQuery(_)));
}

#[tokio::test]
async fn zero_candidates_is_a_retrieval_error() {
    let source = StubSource::new(&[]);
    let err = service(source)
        .search("no such thing", 5, false)
        .await
        .expect_err("should fail");
    assert!(matches!(err, ClaimscopeError::Retrieval(_)));
}

#[tokio::test]
async fn search_errors_propagate_unchanged() {
    let mut source = StubSource::new(&[]);
    source.search_result = Err(ClaimscopeError::TransientSearch("down".to_string()));
    let err = service(source)
        .search("claim", 5, false)
        .await
        .expect_err("should fail");
    assert!(matches!(err, ClaimscopeError::TransientSearch(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn full_text_is_attached_only_to_surfaced_records() {
    let source = StubSource::new(&["A", "B", "C"])
        .with_record("A", "Alpha")
        .with_record("B", "Beta")
        .with_record("C", "Gamma")
        .with_full_text("A", "PMC1", "full body A")
        .with_full_text("C", "PMC3", "full body C");

    let retrieval = service(source).search("claim", 2, true).await.unwrap();

    assert_eq!(retrieval.records.len(), 2);
    assert_eq!(retrieval.records[0].full_text.as_deref(), Some("full body A"));
    // B has no PMCID: no call, no text.
    assert!(retrieval.records[1].full_text.is_none());
}

#[tokio::test]
async fn full_text_failure_is_not_fatal() {
    let source = StubSource::new(&["A", "B"])
        .with_record("A", "Alpha")
        .with_record("B", "Beta")
        .with_full_text("B", "PMC2", "full body B");
    let source = {
        let mut s = source;
        if let Some(record) = s.summaries.get_mut("A") {
            record.pmcid = Some("PMC-BROKEN".to_string());
        }
        s
    };

    let retrieval = service(source).search("claim", 5, true).await.unwrap();

    assert_eq!(retrieval.records.len(), 2);
    assert!(retrieval.records[0].full_text.is_none());
    assert_eq!(retrieval.records[1].full_text.as_deref(), Some("full body B"));
}

#[tokio::test]
async fn repeated_searches_are_idempotent() {
    let source = Arc::new(
        StubSource::new(&["A", "B"])
            .with_record("A", "Alpha")
            .with_record("B", "Beta"),
    );
    let service = RetrievalService::new(source, RetrievalTuning::default());

    let first = service.search("claim", 5, false).await.unwrap();
    let second = service.search("claim", 5, false).await.unwrap();

    assert_eq!(first.records, second.records);
    assert_eq!(first.failed, second.failed);
}
