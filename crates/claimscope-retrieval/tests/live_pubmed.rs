//! Live E-utilities smoke test.
//!
//! Hits the real NCBI endpoints. Run with:
//! ```bash
//! cargo test --package claimscope-retrieval --test live_pubmed -- --ignored --nocapture
//! ```

use std::sync::Arc;

use claimscope_common::NcbiCredentials;
use claimscope_retrieval::sources::pubmed::PubMedClient;
use claimscope_retrieval::{RetrievalService, RetrievalTuning};

#[tokio::test]
#[ignore] // Requires network access to NCBI
async fn live_retrieval_smoke() {
    let credentials = NcbiCredentials::resolve(None, None, true).unwrap();
    let client = PubMedClient::new(credentials, RetrievalTuning::default()).unwrap();
    let service = RetrievalService::new(Arc::new(client), RetrievalTuning::default());

    let retrieval = service
        .search("aspirin cardiovascular prevention", 3, false)
        .await
        .unwrap();

    println!(
        "retrieved {} records, {} failed",
        retrieval.records.len(),
        retrieval.failed.len()
    );
    assert!(!retrieval.records.is_empty());
    for record in &retrieval.records {
        println!("- [{}] {}", record.pmid, record.title);
        assert!(record.is_usable());
    }
}
