//! claimscope-retrieval — rate-limited biomedical literature retrieval.
//!
//! Turns a free-text claim into a ranked, deduplicated list of evidence
//! records: paginated PubMed search, batched summary fetch with per-id
//! failure collection, and best-effort PMC full text.

pub mod models;
pub mod pacing;
pub mod service;
pub mod sources;
pub mod tuning;

pub use models::{EvidenceRecord, FailedFetch, Retrieval, SearchResult, SummaryBatch};
pub use service::RetrievalService;
pub use sources::LiteratureSource;
pub use tuning::RetrievalTuning;
