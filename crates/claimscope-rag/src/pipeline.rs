//! Strategy contract for claim answering.

use async_trait::async_trait;
use claimscope_common::Result;
use claimscope_retrieval::EvidenceRecord;
use serde::Serialize;

/// An answer plus the exact evidence it was generated against.
///
/// `evidence` is the set of records the model actually saw, in prompt order,
/// so `[n]` citations in `text` resolve to `evidence[n - 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub text: String,
    pub evidence: Vec<EvidenceRecord>,
}

/// A claim-answering strategy. All-or-nothing: either a complete answer with
/// its evidence, or an error — never a generated answer with the evidence
/// trail missing.
#[async_trait]
pub trait RagStrategy: Send + Sync {
    async fn answer(&self, claim: &str, top_k: usize) -> Result<RagAnswer>;
}
