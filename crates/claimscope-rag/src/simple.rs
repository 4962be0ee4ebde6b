//! Single-pass strategy: retrieve once, prompt once, generate once.

use std::sync::Arc;

use async_trait::async_trait;
use claimscope_common::{ClaimscopeError, Result};
use claimscope_llm::{GenerationRequest, LlmBackend};
use claimscope_retrieval::RetrievalService;
use tracing::{debug, instrument};

use crate::pipeline::{RagAnswer, RagStrategy};
use crate::prompt::{build_prompt, PromptBudget, SYSTEM_PROMPT};

pub struct SimpleRag {
    retrieval: RetrievalService,
    backend: Arc<dyn LlmBackend>,
    budget: PromptBudget,
    include_full_text: bool,
}

impl SimpleRag {
    pub fn new(retrieval: RetrievalService, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            retrieval,
            backend,
            budget: PromptBudget::default(),
            include_full_text: false,
        }
    }

    pub fn with_budget(mut self, budget: PromptBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_full_text(mut self, include: bool) -> Self {
        self.include_full_text = include;
        self
    }
}

#[async_trait]
impl RagStrategy for SimpleRag {
    /// Retrieval errors abort before the backend is touched; generation
    /// errors surface as [`ClaimscopeError::Generation`].
    #[instrument(skip(self))]
    async fn answer(&self, claim: &str, top_k: usize) -> Result<RagAnswer> {
        let retrieval = self
            .retrieval
            .search(claim, top_k, self.include_full_text)
            .await?;
        debug!(
            records = retrieval.records.len(),
            failed = retrieval.failed.len(),
            "evidence retrieved"
        );

        let (user_prompt, included) = build_prompt(claim, &retrieval.records, &self.budget);
        let evidence: Vec<_> = included.into_iter().cloned().collect();

        let request = GenerationRequest::from_prompt(SYSTEM_PROMPT, user_prompt);
        let response = self
            .backend
            .complete(request)
            .await
            .map_err(|e| ClaimscopeError::Generation(e.to_string()))?;

        Ok(RagAnswer {
            text: response.content,
            evidence,
        })
    }
}
