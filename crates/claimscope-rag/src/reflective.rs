//! Iterative strategy: retrieve, ask the model for a sharper query, retrieve
//! again, and merge before the final generation.
//!
//! The first retrieval is load-bearing and its errors are fatal. Refinement
//! rounds are opportunistic: a failed refinement search just ends the loop
//! with the evidence gathered so far.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use claimscope_common::{ClaimscopeError, Result};
use claimscope_llm::{GenerationRequest, LlmBackend};
use claimscope_retrieval::{EvidenceRecord, RetrievalService};
use tracing::{debug, instrument};

use crate::pipeline::{RagAnswer, RagStrategy};
use crate::prompt::{build_prompt, PromptBudget, SYSTEM_PROMPT};

const REFINE_PROMPT: &str = "You are refining a PubMed search. Given a claim \
and the titles found so far, propose one sharper PubMed query that would \
surface evidence the current set is missing. Reply with the query text only. \
Reply with an empty line if the current evidence already covers the claim.";

pub struct ReflectiveRag {
    retrieval: RetrievalService,
    backend: Arc<dyn LlmBackend>,
    budget: PromptBudget,
    max_rounds: usize,
    include_full_text: bool,
}

impl ReflectiveRag {
    pub fn new(retrieval: RetrievalService, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            retrieval,
            backend,
            budget: PromptBudget::default(),
            max_rounds: 2,
            include_full_text: false,
        }
    }

    pub fn with_budget(mut self, budget: PromptBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_full_text(mut self, include: bool) -> Self {
        self.include_full_text = include;
        self
    }

    /// Ask the backend for a refined query. First non-empty line wins.
    async fn refine_query(&self, claim: &str, evidence: &[EvidenceRecord]) -> Result<Option<String>> {
        let titles: Vec<String> = evidence
            .iter()
            .map(|r| format!("- {}", r.title.trim()))
            .collect();
        let user = format!("Claim: {claim}\n\nTitles found so far:\n{}", titles.join("\n"));

        let response = self
            .backend
            .complete(GenerationRequest::from_prompt(REFINE_PROMPT, user))
            .await
            .map_err(|e| ClaimscopeError::Generation(e.to_string()))?;

        let refined = response
            .content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);
        Ok(refined)
    }
}

#[async_trait]
impl RagStrategy for ReflectiveRag {
    #[instrument(skip(self))]
    async fn answer(&self, claim: &str, top_k: usize) -> Result<RagAnswer> {
        let initial = self
            .retrieval
            .search(claim, top_k, self.include_full_text)
            .await?;

        let mut evidence = initial.records;
        let mut seen: HashSet<String> = evidence.iter().map(|r| r.pmid.clone()).collect();
        let mut last_query = claim.to_string();

        for round in 0..self.max_rounds {
            if evidence.len() >= self.budget.max_records {
                break;
            }
            let Some(refined) = self.refine_query(claim, &evidence).await? else {
                debug!(round, "model declined to refine, stopping");
                break;
            };
            if refined.eq_ignore_ascii_case(&last_query) {
                debug!(round, "refined query unchanged, stopping");
                break;
            }

            match self
                .retrieval
                .search(&refined, top_k, self.include_full_text)
                .await
            {
                Ok(extra) => {
                    let before = evidence.len();
                    for record in extra.records {
                        if evidence.len() >= self.budget.max_records {
                            break;
                        }
                        if seen.insert(record.pmid.clone()) {
                            evidence.push(record);
                        }
                    }
                    debug!(round, query = %refined, added = evidence.len() - before, "refinement round complete");
                }
                Err(err) => {
                    // Refinement retrieval is best-effort.
                    debug!(round, query = %refined, error = %err, "refinement search failed, stopping");
                    break;
                }
            }
            last_query = refined;
        }

        let (user_prompt, included) = build_prompt(claim, &evidence, &self.budget);
        let evidence: Vec<_> = included.into_iter().cloned().collect();

        let response = self
            .backend
            .complete(GenerationRequest::from_prompt(SYSTEM_PROMPT, user_prompt))
            .await
            .map_err(|e| ClaimscopeError::Generation(e.to_string()))?;

        Ok(RagAnswer {
            text: response.content,
            evidence,
        })
    }
}
