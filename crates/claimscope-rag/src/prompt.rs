//! Grounded prompt assembly.
//!
//! Evidence goes into the prompt as numbered blocks; the instructions bind
//! the model to that evidence and to `[n]` citations. Budgets cap both the
//! record count and per-record length so a handful of full-text articles
//! cannot blow the context window.

use claimscope_retrieval::EvidenceRecord;
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "You are a biomedical evidence assessor. \
Judge the claim strictly against the numbered evidence excerpts provided. \
Cite supporting excerpts as [n]. Do not use outside knowledge. \
If the evidence is insufficient to judge the claim, answer UNKNOWN.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBudget {
    /// Maximum evidence records included in one prompt.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Per-record character cap; full text is truncated to fit.
    #[serde(default = "default_max_chars")]
    pub max_chars_per_record: usize,
}

fn default_max_records() -> usize {
    8
}
fn default_max_chars() -> usize {
    2_000
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            max_chars_per_record: default_max_chars(),
        }
    }
}

/// Render the user-side prompt: claim first, then numbered evidence blocks.
/// Returns the prompt and the records actually included, in citation order.
pub fn build_prompt<'a>(
    claim: &str,
    records: &'a [EvidenceRecord],
    budget: &PromptBudget,
) -> (String, Vec<&'a EvidenceRecord>) {
    let included: Vec<&EvidenceRecord> = records.iter().take(budget.max_records).collect();

    let mut prompt = format!("Claim: {claim}\n\n");
    if included.is_empty() {
        prompt.push_str(
            "No evidence could be retrieved for this claim. Answer UNKNOWN and say why.\n",
        );
        return (prompt, included);
    }

    prompt.push_str("Evidence:\n\n");
    for (index, record) in included.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", index + 1, record.title.trim()));
        if !record.authors.is_empty() {
            prompt.push_str(&format!("Authors: {}\n", record.authors.join(", ")));
        }
        if let Some(journal) = &record.journal {
            match record.pub_date {
                Some(date) => prompt.push_str(&format!("{journal}, {}\n", date.format("%Y"))),
                None => prompt.push_str(&format!("{journal}\n")),
            }
        }
        prompt.push_str(&format!("Source: {}\n", record.source_url()));

        // Prefer full text when present; the abstract is a subset of it.
        let body = record
            .full_text
            .as_deref()
            .or(record.abstract_text.as_deref())
            .unwrap_or("(no abstract available)");
        prompt.push_str(truncate_chars(body, budget.max_chars_per_record));
        prompt.push_str("\n\n");
    }

    prompt.push_str("Assess the claim against the evidence above.\n");
    (prompt, included)
}

/// Char-boundary-safe truncation.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
