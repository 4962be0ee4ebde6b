//! Operational constants for the retrieval stack.
//!
//! Page/batch ceilings and the over-fetch factor are deployment knobs, not
//! behavioral guarantees, so they live in a config struct with serde
//! defaults instead of hard-coded literals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalTuning {
    /// Maximum ids requested per esearch page (retmax per call).
    #[serde(default = "default_page_size")]
    pub esearch_page_size: usize,
    /// Maximum ids per efetch summary batch.
    #[serde(default = "default_batch_size")]
    pub efetch_batch_size: usize,
    /// Over-fetch multiplier applied to top_k before filtering, so dropped
    /// or failed records do not leave the result short.
    #[serde(default = "default_over_fetch")]
    pub over_fetch_factor: usize,
    /// Outbound HTTP timeout, seconds.
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Cap on stored full-text length, characters.
    #[serde(default = "default_full_text_chars")]
    pub max_full_text_chars: usize,
}

fn default_page_size() -> usize {
    100
}
fn default_batch_size() -> usize {
    50
}
fn default_over_fetch() -> usize {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_full_text_chars() -> usize {
    40_000
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            esearch_page_size: default_page_size(),
            efetch_batch_size: default_batch_size(),
            over_fetch_factor: default_over_fetch(),
            http_timeout_secs: default_timeout_secs(),
            max_full_text_chars: default_full_text_chars(),
        }
    }
}

impl RetrievalTuning {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
