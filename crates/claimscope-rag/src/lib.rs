//! claimscope-rag — retrieval-augmented claim answering.
//!
//! Strategies implement [`pipeline::RagStrategy`]: retrieve evidence for a
//! claim, build a grounded prompt, and generate an answer that cites the
//! evidence it was shown.

pub mod pipeline;
pub mod prompt;
pub mod reflective;
pub mod simple;

pub use pipeline::{RagAnswer, RagStrategy};
pub use prompt::PromptBudget;
pub use reflective::ReflectiveRag;
pub use simple::SimpleRag;
