//! claimscope-llm — generation backend abstraction.
//!
//! Implements the [`backend::LlmBackend`] trait over OpenAI-compatible chat
//! endpoints, local (Ollama) and remote.

pub mod backend;

pub use backend::{
    GenerationRequest, GenerationResponse, LlmBackend, LlmError, Message, OllamaBackend,
    OpenAiCompatibleBackend,
};
