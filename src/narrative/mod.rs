//! Narrative insights from an LLM chat endpoint.
//!
//! The [`Completion`] trait is the seam; [`client::ChatClient`] talks to
//! OpenAI-compatible or Ollama servers and [`NarrativeService`] turns every
//! failure into a readable fallback message.

pub mod client;
pub mod prompt;
pub mod service;

pub use client::{ChatConfig, LlmProvider};
pub use prompt::DatasetKind;
pub use service::NarrativeService;

use crate::error::NarrativeError;
use async_trait::async_trait;

/// A single system + user exchange with a chat model.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, NarrativeError>;
}
