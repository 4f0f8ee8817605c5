//! Question answering over a loaded dataset, with fallback messages.

use super::client::{ChatClient, ChatConfig};
use super::prompt::{system_prompt, DatasetKind};
use super::Completion;
use crate::error::NarrativeError;
use serde_json::Value;
use tracing::{info, warn};

pub const NOT_CONFIGURED_MESSAGE: &str = "AI analysis is not available. Please configure the OPENAI_API_KEY environment variable to enable AI features.";
pub const KEY_PROBLEM_MESSAGE: &str =
    "AI service is temporarily unavailable. Please check the API key configuration.";
pub const TECHNICAL_DIFFICULTIES_MESSAGE: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again later.";

/// Answers questions about a dataset. Never fails: errors become one of the
/// fallback messages above.
pub struct NarrativeService {
    completion: Option<Box<dyn Completion>>,
}

impl NarrativeService {
    pub fn new(completion: Box<dyn Completion>) -> Self {
        Self {
            completion: Some(completion),
        }
    }

    /// A service that answers every question with the not-configured notice.
    pub fn unconfigured() -> Self {
        Self { completion: None }
    }

    pub fn from_config(config: ChatConfig) -> Self {
        match ChatClient::new(config) {
            Ok(client) => Self::new(Box::new(client)),
            Err(e) => {
                warn!("Narrative insights disabled: {}", e);
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.completion.is_some()
    }

    pub async fn ask(&self, question: &str, dataset: &Value, kind: DatasetKind) -> String {
        let Some(completion) = &self.completion else {
            return NOT_CONFIGURED_MESSAGE.to_string();
        };

        let system = system_prompt(kind, dataset);
        match completion.complete(&system, question).await {
            Ok(text) => {
                info!("Received narrative ({} chars)", text.len());
                text
            }
            Err(e) => {
                warn!("Narrative request failed: {}", e);
                fallback_message(&e).to_string()
            }
        }
    }
}

fn fallback_message(error: &NarrativeError) -> &'static str {
    match error {
        NarrativeError::NotConfigured(_) => NOT_CONFIGURED_MESSAGE,
        NarrativeError::Auth(_) => KEY_PROBLEM_MESSAGE,
        _ => TECHNICAL_DIFFICULTIES_MESSAGE,
    }
}
