//! Outbound integrations: the generative-AI provider and the chat/record relays.

pub mod gemini;
pub mod relay;

use async_trait::async_trait;

use crate::core::ChatMessage;
use crate::error::ProviderError;

pub use gemini::GeminiClient;
pub use relay::{ChatRelay, LocalResponder, RecordRelay, RelayOutcome, ViolationReport};

/// A fully assembled request for the AI: earlier transcript turns for
/// conversation framing, then one instruction carrying the workspace context
/// and the question.
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub history: Vec<ChatMessage>,
    pub instruction: String,
}

/// Something that turns an [`AiRequest`] into answer text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &AiRequest) -> Result<String, ProviderError>;
}
