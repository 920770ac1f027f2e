//! External text-completion providers.
//!
//! The orchestrator only sees [`ProviderClient`]; concrete clients are built
//! once at start-up and shared across requests.

use async_trait::async_trait;
use crate::error::ProviderError;
use crate::models::ProviderSlot;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Prompt used by cheap liveness probes.
pub const PROBE_PROMPT: &str = "ping";

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short identifier for logs and the attempt trail (e.g. "gemini").
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Position of this provider in the chain.
    fn slot(&self) -> ProviderSlot;

    /// Cheap reachability check. Must not cost a full prompt.
    async fn probe(&self) -> Result<(), ProviderError>;

    /// Sends the real prompt and returns the provider's text.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
