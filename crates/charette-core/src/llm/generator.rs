//! The text-generation trait both provider tiers implement.

use std::future::Future;

use charette_types::llm::{GenerationRequest, LlmError};

/// A single remote "prompt in, text out" call.
///
/// Implementations live in `charette-infra` (direct Anthropic client,
/// OpenAI-compatible framework client); tests use scripted mocks. The
/// resilient executor wraps any implementation with retries and backoff --
/// implementations should *not* retry internally.
pub trait TextGenerator: Send + Sync {
    /// Short provider name for log lines.
    fn name(&self) -> &str;

    /// Generate text for the request.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}
