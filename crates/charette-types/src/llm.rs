//! LLM request and outcome types for Charette.
//!
//! [`GenerationRequest`] is the single request shape both generation tiers
//! accept. [`GenerationOutcome`] is the tagged result the resilient executor
//! returns: success, a retryable degenerate answer, or a terminal failure --
//! callers branch on the tag instead of scanning for marker prefixes.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// A single text-generation request.
///
/// The prompt is treated as opaque: the core passes it through unmodified,
/// with no knowledge of the renderer's templating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model id (e.g. "claude-sonnet-4-20250514").
    pub model: String,
    /// Fully rendered user prompt.
    pub prompt: String,
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Output token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors from an LLM provider call.
///
/// The retry layer distinguishes `RateLimited` and `Overloaded` from the
/// rest to pick the backoff schedule; `AuthenticationFailed` and
/// `InvalidRequest` are terminal and never retried.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// Whether retrying this error can plausibly succeed.
    ///
    /// Auth and request-shape errors are deterministic; everything else is
    /// assumed transient.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            LlmError::AuthenticationFailed | LlmError::InvalidRequest(_)
        )
    }
}

// ---------------------------------------------------------------------------
// GenerationOutcome
// ---------------------------------------------------------------------------

/// Tagged result of a resilient generation: the executor never raises to its
/// caller, it always returns one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Usable text came back.
    Ok { text: String },
    /// The retry budget ran out on a degenerate-but-successful answer; the
    /// last observed text is carried verbatim so callers can inspect it.
    Retryable { last_text: String },
    /// A terminal failure: auth/request error, or an unrecoverable error on
    /// the final attempt.
    Fatal { reason: String },
}

impl GenerationOutcome {
    /// Whether this outcome carries usable text.
    pub fn is_ok(&self) -> bool {
        matches!(self, GenerationOutcome::Ok { .. })
    }

    /// The successful text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Ok { text } => Some(text),
            _ => None,
        }
    }

    /// Human-readable failure reason for non-`Ok` outcomes.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            GenerationOutcome::Ok { .. } => None,
            GenerationOutcome::Retryable { last_text } => Some(format!(
                "exhausted retries on a degenerate answer: {}",
                truncate(last_text, 120)
            )),
            GenerationOutcome::Fatal { reason } => Some(reason.clone()),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}
