//! LLM execution: the generation trait, retry/backoff executor, and
//! two-tier hybrid fallback.

pub mod generator;
pub mod resilient;

/// Default model when the config does not name one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Output token cap for a model id.
///
/// Newer models accept longer analysis answers; anything unrecognized gets
/// the conservative default.
pub fn max_tokens_for(model: &str) -> u32 {
    match model {
        "claude-sonnet-4-20250514" | "claude-opus-4-20250514" => 12_000,
        "claude-3-7-sonnet-20250219" => 8_192,
        _ => 8_192,
    }
}
