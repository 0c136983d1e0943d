//! LLM client implementations.
//!
//! - `anthropic` -- direct Anthropic Messages API client (primary tier)
//! - `openai_compat` -- OpenAI-compatible framework client (fallback tier)

pub mod anthropic;
pub mod openai_compat;
