//! Shared domain types for Charette.
//!
//! This crate contains the core domain types used across the analysis
//! pipeline: AnalysisStep, Workflow, step history, and LLM request/outcome
//! types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod llm;
pub mod step;
pub mod workflow;
