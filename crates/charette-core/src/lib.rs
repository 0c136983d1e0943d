//! Core engine for Charette: workflow orchestration, resilient LLM
//! execution, and structured result extraction.
//!
//! - `workflow` -- step catalog, workflow building/editing, session runner
//! - `llm` -- text-generation trait, retry/backoff executor, hybrid fallback
//! - `extract` -- section extraction from free-form model output
//!
//! Depends only on `charette-types`; all I/O implementations live in
//! `charette-infra`.

pub mod extract;
pub mod llm;
pub mod workflow;
