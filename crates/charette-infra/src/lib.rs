//! Infrastructure layer for Charette.
//!
//! Contains implementations of the collaborator traits defined in
//! `charette-core`: the two LLM client tiers, the config loader, and
//! filesystem session storage.

pub mod config;
pub mod llm;
pub mod store;
