//! Workflow orchestration: catalog, builder, and session runner.
//!
//! - `catalog` -- the global step catalog and recommended ordering table
//! - `builder` -- suggestion and pure editing operations over a workflow
//! - `runner` -- session-scoped step execution, history, and feedback

pub mod builder;
pub mod catalog;
pub mod runner;
