//! Workflow and session-history domain types for Charette.
//!
//! A [`Workflow`] is the user-editable set of analysis steps selected for one
//! session. [`StepHistoryEntry`] records each completed step's prompt and raw
//! result; the most recent entry per step id is authoritative for re-display
//! and re-parsing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::{AnalysisStep, Objective, Purpose};

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// The ordered, user-editable set of steps selected for one analysis session.
///
/// `steps` holds the automatically suggested list; `added_ids` and
/// `removed_ids` record the user's explicit edits so re-suggestion never
/// resurrects a step the user deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 assigned when the session is created.
    pub id: Uuid,
    /// Why the session exists; fixes the required step set.
    pub purpose: Purpose,
    /// Selected emphases; each maps to extra recommended steps.
    pub objectives: BTreeSet<Objective>,
    /// Suggested steps plus any the user pulled in, ordered by `order`.
    pub steps: Vec<AnalysisStep>,
    /// Step ids the user explicitly removed; never re-suggested.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub removed_ids: BTreeSet<String>,
    /// Step ids the user pulled in from the catalog outside the automatic
    /// suggestion.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub added_ids: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Step execution state
// ---------------------------------------------------------------------------

/// UI-observable state of a single step within a session.
///
/// `Aborted` is not terminal -- the step may be re-run any number of times.
/// A `Completed` step stays `Completed` through feedback revisions; only its
/// recorded result changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

impl Default for StepState {
    fn default() -> Self {
        StepState::NotStarted
    }
}

// ---------------------------------------------------------------------------
// StepHistoryEntry
// ---------------------------------------------------------------------------

/// One completed step execution: the prompt that was sent and the raw result
/// that came back.
///
/// Append-only, except that an explicit re-run or feedback revision replaces
/// the entry's `result` in place (same step id). Parsed sections are always
/// re-derived from `result`, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepHistoryEntry {
    /// Id of the step this entry belongs to.
    pub step_id: String,
    /// Step title at the time of execution.
    pub title: String,
    /// The fully rendered prompt sent to the model.
    pub prompt: String,
    /// Raw model output, unmodified.
    pub result: String,
    /// When this entry was recorded (or last revised).
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Category of user feedback on a completed step's result.
///
/// Drives the revision prompt's instructions for how to rework the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// Request deeper analysis or a new angle on top of the existing result.
    AdditionalAnalysis,
    /// Fix errors or fill gaps in the existing result.
    Correction,
    /// Re-approach the question from a different perspective.
    AlternativePerspective,
    /// Change the structure or format of the answer.
    Restructure,
    /// Anything else; the feedback body carries the full request.
    Other,
}

impl FeedbackKind {
    /// Display name used in revision prompts and listings.
    pub fn display_name(&self) -> &'static str {
        match self {
            FeedbackKind::AdditionalAnalysis => "additional analysis",
            FeedbackKind::Correction => "correction",
            FeedbackKind::AlternativePerspective => "alternative perspective",
            FeedbackKind::Restructure => "restructure",
            FeedbackKind::Other => "other",
        }
    }
}

impl std::str::FromStr for FeedbackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "additional_analysis" => Ok(FeedbackKind::AdditionalAnalysis),
            "correction" => Ok(FeedbackKind::Correction),
            "alternative_perspective" => Ok(FeedbackKind::AlternativePerspective),
            "restructure" => Ok(FeedbackKind::Restructure),
            "other" => Ok(FeedbackKind::Other),
            other => Err(format!("invalid feedback kind: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural errors raised by workflow editing operations.
///
/// These are raised synchronously at the editing call site and never escape
/// into the execution path.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Attempt to remove a step the selected purpose requires.
    #[error("step '{0}' is required and cannot be removed")]
    PolicyViolation(String),

    /// Attempt to add a step id that is already in the workflow.
    #[error("step '{0}' is already in the workflow")]
    DuplicateStep(String),

    /// Step id not present in the workflow (or the global catalog, for add).
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    /// Attempt to move the first step up or the last step down.
    #[error("cannot move step '{0}' past the workflow boundary")]
    BoundaryMove(String),

    /// A step's declared dependency is not present in the same workflow.
    #[error("step '{step}' depends on '{dependency}', which is not in the workflow")]
    MissingDependency { step: String, dependency: String },
}
