//! CLI command definitions and dispatch for the `charette` binary.
//!
//! Uses clap derive macros for argument parsing. Workflow editing commands
//! operate on the targeted session (`--session`, defaulting to the most
//! recent one) and persist the edited workflow back to the store.

pub mod run;
pub mod session;
pub mod steps;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use charette_types::step::{Objective, Purpose};
use charette_types::workflow::FeedbackKind;

/// Architecture proposal analysis sessions, one step at a time.
#[derive(Parser)]
#[command(name = "charette", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Session to operate on (defaults to the most recent one).
    #[arg(long, global = true)]
    pub session: Option<Uuid>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new analysis session with a suggested workflow.
    New {
        /// Session purpose (competition, feasibility, proposal).
        #[arg(long)]
        purpose: Purpose,

        /// Analysis objective; repeat for several (site_understanding,
        /// design_concept, space_program, cost_planning, branding).
        #[arg(long = "objective")]
        objectives: Vec<Objective>,

        /// Project name.
        #[arg(long)]
        name: Option<String>,

        /// Building type (e.g. "mixed-use", "office").
        #[arg(long)]
        building_type: Option<String>,

        /// Site location.
        #[arg(long)]
        location: Option<String>,

        /// Owner / client name.
        #[arg(long)]
        owner: Option<String>,

        /// Site area (free text, e.g. "4,200 sqm").
        #[arg(long)]
        site_area: Option<String>,

        /// One-line project goal.
        #[arg(long)]
        goal: Option<String>,
    },

    /// List stored sessions.
    #[command(alias = "ls")]
    Sessions,

    /// List every step in the global catalog.
    Catalog,

    /// Show the session's step list with progress.
    Steps,

    /// Add a catalog step to the session's workflow.
    Add {
        /// Catalog step id (see `charette catalog`).
        step_id: String,
    },

    /// Remove a step from the session's workflow.
    #[command(alias = "rm")]
    Remove {
        /// Step id to remove.
        step_id: String,
    },

    /// Move a step one position up or down.
    Move {
        /// Step id to move.
        step_id: String,

        /// Direction to move the step.
        direction: MoveArg,
    },

    /// Renormalize step order numbers to multiples of 10.
    Renumber,

    /// Re-sort steps into the recommended chain-of-thought order.
    Sort,

    /// Run one analysis step (defaults to the next incomplete step).
    Run {
        /// Step id to run; omit to run the next incomplete step.
        step_id: Option<String>,
    },

    /// Show a completed step's result, split into its sections.
    Show {
        /// Step id to display.
        step_id: String,
    },

    /// Revise a completed step's result from feedback.
    Feedback {
        /// Step id the feedback applies to.
        step_id: String,

        /// Kind of revision (additional_analysis, correction,
        /// alternative_perspective, restructure, other).
        #[arg(long, default_value = "other")]
        kind: FeedbackKind,

        /// The feedback text.
        message: String,
    },

    /// Show the session's execution history.
    History,
}

/// CLI-facing move direction.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MoveArg {
    Up,
    Down,
}

impl From<MoveArg> for charette_core::workflow::builder::MoveDirection {
    fn from(arg: MoveArg) -> Self {
        match arg {
            MoveArg::Up => Self::Up,
            MoveArg::Down => Self::Down,
        }
    }
}
