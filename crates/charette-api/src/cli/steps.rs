//! Workflow editing commands: `steps`, `catalog`, `add`, `remove`, `move`,
//! and `renumber`.
//!
//! Every edit loads the targeted session's workflow, applies one builder
//! operation, and persists the result. The builder copies before mutating,
//! so a rejected edit leaves the stored workflow untouched.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use charette_core::workflow::builder::{MoveDirection, WorkflowBuilder};
use charette_core::workflow::catalog;
use charette_core::workflow::runner::SessionStore;
use charette_types::step::RequirementLevel;
use charette_types::workflow::{StepHistoryEntry, Workflow};

use crate::state::AppState;

use super::session::short_id;

/// Show the session's step list with completion markers.
pub async fn list_steps(state: &AppState, session_id: Uuid, json: bool) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;
    let steps = WorkflowBuilder::final_steps(&workflow);
    let completed = |id: &str| history.iter().any(|e| e.step_id == id);

    if json {
        let out: Vec<_> = steps
            .iter()
            .map(|s| {
                serde_json::json!({
                    "order": s.order,
                    "id": s.id,
                    "title": s.title,
                    "requirement": s.requirement.to_string(),
                    "completed": completed(&s.id),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Title"),
            Cell::new("Requirement"),
            Cell::new("Status"),
        ]);

    for step in &steps {
        let status = if completed(&step.id) {
            Cell::new("done").fg(Color::Green)
        } else {
            Cell::new("-")
        };
        table.add_row(vec![
            Cell::new(step.order),
            Cell::new(&step.id),
            Cell::new(&step.title),
            Cell::new(step.requirement.to_string()),
            status,
        ]);
    }

    let done = steps.iter().filter(|s| completed(&s.id)).count();
    println!();
    println!(
        "  Session '{}' -- {}/{} steps completed",
        style(short_id(&workflow.id.to_string())).cyan(),
        done,
        steps.len()
    );
    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// List the full step catalog.
pub fn list_catalog(json: bool) -> Result<()> {
    let steps: Vec<_> = catalog::catalog_ids()
        .into_iter()
        .filter_map(|id| catalog::catalog_step(id, RequirementLevel::Optional))
        .collect();

    if json {
        let out: Vec<_> = steps
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "title": s.title,
                    "category": s.category,
                    "dependencies": s.dependencies,
                    "sections": s.output_sections,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Title"),
            Cell::new("Category"),
            Cell::new("Depends on"),
        ]);

    for step in &steps {
        table.add_row(vec![
            Cell::new(&step.id),
            Cell::new(&step.title),
            Cell::new(&step.category),
            Cell::new(step.dependencies.join(", ")),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// Add a catalog step to the workflow.
pub async fn add_step(state: &AppState, session_id: Uuid, step_id: &str, json: bool) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;
    let next = WorkflowBuilder::add(&workflow, step_id)?;
    save_edit(state, &next, &history).await?;
    confirm_edit(&next, &format!("Added step '{step_id}'"), json)
}

/// Remove a step from the workflow.
pub async fn remove_step(
    state: &AppState,
    session_id: Uuid,
    step_id: &str,
    json: bool,
) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;
    let next = WorkflowBuilder::remove(&workflow, step_id)?;
    save_edit(state, &next, &history).await?;
    confirm_edit(&next, &format!("Removed step '{step_id}'"), json)
}

/// Move a step one position up or down.
pub async fn move_step(
    state: &AppState,
    session_id: Uuid,
    step_id: &str,
    direction: MoveDirection,
    json: bool,
) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;
    let next = WorkflowBuilder::move_step(&workflow, step_id, direction)?;
    save_edit(state, &next, &history).await?;
    confirm_edit(&next, &format!("Moved step '{step_id}'"), json)
}

/// Renormalize order numbers to multiples of 10.
pub async fn renumber(state: &AppState, session_id: Uuid, json: bool) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;
    let next = WorkflowBuilder::renumber(&workflow);
    save_edit(state, &next, &history).await?;
    confirm_edit(&next, "Renumbered steps", json)
}

/// Re-sort the workflow into the recommended chain-of-thought order and
/// renumber.
pub async fn sort_steps(state: &AppState, session_id: Uuid, json: bool) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;
    let mut next = workflow.clone();
    next.steps =
        WorkflowBuilder::sort_by_recommended_order(&WorkflowBuilder::final_steps(&workflow));
    let next = WorkflowBuilder::renumber(&next);
    save_edit(state, &next, &history).await?;
    confirm_edit(&next, "Sorted steps into recommended order", json)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub async fn load_session(
    state: &AppState,
    session_id: Uuid,
) -> Result<(Workflow, Vec<StepHistoryEntry>)> {
    state
        .store
        .load(session_id)
        .await
        .context("failed to load session")?
        .with_context(|| format!("session '{session_id}' not found"))
}

async fn save_edit(
    state: &AppState,
    workflow: &Workflow,
    history: &[StepHistoryEntry],
) -> Result<()> {
    state
        .store
        .save(workflow, history)
        .await
        .context("failed to save edited workflow")
}

fn confirm_edit(workflow: &Workflow, message: &str, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "session_id": workflow.id.to_string(),
            "steps": WorkflowBuilder::final_steps(workflow)
                .iter()
                .map(|s| s.id.clone())
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("*").green().bold(), message);
    println!();
    super::session::print_step_table(&WorkflowBuilder::final_steps(workflow));
    println!();

    Ok(())
}
