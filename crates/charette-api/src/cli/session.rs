//! Session lifecycle commands: `new` and `sessions`.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use charette_core::workflow::builder::WorkflowBuilder;
use charette_core::workflow::runner::{ProjectInputs, SessionStore};
use charette_types::step::{Objective, Purpose};

use crate::state::AppState;

/// Project input flags collected by `charette new`.
pub struct NewSessionArgs {
    pub purpose: Purpose,
    pub objectives: Vec<Objective>,
    pub name: Option<String>,
    pub building_type: Option<String>,
    pub location: Option<String>,
    pub owner: Option<String>,
    pub site_area: Option<String>,
    pub goal: Option<String>,
}

/// Create a session: suggest a workflow for the purpose and objectives,
/// persist it, and show the resulting step list.
pub async fn new_session(state: &AppState, args: NewSessionArgs, json: bool) -> Result<()> {
    let objectives: BTreeSet<Objective> = args.objectives.iter().copied().collect();
    let workflow = WorkflowBuilder::suggest(args.purpose, &objectives);

    let inputs = ProjectInputs {
        project_name: args.name.unwrap_or_default(),
        building_type: args.building_type.unwrap_or_default(),
        site_location: args.location.unwrap_or_default(),
        owner: args.owner.unwrap_or_default(),
        site_area: args.site_area.unwrap_or_default(),
        project_goal: args.goal.unwrap_or_default(),
    };

    state
        .store
        .save(&workflow, &[])
        .await
        .context("failed to save new session")?;
    state
        .store
        .save_inputs(workflow.id, &inputs)
        .await
        .context("failed to save project inputs")?;

    if json {
        let out = serde_json::json!({
            "session_id": workflow.id.to_string(),
            "purpose": workflow.purpose.to_string(),
            "objectives": workflow.objectives.iter().map(|o| o.to_string()).collect::<Vec<_>>(),
            "steps": workflow.steps.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Created session '{}' ({})",
        style("*").green().bold(),
        style(workflow.id.to_string()).cyan(),
        args.purpose.display_name()
    );
    println!();
    print_step_table(&WorkflowBuilder::final_steps(&workflow));
    println!();
    println!(
        "  Run the first step: {}",
        style("charette run").dim()
    );
    println!();

    Ok(())
}

/// List stored sessions, oldest first.
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let ids = state.store.list().await.context("failed to list sessions")?;

    let mut rows = Vec::new();
    for id in ids {
        if let Some((workflow, history)) = state.store.load(id).await? {
            rows.push((workflow, history.len()));
        }
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(w, completed)| {
                serde_json::json!({
                    "session_id": w.id.to_string(),
                    "purpose": w.purpose.to_string(),
                    "steps": w.steps.len(),
                    "completed": completed,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!();
        println!("  No sessions yet.");
        println!(
            "  Create one with: {}",
            style("charette new --purpose proposal").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Session").fg(Color::Cyan),
            Cell::new("Purpose"),
            Cell::new("Steps"),
            Cell::new("Completed"),
        ]);

    for (workflow, completed) in &rows {
        table.add_row(vec![
            Cell::new(short_id(&workflow.id.to_string())),
            Cell::new(workflow.purpose.display_name()),
            Cell::new(workflow.steps.len()),
            Cell::new(completed),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// First 8 characters of a UUID, for compact listings.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Shared step-list table used by several commands.
pub fn print_step_table(steps: &[charette_types::step::AnalysisStep]) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Title"),
            Cell::new("Requirement"),
            Cell::new("Category"),
        ]);

    for step in steps {
        let requirement_cell = match step.requirement {
            charette_types::step::RequirementLevel::Required => {
                Cell::new("required").fg(Color::Red)
            }
            charette_types::step::RequirementLevel::Recommended => {
                Cell::new("recommended").fg(Color::Yellow)
            }
            charette_types::step::RequirementLevel::Optional => Cell::new("optional"),
        };

        table.add_row(vec![
            Cell::new(step.order),
            Cell::new(&step.id),
            Cell::new(&step.title),
            requirement_cell,
            Cell::new(&step.category),
        ]);
    }

    println!("{table}");
}
