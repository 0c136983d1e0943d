//! Execution commands: `run`, `show`, `feedback`, and `history`.
//!
//! `run` and `feedback` wire the full generation stack: the direct Anthropic
//! client behind a retrying executor as the primary tier, with an
//! OpenAI-compatible client as the fallback tier. `show` and `history` only
//! read the stored snapshot.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use uuid::Uuid;

use charette_core::extract::{SectionContent, SectionExtractor};
use charette_core::llm::resilient::{HybridExecutor, ResilientExecutor};
use charette_core::workflow::runner::AnalysisSession;
use charette_infra::llm::anthropic::AnthropicClient;
use charette_infra::llm::openai_compat::OpenAiCompatClient;
use charette_types::workflow::{FeedbackKind, StepState};

use crate::prompt::BriefPromptRenderer;
use crate::state::AppState;

use super::session::short_id;
use super::steps::load_session;

type Executor = HybridExecutor<AnthropicClient, OpenAiCompatClient>;
type Session = AnalysisSession<Executor, BriefPromptRenderer, charette_infra::store::FsSessionStore>;

/// Run one analysis step, defaulting to the next incomplete one.
pub async fn run_step(
    state: &AppState,
    session_id: Uuid,
    step_id: Option<String>,
    json: bool,
) -> Result<()> {
    let mut session = open_session(state, session_id).await?;

    let step_id = match step_id {
        Some(id) => id,
        None => next_incomplete(&session)
            .context("all steps are already completed -- pick one to re-run")?,
    };
    let title = session
        .final_steps()
        .into_iter()
        .find(|s| s.id == step_id)
        .map(|s| s.title)
        .unwrap_or_else(|| step_id.clone());

    let spinner = start_spinner(&format!("Running '{title}'..."), json);
    let outcome = session.run_step(&step_id).await;
    finish_spinner(spinner);

    match outcome {
        Ok(_) => {}
        Err(err) => return Err(err).context("step failed"),
    }

    if json {
        let sections = session.reparse(&step_id)?;
        print_sections_json(&step_id, &sections)?;
        return Ok(());
    }

    let (completed, total) = session.progress();
    println!();
    println!(
        "  {} Completed '{}' ({completed}/{total})",
        style("*").green().bold(),
        style(&title).cyan()
    );
    println!();
    print_sections(&session.reparse(&step_id)?);
    println!();

    Ok(())
}

/// Display a completed step's result, split into its declared sections.
///
/// Re-derives the sections from the stored raw text; nothing is mutated.
pub async fn show_step(state: &AppState, session_id: Uuid, step_id: &str, json: bool) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;

    let entry = history
        .iter()
        .find(|e| e.step_id == step_id)
        .with_context(|| format!("step '{step_id}' has no recorded result"))?;
    let step = workflow
        .steps
        .iter()
        .find(|s| s.id == step_id)
        .with_context(|| format!("step '{step_id}' is not in the workflow"))?;

    let sections = SectionExtractor::extract(&entry.result, &step.output_sections);

    if json {
        print_sections_json(step_id, &sections)?;
        return Ok(());
    }

    println!();
    println!(
        "  {} ({})",
        style(&entry.title).cyan().bold(),
        entry.recorded_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    print_sections(&sections);
    println!();

    Ok(())
}

/// Revise a completed step's result from feedback.
pub async fn apply_feedback(
    state: &AppState,
    session_id: Uuid,
    step_id: &str,
    kind: FeedbackKind,
    message: &str,
    json: bool,
) -> Result<()> {
    let mut session = open_session(state, session_id).await?;

    let spinner = start_spinner(&format!("Revising '{step_id}'..."), json);
    let outcome = session.apply_feedback(step_id, kind, message).await;
    finish_spinner(spinner);

    match outcome {
        Ok(_) => {}
        Err(err) => return Err(err).context("feedback failed"),
    }

    if json {
        let sections = session.reparse(step_id)?;
        print_sections_json(step_id, &sections)?;
        return Ok(());
    }

    println!();
    println!(
        "  {} Revised '{}' ({})",
        style("*").green().bold(),
        style(step_id).cyan(),
        kind.display_name()
    );
    println!();
    print_sections(&session.reparse(step_id)?);
    println!();

    Ok(())
}

/// Show the session's execution history.
pub async fn show_history(state: &AppState, session_id: Uuid, json: bool) -> Result<()> {
    let (workflow, history) = load_session(state, session_id).await?;

    if json {
        let out: Vec<_> = history
            .iter()
            .map(|e| {
                serde_json::json!({
                    "step_id": e.step_id,
                    "title": e.title,
                    "recorded_at": e.recorded_at.to_rfc3339(),
                    "result_chars": e.result.chars().count(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if history.is_empty() {
        println!();
        println!(
            "  No completed steps in session '{}'.",
            short_id(&workflow.id.to_string())
        );
        println!();
        return Ok(());
    }

    println!();
    for entry in &history {
        println!(
            "  {} {} ({})",
            style("*").green(),
            style(&entry.title).cyan(),
            entry.recorded_at.format("%Y-%m-%d %H:%M")
        );
        let preview: String = entry.result.chars().take(100).collect();
        println!("    {}", style(preview.replace('\n', " ")).dim());
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Build the two-tier generation stack from config and environment keys.
fn build_executor(state: &AppState) -> Result<Executor> {
    let anthropic_key: SecretString = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY is not set")?
        .into();
    let mut anthropic = AnthropicClient::new(anthropic_key)?;
    if let Some(ref url) = state.config.anthropic_base_url {
        anthropic = anthropic.with_base_url(url.clone());
    }

    // The fallback tier degrades gracefully: without a key its requests fail
    // with an auth error, which the hybrid executor reports as-is.
    let openai_key: SecretString = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => key.into(),
        Err(_) => {
            tracing::debug!("OPENAI_API_KEY not set; fallback tier will be unavailable");
            String::new().into()
        }
    };
    let openai = match state.config.openai_base_url {
        Some(ref url) => OpenAiCompatClient::with_base_url(&openai_key, url),
        None => OpenAiCompatClient::new(&openai_key),
    };

    Ok(HybridExecutor::new(
        ResilientExecutor::new(anthropic).with_max_retries(state.config.max_retries),
        ResilientExecutor::new(openai).with_max_retries(state.config.max_retries),
    ))
}

async fn open_session(state: &AppState, session_id: Uuid) -> Result<Session> {
    let (workflow, history) = load_session(state, session_id).await?;
    let inputs = state
        .store
        .load_inputs(session_id)
        .await
        .context("failed to load project inputs")?;
    let executor = build_executor(state)?;

    Ok(AnalysisSession::resume(
        workflow,
        history,
        inputs,
        state.config.model.clone(),
        executor,
        BriefPromptRenderer,
        state.store.clone(),
    ))
}

fn next_incomplete(session: &Session) -> Option<String> {
    session
        .final_steps()
        .into_iter()
        .find(|s| session.state(&s.id) != StepState::Completed)
        .map(|s| s.id)
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn start_spinner(message: &str, json: bool) -> Option<ProgressBar> {
    if json {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("  {spinner} {msg}") {
        spinner.set_style(template);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    Some(spinner)
}

fn finish_spinner(spinner: Option<ProgressBar>) {
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
}

fn print_sections(sections: &[charette_core::extract::ParsedSection]) {
    for section in sections {
        println!("  {}", style(&section.name).bold().underlined());
        match &section.content {
            SectionContent::Extracted(text) => {
                for line in text.lines() {
                    println!("  {line}");
                }
            }
            SectionContent::Recovered(text) => {
                println!("  {}", style("(recovered by keyword scan)").dim());
                for line in text.lines() {
                    println!("  {line}");
                }
            }
            SectionContent::Missing => {
                println!("  {}", style(section.text_or_sentinel()).red());
            }
        }
        println!();
    }
}

fn print_sections_json(
    step_id: &str,
    sections: &[charette_core::extract::ParsedSection],
) -> Result<()> {
    let out = serde_json::json!({
        "step_id": step_id,
        "sections": sections
            .iter()
            .map(|s| {
                let status = match &s.content {
                    SectionContent::Extracted(_) => "extracted",
                    SectionContent::Recovered(_) => "recovered",
                    SectionContent::Missing => "missing",
                };
                serde_json::json!({
                    "name": s.name,
                    "status": status,
                    "text": s.text_or_sentinel(),
                })
            })
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
