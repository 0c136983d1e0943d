//! Charette CLI entry point.
//!
//! Binary name: `charette`
//!
//! Parses CLI arguments, loads config and the session store, then dispatches
//! to the appropriate command handler.

mod cli;
mod prompt;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,charette=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Catalog listing needs no state
    if let Commands::Catalog = &cli.command {
        return cli::steps::list_catalog(cli.json);
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::New {
            purpose,
            objectives,
            name,
            building_type,
            location,
            owner,
            site_area,
            goal,
        } => {
            let args = cli::session::NewSessionArgs {
                purpose,
                objectives,
                name,
                building_type,
                location,
                owner,
                site_area,
                goal,
            };
            cli::session::new_session(&state, args, cli.json).await?;
        }

        Commands::Sessions => {
            cli::session::list_sessions(&state, cli.json).await?;
        }

        Commands::Steps => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::steps::list_steps(&state, id, cli.json).await?;
        }

        Commands::Add { step_id } => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::steps::add_step(&state, id, &step_id, cli.json).await?;
        }

        Commands::Remove { step_id } => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::steps::remove_step(&state, id, &step_id, cli.json).await?;
        }

        Commands::Move { step_id, direction } => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::steps::move_step(&state, id, &step_id, direction.into(), cli.json).await?;
        }

        Commands::Renumber => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::steps::renumber(&state, id, cli.json).await?;
        }

        Commands::Sort => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::steps::sort_steps(&state, id, cli.json).await?;
        }

        Commands::Run { step_id } => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::run::run_step(&state, id, step_id, cli.json).await?;
        }

        Commands::Show { step_id } => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::run::show_step(&state, id, &step_id, cli.json).await?;
        }

        Commands::Feedback {
            step_id,
            kind,
            message,
        } => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::run::apply_feedback(&state, id, &step_id, kind, &message, cli.json).await?;
        }

        Commands::History => {
            let id = state.resolve_session_id(cli.session).await?;
            cli::run::show_history(&state, id, cli.json).await?;
        }

        Commands::Catalog => unreachable!("handled above"),
    }

    Ok(())
}
