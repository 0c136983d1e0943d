//! Shared application state for CLI command handlers.

use anyhow::{Context, Result};
use uuid::Uuid;

use charette_infra::config::{self, CharetteConfig};
use charette_infra::store::FsSessionStore;

/// Everything a command handler needs: resolved config and the session store.
pub struct AppState {
    pub config: CharetteConfig,
    pub store: FsSessionStore,
}

impl AppState {
    /// Resolve the data directory, load config, and open the session store.
    pub async fn init() -> Result<Self> {
        let data_dir = config::data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = config::load_config(&data_dir).await;
        let store = FsSessionStore::new(&data_dir);

        Ok(Self { config, store })
    }

    /// Resolve which session a command targets: an explicit `--session` id,
    /// or the most recently created one.
    pub async fn resolve_session_id(&self, explicit: Option<Uuid>) -> Result<Uuid> {
        if let Some(id) = explicit {
            return Ok(id);
        }
        self.store
            .latest()
            .await
            .context("failed to list sessions")?
            .context("no sessions found -- create one with `charette new`")
    }
}
