//! Filesystem session storage.
//!
//! Persists each session as JSON snapshots under
//! `{data_dir}/sessions/{session_id}/`: the workflow, the step history, and
//! the project inputs as separate files. Saves are fire-and-forget from the
//! session's point of view -- the runner logs failures and keeps going.

use std::future::Future;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use charette_core::workflow::runner::{ProjectInputs, SessionStore, StoreError};
use charette_types::workflow::{StepHistoryEntry, Workflow};

const WORKFLOW_FILE: &str = "workflow.json";
const HISTORY_FILE: &str = "history.json";
const INPUTS_FILE: &str = "inputs.json";

/// JSON-on-disk implementation of [`SessionStore`].
#[derive(Debug, Clone)]
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    /// Store sessions under `{data_dir}/sessions/`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("sessions"),
        }
    }

    fn session_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Load a stored session, if it exists.
    pub async fn load(
        &self,
        id: Uuid,
    ) -> Result<Option<(Workflow, Vec<StepHistoryEntry>)>, StoreError> {
        let dir = self.session_dir(id);
        let workflow_path = dir.join(WORKFLOW_FILE);

        let workflow_json = match tokio::fs::read_to_string(&workflow_path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let workflow: Workflow = serde_json::from_str(&workflow_json)?;

        // A session saved before its first completed step has no history file.
        let history = match tokio::fs::read_to_string(dir.join(HISTORY_FILE)).await {
            Ok(json) => serde_json::from_str(&json)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Some((workflow, history)))
    }

    /// Persist the project inputs alongside the session snapshot.
    pub async fn save_inputs(&self, id: Uuid, inputs: &ProjectInputs) -> Result<(), StoreError> {
        let dir = self.session_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_string_pretty(inputs)?;
        tokio::fs::write(dir.join(INPUTS_FILE), json).await?;
        Ok(())
    }

    /// Load the project inputs for a session, defaulting when absent.
    pub async fn load_inputs(&self, id: Uuid) -> Result<ProjectInputs, StoreError> {
        match tokio::fs::read_to_string(self.session_dir(id).join(INPUTS_FILE)).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(ProjectInputs::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All stored session ids, oldest first (UUIDv7 ids sort by time).
    pub async fn list(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if let Ok(id) = entry.file_name().to_string_lossy().parse::<Uuid>() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The most recently created session, if any.
    pub async fn latest(&self) -> Result<Option<Uuid>, StoreError> {
        Ok(self.list().await?.into_iter().next_back())
    }

    async fn write_snapshot(
        &self,
        workflow: &Workflow,
        history: &[StepHistoryEntry],
    ) -> Result<(), StoreError> {
        let dir = self.session_dir(workflow.id);
        tokio::fs::create_dir_all(&dir).await?;

        let workflow_json = serde_json::to_string_pretty(workflow)?;
        tokio::fs::write(dir.join(WORKFLOW_FILE), workflow_json).await?;

        let history_json = serde_json::to_string_pretty(history)?;
        tokio::fs::write(dir.join(HISTORY_FILE), history_json).await?;

        Ok(())
    }
}

impl SessionStore for FsSessionStore {
    fn save(
        &self,
        workflow: &Workflow,
        history: &[StepHistoryEntry],
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.write_snapshot(workflow, history)
    }
}
