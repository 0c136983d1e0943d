//! Session-scoped step execution: history, state, feedback, and reparse.
//!
//! [`AnalysisSession`] owns one workflow's execution lifecycle. Steps run
//! one at a time in workflow order; each successful run appends a
//! [`StepHistoryEntry`] (or replaces the existing one on re-run). Raw model
//! output is the source of truth -- parsed sections are re-derived from it
//! on demand and never stored. Persistence is fire-and-forget: a failed
//! snapshot save is logged and never aborts a completed step.

use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use charette_types::llm::{GenerationOutcome, GenerationRequest};
use charette_types::step::AnalysisStep;
use charette_types::workflow::{FeedbackKind, StepHistoryEntry, StepState, Workflow};

use crate::extract::{ParsedSection, SectionExtractor};
use crate::llm::max_tokens_for;
use crate::llm::resilient::ResilientGeneration;

use super::builder::WorkflowBuilder;

// ---------------------------------------------------------------------------
// Collaborator interfaces
// ---------------------------------------------------------------------------

/// Project facts collected before analysis starts; every prompt embeds them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInputs {
    pub project_name: String,
    pub building_type: String,
    pub site_location: String,
    pub owner: String,
    pub site_area: String,
    pub project_goal: String,
}

/// External prompt renderer. The session passes the rendered string to the
/// executor unmodified; templating internals are not the core's concern.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, step: &AnalysisStep, inputs: &ProjectInputs, prior_results: &str) -> String;
}

impl<F> PromptRenderer for F
where
    F: Fn(&AnalysisStep, &ProjectInputs, &str) -> String + Send + Sync,
{
    fn render(&self, step: &AnalysisStep, inputs: &ProjectInputs, prior_results: &str) -> String {
        self(step, inputs, prior_results)
    }
}

/// Errors from the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable storage for session snapshots.
///
/// Saves are fire-and-forget from the session's point of view: errors are
/// logged by the caller and never propagate into step execution.
pub trait SessionStore: Send + Sync {
    fn save(
        &self,
        workflow: &Workflow,
        history: &[StepHistoryEntry],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// No-op store for tests and ephemeral sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl SessionStore for NullStore {
    fn save(
        &self,
        _workflow: &Workflow,
        _history: &[StepHistoryEntry],
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        std::future::ready(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by step execution and re-display.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Step id is not in the workflow's final step list.
    #[error("step '{0}' is not in the workflow")]
    UnknownStep(String),

    /// Generation failed after all retries and fallbacks. The step records
    /// no history entry and stays incomplete so the user can re-attempt it.
    #[error("generation failed for step '{step}': {reason}")]
    Generation { step: String, reason: String },

    /// Operation needs a recorded result (feedback, reparse) but the step
    /// has not completed yet.
    #[error("step '{0}' has no recorded result")]
    NoResult(String),
}

// ---------------------------------------------------------------------------
// AnalysisSession
// ---------------------------------------------------------------------------

/// The single owner of one analysis session's workflow, history, and step
/// states. Drives steps one at a time; there is no concurrent execution.
pub struct AnalysisSession<E, R, S> {
    executor: E,
    renderer: R,
    store: S,
    pub workflow: Workflow,
    inputs: ProjectInputs,
    model: String,
    history: Vec<StepHistoryEntry>,
    states: HashMap<String, StepState>,
}

impl<E, R, S> AnalysisSession<E, R, S>
where
    E: ResilientGeneration,
    R: PromptRenderer,
    S: SessionStore,
{
    /// Start a fresh session.
    pub fn new(
        workflow: Workflow,
        inputs: ProjectInputs,
        model: impl Into<String>,
        executor: E,
        renderer: R,
        store: S,
    ) -> Self {
        Self {
            executor,
            renderer,
            store,
            workflow,
            inputs,
            model: model.into(),
            history: Vec::new(),
            states: HashMap::new(),
        }
    }

    /// Resume a session from a stored snapshot. Steps with a history entry
    /// come back as completed.
    pub fn resume(
        workflow: Workflow,
        history: Vec<StepHistoryEntry>,
        inputs: ProjectInputs,
        model: impl Into<String>,
        executor: E,
        renderer: R,
        store: S,
    ) -> Self {
        let states = history
            .iter()
            .map(|entry| (entry.step_id.clone(), StepState::Completed))
            .collect();
        Self {
            executor,
            renderer,
            store,
            workflow,
            inputs,
            model: model.into(),
            history,
            states,
        }
    }

    /// The materialized, ordered step list for this session.
    pub fn final_steps(&self) -> Vec<AnalysisStep> {
        WorkflowBuilder::final_steps(&self.workflow)
    }

    /// Current state of a step.
    pub fn state(&self, step_id: &str) -> StepState {
        self.states.get(step_id).copied().unwrap_or_default()
    }

    /// `(completed, total)` for progress display.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.workflow.steps.len();
        let completed = self
            .states
            .values()
            .filter(|s| **s == StepState::Completed)
            .count();
        (completed, total)
    }

    /// The full execution history, in completion order.
    pub fn history(&self) -> &[StepHistoryEntry] {
        &self.history
    }

    /// The authoritative result for a step, if it has completed.
    pub fn latest_result(&self, step_id: &str) -> Option<&StepHistoryEntry> {
        self.history.iter().find(|e| e.step_id == step_id)
    }

    /// Run one step: render the prompt, execute with retries/fallback, and
    /// record the result.
    ///
    /// On failure no history entry is recorded and the step is marked
    /// aborted, so the workflow position never advances past a failed step.
    pub async fn run_step(&mut self, step_id: &str) -> Result<&StepHistoryEntry, StepError> {
        let step = self
            .final_steps()
            .into_iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| StepError::UnknownStep(step_id.to_string()))?;

        self.states
            .insert(step.id.clone(), StepState::Running);
        tracing::info!(step = %step.id, "running analysis step");

        // Prior results exclude the step itself so a re-run never feeds the
        // step its own previous answer.
        let prior = self.prior_results_text(&step.id);
        let prompt = self.renderer.render(&step, &self.inputs, &prior);
        let request = self.request_for(prompt.clone());

        match self.executor.execute(&request).await {
            GenerationOutcome::Ok { text } => {
                self.record_result(&step, prompt, text);
                self.states
                    .insert(step.id.clone(), StepState::Completed);
                tracing::info!(step = %step.id, "step completed");
                self.persist().await;
                self.latest_result(&step.id)
                    .ok_or_else(|| StepError::NoResult(step.id.clone()))
            }
            failed => {
                self.states.insert(step.id.clone(), StepState::Aborted);
                let reason = failed
                    .failure_reason()
                    .unwrap_or_else(|| "unknown failure".to_string());
                tracing::warn!(step = %step.id, %reason, "step aborted");
                Err(StepError::Generation {
                    step: step.id.clone(),
                    reason,
                })
            }
        }
    }

    /// Re-run a completed (or aborted) step, replacing its history entry in
    /// place. The step's own prior result is excluded from the new prompt.
    pub async fn rerun(&mut self, step_id: &str) -> Result<&StepHistoryEntry, StepError> {
        self.run_step(step_id).await
    }

    /// Revise a completed step's result from user feedback.
    ///
    /// Sends a single feedback-augmented generation (the executor already
    /// carries the retry policy) and replaces the entry's `result` in place.
    /// The step stays `Completed` throughout -- feedback mutates the latest
    /// answer, it is not a new step.
    pub async fn apply_feedback(
        &mut self,
        step_id: &str,
        kind: FeedbackKind,
        feedback: &str,
    ) -> Result<&StepHistoryEntry, StepError> {
        let original = self
            .latest_result(step_id)
            .ok_or_else(|| StepError::NoResult(step_id.to_string()))?
            .result
            .clone();

        let prompt = Self::build_feedback_prompt(&original, kind, feedback);
        let request = self.request_for(prompt);

        match self.executor.execute(&request).await {
            GenerationOutcome::Ok { text } => {
                if let Some(entry) = self.history.iter_mut().find(|e| e.step_id == step_id) {
                    entry.result = text;
                    entry.recorded_at = Utc::now();
                }
                tracing::info!(step = step_id, kind = kind.display_name(), "feedback applied");
                self.persist().await;
                self.latest_result(step_id)
                    .ok_or_else(|| StepError::NoResult(step_id.to_string()))
            }
            failed => {
                let reason = failed
                    .failure_reason()
                    .unwrap_or_else(|| "unknown failure".to_string());
                Err(StepError::Generation {
                    step: step_id.to_string(),
                    reason,
                })
            }
        }
    }

    /// Re-derive the parsed sections for a completed step.
    ///
    /// Pure function of the stored raw text and the step's declared output
    /// sections; safe to call repeatedly.
    pub fn reparse(&self, step_id: &str) -> Result<Vec<ParsedSection>, StepError> {
        let entry = self
            .latest_result(step_id)
            .ok_or_else(|| StepError::NoResult(step_id.to_string()))?;
        let step = self
            .workflow
            .steps
            .iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| StepError::UnknownStep(step_id.to_string()))?;

        Ok(SectionExtractor::extract(&entry.result, &step.output_sections))
    }

    /// Joined `**{title}**: {result}` lines of completed steps, excluding
    /// `exclude_id`, in completion order. Embedded in every prompt so later
    /// steps build on earlier findings.
    pub fn prior_results_text(&self, exclude_id: &str) -> String {
        self.history
            .iter()
            .filter(|entry| entry.step_id != exclude_id)
            .map(|entry| format!("**{}**: {}", entry.title, entry.result))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the revision prompt for a feedback request.
    pub fn build_feedback_prompt(original: &str, kind: FeedbackKind, feedback: &str) -> String {
        format!(
            "Previous analysis result:\n\
             {original}\n\
             \n\
             User feedback:\n\
             - Kind: {kind}\n\
             - Content: {feedback}\n\
             \n\
             Revise or extend the previous analysis based on this feedback.\n\
             Identify the intent of the feedback and apply the appropriate revision:\n\
             - additional analysis: add depth or a new angle on top of the existing result\n\
             - correction: fix errors or fill gaps in the existing content\n\
             - alternative perspective: approach the question from a different viewpoint\n\
             - restructure: change the structure or format of the analysis\n\
             - other: follow the specific request as stated\n\
             \n\
             Keep the context of the original analysis while applying the feedback.",
            kind = kind.display_name(),
        )
    }

    // ---- helpers ----

    fn request_for(&self, prompt: String) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            prompt,
            system: None,
            max_tokens: max_tokens_for(&self.model),
            temperature: None,
        }
    }

    /// Append a history entry, or replace the existing one for the step.
    fn record_result(&mut self, step: &AnalysisStep, prompt: String, result: String) {
        if let Some(entry) = self.history.iter_mut().find(|e| e.step_id == step.id) {
            entry.prompt = prompt;
            entry.result = result;
            entry.recorded_at = Utc::now();
        } else {
            self.history.push(StepHistoryEntry {
                step_id: step.id.clone(),
                title: step.title.clone(),
                prompt,
                result,
                recorded_at: Utc::now(),
            });
        }
    }

    /// Fire-and-forget snapshot save.
    async fn persist(&self) {
        if let Err(err) = self.store.save(&self.workflow, &self.history).await {
            tracing::warn!(error = %err, "failed to persist session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use charette_types::step::Purpose;

    // ---- Mock collaborators ----

    /// Scripted executor that records every prompt it receives.
    #[derive(Default)]
    struct ScriptedExecutor {
        script: Mutex<VecDeque<GenerationOutcome>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(outcomes: Vec<GenerationOutcome>) -> Self {
            Self {
                script: Mutex::new(outcomes.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn ok(texts: &[&str]) -> Self {
            Self::new(
                texts
                    .iter()
                    .map(|t| GenerationOutcome::Ok {
                        text: t.to_string(),
                    })
                    .collect(),
            )
        }
    }

    impl ResilientGeneration for ScriptedExecutor {
        fn execute(
            &self,
            request: &GenerationRequest,
        ) -> impl Future<Output = GenerationOutcome> + Send {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted executor called past end of script");
            std::future::ready(outcome)
        }
    }

    fn renderer(step: &AnalysisStep, inputs: &ProjectInputs, prior: &str) -> String {
        format!(
            "project={} step={}\nprior:\n{}",
            inputs.project_name, step.id, prior
        )
    }

    /// Store that counts saves (and can be told to fail).
    #[derive(Clone, Default)]
    struct CountingStore {
        saves: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SessionStore for CountingStore {
        fn save(
            &self,
            _workflow: &Workflow,
            _history: &[StepHistoryEntry],
        ) -> impl Future<Output = Result<(), StoreError>> + Send {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(StoreError::Io(std::io::Error::other("disk full")))
            } else {
                Ok(())
            };
            std::future::ready(result)
        }
    }

    fn inputs() -> ProjectInputs {
        ProjectInputs {
            project_name: "Riverside Commons".into(),
            building_type: "mixed-use".into(),
            site_location: "Mapo-gu, Seoul".into(),
            owner: "Hanbit Development".into(),
            site_area: "4,200 sqm".into(),
            project_goal: "landmark mixed-use block".into(),
        }
    }

    type TestSession =
        AnalysisSession<ScriptedExecutor, fn(&AnalysisStep, &ProjectInputs, &str) -> String, CountingStore>;

    fn session(executor: ScriptedExecutor, store: CountingStore) -> TestSession {
        let workflow = WorkflowBuilder::suggest(Purpose::Proposal, &BTreeSet::new());
        AnalysisSession::new(
            workflow,
            inputs(),
            "claude-sonnet-4-20250514",
            executor,
            renderer,
            store,
        )
    }

    const RESULT_A: &str = "The brief describes a six-storey mixed-use block.";
    const RESULT_B: &str = "Revised: the brief allows up to eight storeys.";

    // ---- run_step ----

    #[tokio::test]
    async fn test_run_step_records_history_and_saves() {
        let store = CountingStore::default();
        let mut session = session(ScriptedExecutor::ok(&[RESULT_A]), store.clone());

        let entry = session.run_step("document_analyzer").await.unwrap();
        assert_eq!(entry.result, RESULT_A);
        assert_eq!(entry.step_id, "document_analyzer");

        assert_eq!(session.state("document_analyzer"), StepState::Completed);
        assert_eq!(session.history().len(), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(session.progress().0, 1);
    }

    #[tokio::test]
    async fn test_failed_step_records_nothing_and_stays_incomplete() {
        let store = CountingStore::default();
        let executor = ScriptedExecutor::new(vec![GenerationOutcome::Fatal {
            reason: "authentication failed".into(),
        }]);
        let mut session = session(executor, store.clone());

        let err = session.run_step("document_analyzer").await.unwrap_err();
        assert!(matches!(err, StepError::Generation { .. }));

        assert!(session.history().is_empty());
        assert_eq!(session.state("document_analyzer"), StepState::Aborted);
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(session.progress().0, 0);
    }

    #[tokio::test]
    async fn test_run_unknown_step_rejected() {
        let mut session = session(ScriptedExecutor::ok(&[]), CountingStore::default());
        let err = session.run_step("nonexistent").await.unwrap_err();
        assert!(matches!(err, StepError::UnknownStep(_)));
    }

    #[tokio::test]
    async fn test_prior_results_accumulate_into_later_prompts() {
        let mut session = session(
            ScriptedExecutor::ok(&[RESULT_A, RESULT_B]),
            CountingStore::default(),
        );

        session.run_step("document_analyzer").await.unwrap();
        session.run_step("requirement_analyzer").await.unwrap();

        let prompts = session.executor.prompts.lock().unwrap().clone();
        assert!(!prompts[0].contains(RESULT_A));
        assert!(prompts[1].contains("**Document Analysis**"));
        assert!(prompts[1].contains(RESULT_A));
    }

    #[tokio::test]
    async fn test_rerun_replaces_entry_and_excludes_own_result() {
        let mut session = session(
            ScriptedExecutor::ok(&[RESULT_A, RESULT_B]),
            CountingStore::default(),
        );

        session.run_step("document_analyzer").await.unwrap();
        let entry = session.rerun("document_analyzer").await.unwrap();

        assert_eq!(entry.result, RESULT_B);
        assert_eq!(session.history().len(), 1, "rerun must replace, not append");
        assert_eq!(session.state("document_analyzer"), StepState::Completed);

        // The rerun prompt must not feed the step its own previous answer.
        let prompts = session.executor.prompts.lock().unwrap().clone();
        assert!(!prompts[1].contains(RESULT_A));
    }

    // ---- feedback ----

    #[tokio::test]
    async fn test_apply_feedback_replaces_result_in_place() {
        let mut session = session(
            ScriptedExecutor::ok(&[RESULT_A, RESULT_B]),
            CountingStore::default(),
        );

        session.run_step("document_analyzer").await.unwrap();
        let entry = session
            .apply_feedback(
                "document_analyzer",
                FeedbackKind::Correction,
                "The storey count is wrong.",
            )
            .await
            .unwrap();

        assert_eq!(entry.result, RESULT_B);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.state("document_analyzer"), StepState::Completed);

        let prompts = session.executor.prompts.lock().unwrap().clone();
        assert!(prompts[1].contains(RESULT_A), "feedback prompt embeds the original");
        assert!(prompts[1].contains("correction"));
        assert!(prompts[1].contains("The storey count is wrong."));
    }

    #[tokio::test]
    async fn test_feedback_without_result_rejected() {
        let mut session = session(ScriptedExecutor::ok(&[]), CountingStore::default());
        let err = session
            .apply_feedback("document_analyzer", FeedbackKind::Other, "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::NoResult(_)));
    }

    // ---- reparse ----

    #[tokio::test]
    async fn test_reparse_yields_sections_and_is_idempotent() {
        let structured = "## 1. Document Overview\n\
                          A ten-page brief covering site and program.\n\
                          ## 2. Key Requirements\n\
                          Mixed-use podium with a public ground floor.\n\
                          ## 3. Open Questions\n\
                          Parking ratios are not yet confirmed.";
        let mut session = session(
            ScriptedExecutor::ok(&[structured]),
            CountingStore::default(),
        );

        session.run_step("document_analyzer").await.unwrap();

        let first = session.reparse("document_analyzer").unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(
            first[0].text_or_sentinel(),
            "A ten-page brief covering site and program."
        );

        let second = session.reparse("document_analyzer").unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reparse_without_result_rejected() {
        let session = session(ScriptedExecutor::ok(&[]), CountingStore::default());
        assert!(matches!(
            session.reparse("document_analyzer").unwrap_err(),
            StepError::NoResult(_)
        ));
    }

    // ---- persistence ----

    #[tokio::test]
    async fn test_failed_save_does_not_abort_step() {
        let store = CountingStore {
            saves: Arc::new(AtomicUsize::new(0)),
            fail: true,
        };
        let mut session = session(ScriptedExecutor::ok(&[RESULT_A]), store.clone());

        let entry = session.run_step("document_analyzer").await.unwrap();
        assert_eq!(entry.result, RESULT_A);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resume_restores_completed_states() {
        let workflow = WorkflowBuilder::suggest(Purpose::Proposal, &BTreeSet::new());
        let history = vec![StepHistoryEntry {
            step_id: "document_analyzer".into(),
            title: "Document Analysis".into(),
            prompt: "p".into(),
            result: RESULT_A.into(),
            recorded_at: Utc::now(),
        }];

        let session: TestSession = AnalysisSession::resume(
            workflow,
            history,
            inputs(),
            "claude-sonnet-4-20250514",
            ScriptedExecutor::ok(&[]),
            renderer,
            CountingStore::default(),
        );

        assert_eq!(session.state("document_analyzer"), StepState::Completed);
        assert_eq!(session.state("requirement_analyzer"), StepState::NotStarted);
        assert_eq!(session.progress().0, 1);
    }
}
