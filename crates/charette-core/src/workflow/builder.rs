//! Workflow suggestion and editing operations.
//!
//! All editing operations are pure: they take a workflow by reference and
//! return a new one, leaving the input untouched on failure. There is no
//! partial-failure case -- an operation either fully succeeds or returns a
//! [`WorkflowError`] with the prior state intact.

use std::collections::{BTreeSet, HashSet};

use charette_types::step::{AnalysisStep, Objective, Purpose, RequirementLevel};
use charette_types::workflow::{Workflow, WorkflowError};
use uuid::Uuid;

use super::catalog;

/// Direction for moving a step within the displayed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Stateless workflow construction and editing.
///
/// Same pattern as the section extractor -- no internal state, all logic in
/// associated functions over the workflow value.
pub struct WorkflowBuilder;

impl WorkflowBuilder {
    /// Suggest a workflow for a purpose and objective set.
    ///
    /// The step set is the union of the purpose's required steps and each
    /// objective's recommended steps, deduplicated by id, closed over
    /// declared dependencies, and ordered by the recommended
    /// chain-of-thought table. Deterministic for a given input.
    pub fn suggest(purpose: Purpose, objectives: &BTreeSet<Objective>) -> Workflow {
        let mut steps: Vec<AnalysisStep> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for id in catalog::required_for(purpose) {
            if let Some(step) = catalog::catalog_step(id, RequirementLevel::Required) {
                seen.insert(step.id.clone());
                steps.push(step);
            }
        }

        for objective in objectives {
            for id in catalog::steps_for(*objective) {
                if seen.contains(*id) {
                    continue;
                }
                if let Some(step) = catalog::catalog_step(id, RequirementLevel::Recommended) {
                    seen.insert(step.id.clone());
                    steps.push(step);
                }
            }
        }

        Self::close_over_dependencies(&mut steps, &mut seen);
        let steps = Self::sort_by_recommended_order(&steps);

        Workflow {
            id: Uuid::now_v7(),
            purpose,
            objectives: objectives.clone(),
            steps,
            removed_ids: BTreeSet::new(),
            added_ids: BTreeSet::new(),
        }
    }

    /// The materialized, ordered list of steps to execute.
    ///
    /// Stable sort by `order`; ties keep their current relative position
    /// (catalog insertion order for suggested steps).
    pub fn final_steps(workflow: &Workflow) -> Vec<AnalysisStep> {
        let mut steps = workflow.steps.clone();
        steps.sort_by_key(|s| s.order);
        steps
    }

    /// Remove a step from the workflow.
    ///
    /// Fails if the id is unknown, the step is required, or another step in
    /// the workflow depends on it. The removed id is recorded so it is never
    /// re-suggested automatically.
    pub fn remove(workflow: &Workflow, id: &str) -> Result<Workflow, WorkflowError> {
        let step = workflow
            .steps
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| WorkflowError::UnknownStep(id.to_string()))?;

        if step.requirement == RequirementLevel::Required {
            return Err(WorkflowError::PolicyViolation(id.to_string()));
        }

        if let Some(dependent) = workflow
            .steps
            .iter()
            .find(|s| s.id != id && s.dependencies.iter().any(|d| d == id))
        {
            return Err(WorkflowError::MissingDependency {
                step: dependent.id.clone(),
                dependency: id.to_string(),
            });
        }

        let mut next = workflow.clone();
        next.steps.retain(|s| s.id != id);
        next.added_ids.remove(id);
        next.removed_ids.insert(id.to_string());
        Ok(next)
    }

    /// Pull a catalog step into the workflow.
    ///
    /// Fails on unknown catalog ids and ids already present. The step (and
    /// any missing dependencies) are added at their recommended position and
    /// the whole list is renumbered.
    pub fn add(workflow: &Workflow, id: &str) -> Result<Workflow, WorkflowError> {
        if workflow.steps.iter().any(|s| s.id == id) {
            return Err(WorkflowError::DuplicateStep(id.to_string()));
        }
        let step = catalog::catalog_step(id, RequirementLevel::Optional)
            .ok_or_else(|| WorkflowError::UnknownStep(id.to_string()))?;

        let mut next = workflow.clone();
        let mut seen: HashSet<String> = next.steps.iter().map(|s| s.id.clone()).collect();

        seen.insert(step.id.clone());
        next.added_ids.insert(step.id.clone());
        next.removed_ids.remove(&step.id);
        next.steps.push(step);

        let before: HashSet<String> = seen.clone();
        Self::close_over_dependencies(&mut next.steps, &mut seen);
        for added in seen.difference(&before) {
            next.added_ids.insert(added.clone());
            next.removed_ids.remove(added);
        }

        next.steps = Self::renumber_steps(Self::sort_by_recommended_order(&next.steps));
        Ok(next)
    }

    /// Swap a step with its neighbor in the displayed order.
    ///
    /// Moving the first step up or the last step down is illegal.
    pub fn move_step(
        workflow: &Workflow,
        id: &str,
        direction: MoveDirection,
    ) -> Result<Workflow, WorkflowError> {
        let mut steps = Self::final_steps(workflow);
        let index = steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| WorkflowError::UnknownStep(id.to_string()))?;

        let target = match direction {
            MoveDirection::Up if index == 0 => {
                return Err(WorkflowError::BoundaryMove(id.to_string()));
            }
            MoveDirection::Down if index + 1 == steps.len() => {
                return Err(WorkflowError::BoundaryMove(id.to_string()));
            }
            MoveDirection::Up => index - 1,
            MoveDirection::Down => index + 1,
        };

        steps.swap(index, target);
        let mut next = workflow.clone();
        next.steps = Self::renumber_steps(steps);
        Ok(next)
    }

    /// Renormalize `order` to `(index + 1) * 10` over the displayed order.
    pub fn renumber(workflow: &Workflow) -> Workflow {
        let mut next = workflow.clone();
        next.steps = Self::renumber_steps(Self::final_steps(workflow));
        next
    }

    /// Re-order an arbitrary step list by the recommended chain-of-thought
    /// table. Unknown ids sort after all ranked steps; the sort is stable,
    /// so equal ranks keep their input order. Idempotent.
    pub fn sort_by_recommended_order(steps: &[AnalysisStep]) -> Vec<AnalysisStep> {
        let mut sorted = steps.to_vec();
        sorted.sort_by_key(|s| catalog::recommended_rank(&s.id).unwrap_or(usize::MAX));
        sorted
    }

    /// Check structural invariants: unique ids, all dependencies present.
    pub fn validate(workflow: &Workflow) -> Result<(), WorkflowError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for step in &workflow.steps {
            if !seen.insert(&step.id) {
                return Err(WorkflowError::DuplicateStep(step.id.clone()));
            }
        }
        for step in &workflow.steps {
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(WorkflowError::MissingDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    // ---- helpers ----

    /// Add missing dependencies (transitively) to the step list.
    fn close_over_dependencies(steps: &mut Vec<AnalysisStep>, seen: &mut HashSet<String>) {
        let mut queue: Vec<String> = steps
            .iter()
            .flat_map(|s| s.dependencies.iter().cloned())
            .collect();

        while let Some(dep) = queue.pop() {
            if seen.contains(&dep) {
                continue;
            }
            if let Some(step) = catalog::catalog_step(&dep, RequirementLevel::Recommended) {
                queue.extend(step.dependencies.iter().cloned());
                seen.insert(step.id.clone());
                steps.push(step);
            }
        }
    }

    fn renumber_steps(mut steps: Vec<AnalysisStep>) -> Vec<AnalysisStep> {
        for (index, step) in steps.iter_mut().enumerate() {
            step.order = ((index + 1) * 10) as u32;
        }
        steps
    }
}
