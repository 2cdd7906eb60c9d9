//! The pipeline state machine.
//!
//! Every operation is one load → mutate → save cycle against the store the
//! orchestrator was built with. Nothing is cached between calls, so the
//! persisted document is always the single source of truth.
//!
//! ```text
//! spec → tech → impl → test → sec → perf → docs → ready → completed
//! ```
//!
//! A stage becomes `approved` only by explicit approval, or by a processor
//! result that does not require approval. Either way, a stage is never
//! approved while an earlier stage is not.

use anyhow::anyhow;
use serde_json::Value;
use stagehand_common::{PipelineStatus, Stage, StageContext, StageCursor, StageResponse, StageStatus};

use super::state::{HALT_NOTE_PREFIX, PipelineState, StateStore};
use super::status::StatusReport;
use crate::errors::{PipelineError, PipelineResult};
use crate::processors::ProcessorFactory;

/// Optional choices recorded alongside an approval.
#[derive(Debug, Clone, Default)]
pub struct Approval {
    pub user_input: Option<String>,
    pub selected_alternative: Option<Value>,
    pub approved_recommendation: Option<Value>,
}

/// The stage that ran (or `Completed`) and what its processor returned.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun {
    pub stage: StageCursor,
    pub response: StageResponse,
}

pub struct Orchestrator<S, F> {
    store: S,
    factory: F,
}

impl<S: StateStore, F: ProcessorFactory> Orchestrator<S, F> {
    pub fn new(store: S, factory: F) -> Self {
        Self { store, factory }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn load_state(&self) -> PipelineState {
        self.store.load()
    }

    /// Replace any existing pipeline with a fresh one for `feature`.
    pub fn start_pipeline(&self, feature: &str, description: &str) -> PipelineResult<PipelineState> {
        let feature = feature.trim();
        if feature.is_empty() {
            return Err(PipelineError::InvalidFeature(
                "feature name must not be empty".to_string(),
            ));
        }

        let state = PipelineState::new(feature, description.trim());
        self.store.save(&state)?;
        tracing::info!(feature, "pipeline started");
        Ok(state)
    }

    pub fn get_current_stage(&self) -> PipelineResult<StageCursor> {
        let state = self.store.load();
        ensure_running(&state)?;
        Ok(state.resolved_cursor())
    }

    /// Run the current stage's processor and apply its result.
    pub async fn execute_current_stage(&self) -> PipelineResult<StageRun> {
        let mut state = self.store.load();
        ensure_running(&state)?;

        match state.resolved_cursor() {
            StageCursor::Completed => Ok(StageRun {
                stage: StageCursor::Completed,
                response: StageResponse::success("All stages completed")
                    .requiring_approval(false)
                    .with_next_action("Feature is ready for release"),
            }),
            StageCursor::At(stage) => self.run_stage(&mut state, stage).await,
        }
    }

    /// Run a named stage out of order, moving the stage pointer to it.
    pub async fn execute_stage(&self, stage: Stage) -> PipelineResult<StageRun> {
        let mut state = self.store.load();
        ensure_running(&state)?;
        self.run_stage(&mut state, stage).await
    }

    async fn run_stage(&self, state: &mut PipelineState, stage: Stage) -> PipelineResult<StageRun> {
        let context = build_context(state, stage);
        let processor = self.factory.create(stage, context);

        tracing::info!(stage = %stage, feature = %state.feature, "executing stage");
        let response = match processor.execute().await {
            Ok(response) => response,
            Err(source) => {
                let err = PipelineError::Processor { stage, source };
                tracing::warn!(stage = %stage, error = %err, "stage processor failed");
                StageResponse::failure(err.to_string())
            }
        };

        apply_response(state, stage, &response);
        state.agent_responses.insert(stage, response.clone());
        state.touch();
        self.store.save(state)?;

        tracing::info!(
            stage = %stage,
            stage_status = %state.status_of(stage),
            pipeline_status = %state.current_status,
            "stage result applied"
        );

        Ok(StageRun {
            stage: StageCursor::At(stage),
            response,
        })
    }

    /// Approve a stage and move the pointer to the next unapproved one.
    ///
    /// Works on `pending` and `failed` stages alike, whether or not the stage
    /// ran. Fails with [`PipelineError::OutOfOrder`] while an earlier stage is
    /// unapproved.
    pub fn approve_stage(&self, stage: Stage, approval: Approval) -> PipelineResult<PipelineState> {
        let mut state = self.store.load();
        ensure_running(&state)?;

        if let Some(blocking) = state.blocking_predecessor(stage) {
            return Err(PipelineError::OutOfOrder { stage, blocking });
        }

        state.set_status(stage, StageStatus::Approved);
        if let Some(input) = approval.user_input {
            state.user_input.insert(stage, input);
        }
        if let Some(choice) = approval.selected_alternative {
            state.selected_alternatives.insert(stage, choice);
        }
        if let Some(choice) = approval.approved_recommendation {
            state.approved_recommendations.insert(stage, choice);
        }

        state.current_stage = state.first_unapproved();
        match state.current_stage {
            StageCursor::Completed => {
                state.current_status = PipelineStatus::Approved;
                state.notes = "Pipeline completed".to_string();
            }
            StageCursor::At(next) => {
                state.current_status = PipelineStatus::InProgress;
                state.notes = format!("Ready for {} stage", next);
            }
        }
        state.touch();
        self.store.save(&state)?;

        tracing::info!(stage = %stage, next = %state.current_stage, "stage approved");
        Ok(state)
    }

    /// Attach free text to the current stage for its next run.
    pub fn provide_user_input(&self, input: &str) -> PipelineResult<Stage> {
        let input = input.trim();
        if input.is_empty() {
            return Err(anyhow!("Input must not be empty").into());
        }

        let mut state = self.store.load();
        let stage = current_open_stage(&state)?;
        state.user_input.insert(stage, input.to_string());
        state.notes = format!("Input recorded for {} stage", stage);
        state.touch();
        self.store.save(&state)?;

        tracing::info!(stage = %stage, "user input recorded");
        Ok(stage)
    }

    pub fn get_status(&self) -> StatusReport {
        StatusReport::from_state(&self.store.load())
    }

    /// Halt all execution until [`Self::clear_emergency_stop`] is called.
    pub fn emergency_stop(&self, reason: &str) -> PipelineResult<()> {
        let reason = match reason.trim() {
            "" => "no reason given",
            reason => reason,
        };

        let mut state = self.store.load();
        state.emergency_stop = true;
        state.current_status = PipelineStatus::Failed;
        state.notes = format!("{}{}", HALT_NOTE_PREFIX, reason);
        state.touch();
        self.store.save(&state)?;

        tracing::warn!(reason, "emergency stop activated");
        Ok(())
    }

    pub fn clear_emergency_stop(&self) -> PipelineResult<StageCursor> {
        let mut state = self.store.load();
        if !state.emergency_stop {
            return Err(PipelineError::NotHalted);
        }

        state.emergency_stop = false;
        state.current_stage = state.resolved_cursor();
        state.current_status = if state.current_stage.is_completed() {
            PipelineStatus::Approved
        } else {
            PipelineStatus::InProgress
        };
        state.notes = "Emergency stop cleared".to_string();
        state.touch();
        self.store.save(&state)?;

        tracing::info!(current = %state.current_stage, "emergency stop cleared");
        Ok(state.current_stage)
    }

    /// Reject a stage: mark it failed and point the pipeline at it.
    pub fn fail_stage(&self, stage: Stage, reason: &str) -> PipelineResult<()> {
        let mut state = self.store.load();
        ensure_running(&state)?;
        if state.status_of(stage).is_approved() {
            return Err(PipelineError::AlreadyApproved { stage });
        }

        let reason = reason.trim();
        state.set_status(stage, StageStatus::Failed);
        state.current_stage = StageCursor::At(stage);
        state.current_status = PipelineStatus::Failed;
        state.notes = if reason.is_empty() {
            format!("{} stage rejected", stage)
        } else {
            format!("{} stage rejected: {}", stage, reason)
        };
        state.touch();
        self.store.save(&state)?;

        tracing::info!(stage = %stage, reason, "stage rejected");
        Ok(())
    }

    /// Record the alternative chosen for the current stage.
    pub fn select_alternative(&self, choice: Value) -> PipelineResult<Stage> {
        let mut state = self.store.load();
        let stage = current_open_stage(&state)?;
        state.selected_alternatives.insert(stage, choice);
        state.notes = format!("Alternative selected for {} stage", stage);
        state.touch();
        self.store.save(&state)?;
        Ok(stage)
    }

    /// Record the recommendation accepted for the current stage.
    pub fn approve_recommendation(&self, choice: Value) -> PipelineResult<Stage> {
        let mut state = self.store.load();
        let stage = current_open_stage(&state)?;
        state.approved_recommendations.insert(stage, choice);
        state.notes = format!("Recommendation accepted for {} stage", stage);
        state.touch();
        self.store.save(&state)?;
        Ok(stage)
    }
}

fn ensure_running(state: &PipelineState) -> PipelineResult<()> {
    if state.emergency_stop {
        return Err(PipelineError::Halted {
            reason: state.halt_reason().to_string(),
        });
    }
    Ok(())
}

fn current_open_stage(state: &PipelineState) -> PipelineResult<Stage> {
    state
        .resolved_cursor()
        .stage()
        .ok_or_else(|| anyhow!("Pipeline is completed; there is no current stage").into())
}

fn build_context(state: &PipelineState, stage: Stage) -> StageContext {
    StageContext {
        feature: state.feature.clone(),
        description: state.description.clone(),
        current_stage: stage,
        user_input: state.user_input.get(&stage).cloned(),
        approvals: state.stages.clone(),
        previous_stage_results: state
            .agent_responses
            .iter()
            .filter(|(prev, _)| **prev != stage)
            .map(|(prev, resp)| (*prev, resp.clone()))
            .collect(),
    }
}

/// Fold a processor response into the state.
fn apply_response(state: &mut PipelineState, stage: Stage, response: &StageResponse) {
    // Re-running an approved stage only refreshes its recorded response.
    if state.status_of(stage).is_approved() {
        state.notes = format!("{} stage re-run; it remains approved", stage);
        return;
    }

    state.current_stage = StageCursor::At(stage);

    if response.requires_approval {
        // An unsuccessful result that still asks for a human leaves the stage as it was.
        if response.success {
            state.set_status(stage, StageStatus::Pending);
        }
        state.current_status = PipelineStatus::Pending;
        state.notes = format!("Waiting for approval of {} stage", stage);
    } else if !response.success {
        state.set_status(stage, StageStatus::Failed);
        state.current_status = PipelineStatus::Failed;
        state.notes = format!("{} stage failed: {}", stage, response.message);
    } else if let Some(blocking) = state.blocking_predecessor(stage) {
        state.set_status(stage, StageStatus::Pending);
        state.current_status = PipelineStatus::Pending;
        state.notes = format!(
            "{} stage completed; approve {} before it can be approved",
            stage, blocking
        );
    } else {
        state.set_status(stage, StageStatus::Approved);
        state.current_stage = state.first_unapproved();
        state.current_status = if state.current_stage.is_completed() {
            PipelineStatus::Approved
        } else {
            PipelineStatus::InProgress
        };
        state.notes = format!("{} stage completed", stage);
    }
}
