//! The command layer: one call per user-facing pipeline operation.
//!
//! Every method returns a [`CommandOutcome`]. Errors from the orchestrator
//! are folded into `success: false` outcomes so callers (the CLI, or a chat
//! style dispatcher) never have to handle a `Result`.

use serde::Serialize;
use serde_json::Value;
use stagehand_common::{Stage, StageCursor, StageResponse};

use crate::errors::PipelineError;
use crate::orchestrator::{Approval, Orchestrator, StatusReport, StateStore};
use crate::processors::ProcessorFactory;

/// Uniform result envelope for every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    pub next_step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageCursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<StageResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusReport>,
}

impl CommandOutcome {
    fn ok(message: impl Into<String>, next_step: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            next_step: next_step.into(),
            stage: None,
            response: None,
            status: None,
        }
    }

    fn failed(err: &PipelineError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            next_step: recovery_hint(err).to_string(),
            stage: None,
            response: None,
            status: None,
        }
    }

    fn at(mut self, stage: StageCursor) -> Self {
        self.stage = Some(stage);
        self
    }

    fn with_response(mut self, response: StageResponse) -> Self {
        self.response = Some(response);
        self
    }

    fn with_status(mut self, status: StatusReport) -> Self {
        self.status = Some(status);
        self
    }
}

fn recovery_hint(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::Halted { .. } => "Run `stagehand resume` to clear the emergency stop",
        PipelineError::NotHalted => "Run `stagehand continue` to keep going",
        PipelineError::UnknownStage(_) => {
            "Use one of: spec, tech, impl, test, sec, perf, docs, ready"
        }
        PipelineError::OutOfOrder { .. } => "Approve earlier stages first",
        PipelineError::AlreadyApproved { .. } => "Approved stages cannot be rejected",
        PipelineError::InvalidFeature(_) => "Provide a feature name, e.g. `stagehand start login`",
        PipelineError::StateWrite { .. } | PipelineError::StateEncode(_) => {
            "Check that the state file location is writable"
        }
        PipelineError::Processor { .. } | PipelineError::Other(_) => {
            "Run `stagehand status` for details"
        }
    }
}

pub struct PipelineCommands<S, F> {
    orchestrator: Orchestrator<S, F>,
}

impl<S: StateStore, F: ProcessorFactory> PipelineCommands<S, F> {
    pub fn new(orchestrator: Orchestrator<S, F>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator<S, F> {
        &self.orchestrator
    }

    pub fn start(&self, feature: &str, description: Option<&str>) -> CommandOutcome {
        match self
            .orchestrator
            .start_pipeline(feature, description.unwrap_or_default())
        {
            Ok(state) => CommandOutcome::ok(
                format!("Started pipeline for {}", state.feature),
                "Run `stagehand continue` to execute the spec stage",
            )
            .at(state.current_stage),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    /// Execute the current stage. When the stage did not need approval it
    /// has already been approved, so the outcome points at the following one.
    pub async fn continue_pipeline(&self) -> CommandOutcome {
        match self.orchestrator.execute_current_stage().await {
            Ok(run) => self.run_outcome(run.stage, run.response),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn status(&self) -> CommandOutcome {
        let report = self.orchestrator.get_status();
        CommandOutcome::ok(
            format!("{}: {} ({})", report.feature, report.current_stage, report.progress),
            report.next_action.clone(),
        )
        .at(report.current_stage)
        .with_status(report)
    }

    /// Approve a stage by name. `alternative` and `recommendation` may be an
    /// id or a 1-based index into the stage's last response.
    pub fn approve(
        &self,
        stage: &str,
        user_input: Option<&str>,
        alternative: Option<&str>,
        recommendation: Option<&str>,
    ) -> CommandOutcome {
        let stage = match parse_stage(stage) {
            Ok(stage) => stage,
            Err(err) => return CommandOutcome::failed(&err),
        };

        let state = self.orchestrator.load_state();
        let last = state.agent_responses.get(&stage);
        let approval = Approval {
            user_input: user_input.map(str::to_string),
            selected_alternative: alternative
                .map(|choice| resolve_choice(last.map(|r| r.alternatives.as_slice()), choice)),
            approved_recommendation: recommendation
                .map(|choice| resolve_choice(last.map(|r| r.recommendations.as_slice()), choice)),
        };

        match self.orchestrator.approve_stage(stage, approval) {
            Ok(state) => {
                let next_step = match state.current_stage {
                    StageCursor::Completed => "Pipeline completed - feature is ready for release".to_string(),
                    StageCursor::At(next) => {
                        format!("Run `stagehand continue` to execute the {} stage", next)
                    }
                };
                CommandOutcome::ok(format!("Approved {} stage", stage), next_step)
                    .at(state.current_stage)
            }
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn input(&self, text: &str) -> CommandOutcome {
        match self.orchestrator.provide_user_input(text) {
            Ok(stage) => CommandOutcome::ok(
                format!("Input recorded for {} stage", stage),
                format!("Run `stagehand continue` to re-run the {} stage with your input", stage),
            )
            .at(StageCursor::At(stage)),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    /// Run one stage directly, outside the normal order.
    pub async fn run_agent(&self, stage: Stage) -> CommandOutcome {
        match self.orchestrator.execute_stage(stage).await {
            Ok(run) => self.run_outcome(run.stage, run.response),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn halt(&self, reason: &str) -> CommandOutcome {
        match self.orchestrator.emergency_stop(reason) {
            Ok(()) => CommandOutcome::ok(
                "Emergency stop activated",
                "Run `stagehand resume` when it is safe to continue",
            ),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn resume(&self) -> CommandOutcome {
        match self.orchestrator.clear_emergency_stop() {
            Ok(cursor) => {
                let next_step = match cursor {
                    StageCursor::Completed => "Pipeline completed - feature is ready for release".to_string(),
                    StageCursor::At(stage) => {
                        format!("Run `stagehand continue` to execute the {} stage", stage)
                    }
                };
                CommandOutcome::ok("Emergency stop cleared", next_step).at(cursor)
            }
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn reject(&self, stage: &str, reason: &str) -> CommandOutcome {
        let stage = match parse_stage(stage) {
            Ok(stage) => stage,
            Err(err) => return CommandOutcome::failed(&err),
        };
        match self.orchestrator.fail_stage(stage, reason) {
            Ok(()) => CommandOutcome::ok(
                format!("Rejected {} stage", stage),
                format!(
                    "Add input with `stagehand input` and run `stagehand continue` to redo the {} stage",
                    stage
                ),
            )
            .at(StageCursor::At(stage)),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn select_alternative(&self, choice: &str) -> CommandOutcome {
        let value = self.resolve_for_current(choice, |resp| resp.alternatives.as_slice());
        match self.orchestrator.select_alternative(value) {
            Ok(stage) => CommandOutcome::ok(
                format!("Alternative selected for {} stage", stage),
                format!("Run `stagehand approve {}` to accept it", stage),
            )
            .at(StageCursor::At(stage)),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    pub fn approve_recommendation(&self, choice: &str) -> CommandOutcome {
        let value = self.resolve_for_current(choice, |resp| resp.recommendations.as_slice());
        match self.orchestrator.approve_recommendation(value) {
            Ok(stage) => CommandOutcome::ok(
                format!("Recommendation accepted for {} stage", stage),
                format!("Run `stagehand approve {}` to accept the stage", stage),
            )
            .at(StageCursor::At(stage)),
            Err(err) => CommandOutcome::failed(&err),
        }
    }

    fn resolve_for_current(
        &self,
        choice: &str,
        options: impl Fn(&StageResponse) -> &[Value],
    ) -> Value {
        let state = self.orchestrator.load_state();
        let last = state
            .resolved_cursor()
            .stage()
            .and_then(|stage| state.agent_responses.get(&stage));
        resolve_choice(last.map(options), choice)
    }

    fn run_outcome(&self, cursor: StageCursor, response: StageResponse) -> CommandOutcome {
        let status = self.orchestrator.get_status();
        let message = match cursor {
            StageCursor::Completed => response.message.clone(),
            StageCursor::At(stage) => format!("{}: {}", stage.display_name(), response.message),
        };
        let next_step = response
            .next_action
            .clone()
            .filter(|_| response.success && response.requires_approval)
            .unwrap_or_else(|| status.next_action.clone());

        CommandOutcome {
            success: response.success,
            ..CommandOutcome::ok(message, next_step)
        }
        .at(cursor)
        .with_response(response)
        .with_status(status)
    }
}

fn parse_stage(name: &str) -> Result<Stage, PipelineError> {
    Ok(name.parse::<Stage>()?)
}

/// Match `choice` against `options` by 1-based index or `id`. Anything
/// unmatched is kept as the literal text.
fn resolve_choice(options: Option<&[Value]>, choice: &str) -> Value {
    let choice = choice.trim();
    let options = options.unwrap_or_default();

    if let Ok(index) = choice.parse::<usize>()
        && (1..=options.len()).contains(&index)
    {
        return options[index - 1].clone();
    }

    options
        .iter()
        .find(|option| option.get("id").and_then(Value::as_str) == Some(choice))
        .cloned()
        .unwrap_or_else(|| Value::String(choice.to_string()))
}
