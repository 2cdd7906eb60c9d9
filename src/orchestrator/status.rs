use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use stagehand_common::{PipelineStatus, Stage, StageCursor, StageStatus};
use std::collections::BTreeMap;

use super::state::PipelineState;

/// Read-only projection of the pipeline state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub feature: String,
    pub description: String,
    pub current_stage: StageCursor,
    pub current_status: PipelineStatus,
    pub stages: BTreeMap<Stage, StageStatus>,
    /// `"<approved>/<total>"`
    pub progress: String,
    pub emergency_stop: bool,
    pub notes: String,
    pub next_action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    pub requires_user_input: bool,
    pub last_updated: DateTime<Utc>,
}

impl StatusReport {
    pub fn from_state(state: &PipelineState) -> Self {
        let cursor = state.resolved_cursor();
        let last_response = cursor
            .stage()
            .and_then(|stage| state.agent_responses.get(&stage));

        let (questions, alternatives, recommendations, analysis) = match last_response {
            Some(resp) => (
                resp.questions.clone(),
                resp.alternatives.clone(),
                resp.recommendations.clone(),
                resp.analysis.clone(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new(), None),
        };

        let requires_user_input = state.current_status == PipelineStatus::Pending
            && last_response.is_some_and(|resp| resp.needs_input());

        Self {
            feature: state.feature.clone(),
            description: state.description.clone(),
            current_stage: cursor,
            current_status: state.current_status,
            stages: state.stages.clone(),
            progress: state.progress(),
            emergency_stop: state.emergency_stop,
            notes: state.notes.clone(),
            next_action: next_action(state, cursor, requires_user_input),
            questions,
            alternatives,
            recommendations,
            analysis,
            requires_user_input,
            last_updated: state.last_updated,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.current_stage.is_completed()
    }
}

fn next_action(state: &PipelineState, cursor: StageCursor, needs_input: bool) -> String {
    if state.emergency_stop {
        return format!(
            "Pipeline halted ({}) - clear the emergency stop to continue",
            state.halt_reason()
        );
    }
    let Some(stage) = cursor.stage() else {
        return "Pipeline completed - feature is ready for release".to_string();
    };
    match state.current_status {
        PipelineStatus::Pending if needs_input => {
            format!("Please answer the questions from the {} agent", stage)
        }
        PipelineStatus::Pending => format!("Please approve the {} stage to continue", stage),
        PipelineStatus::InProgress => format!("Continue the pipeline to run the {} stage", stage),
        PipelineStatus::Approved => "Pipeline completed - feature is ready for release".to_string(),
        PipelineStatus::Failed => "Pipeline failed - check logs and fix issues".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stagehand_common::StageResponse;

    #[test]
    fn test_fresh_state_report() {
        let report = StatusReport::from_state(&PipelineState::new("login", "desc"));
        assert_eq!(report.current_stage, StageCursor::At(Stage::Spec));
        assert_eq!(report.progress, "0/8");
        assert_eq!(report.next_action, "Continue the pipeline to run the spec stage");
        assert!(!report.requires_user_input);
        assert!(report.questions.is_empty());
    }

    #[test]
    fn test_pending_with_questions_asks_for_answers() {
        let mut state = PipelineState::new("login", "");
        state.current_status = PipelineStatus::Pending;
        state.agent_responses.insert(
            Stage::Spec,
            StageResponse::success("drafted")
                .with_questions(vec!["Who?".into()])
                .with_analysis(json!({"scope": "small"})),
        );

        let report = StatusReport::from_state(&state);
        assert!(report.requires_user_input);
        assert_eq!(report.questions, vec!["Who?".to_string()]);
        assert_eq!(report.analysis, Some(json!({"scope": "small"})));
        assert_eq!(
            report.next_action,
            "Please answer the questions from the spec agent"
        );
    }

    #[test]
    fn test_pending_without_questions_asks_for_approval() {
        let mut state = PipelineState::new("login", "");
        state.current_status = PipelineStatus::Pending;
        state
            .agent_responses
            .insert(Stage::Spec, StageResponse::success("drafted"));
        let report = StatusReport::from_state(&state);
        assert!(!report.requires_user_input);
        assert_eq!(report.next_action, "Please approve the spec stage to continue");
    }

    #[test]
    fn test_failed_and_completed_and_halted() {
        let mut state = PipelineState::new("login", "");
        state.current_status = PipelineStatus::Failed;
        assert_eq!(
            StatusReport::from_state(&state).next_action,
            "Pipeline failed - check logs and fix issues"
        );

        state.emergency_stop = true;
        state.notes = "EMERGENCY STOP: outage".into();
        assert!(StatusReport::from_state(&state).next_action.contains("outage"));

        let mut done = PipelineState::new("login", "");
        for stage in Stage::ALL {
            done.set_status(stage, StageStatus::Approved);
        }
        done.current_stage = StageCursor::Completed;
        done.current_status = PipelineStatus::Approved;
        let report = StatusReport::from_state(&done);
        assert!(report.is_completed());
        assert_eq!(report.progress, "8/8");
        assert!(report.next_action.starts_with("Pipeline completed"));
    }

    #[test]
    fn test_report_serializes_stage_names() {
        let report = StatusReport::from_state(&PipelineState::new("login", ""));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["current_stage"], json!("spec"));
        assert_eq!(value["current_status"], json!("in_progress"));
        assert_eq!(value["stages"]["ready"], json!("pending"));
        assert!(value.get("questions").is_none());
    }
}
