//! The request/response pair exchanged with a stage processor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::stage::{Stage, StageStatus};

/// Everything a stage processor is told about the feature it works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageContext {
    pub feature: String,
    pub description: String,
    pub current_stage: Stage,
    /// Free text the human recorded for this stage, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    /// Status of every stage at the moment the processor was created.
    pub approvals: BTreeMap<Stage, StageStatus>,
    /// Last recorded response of each stage that has run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub previous_stage_results: BTreeMap<Stage, StageResponse>,
}

impl StageContext {
    /// Whether every stage before the current one has been approved.
    pub fn predecessors_approved(&self) -> bool {
        self.current_stage.predecessors().iter().all(|stage| {
            self.approvals
                .get(stage)
                .is_some_and(|status| status.is_approved())
        })
    }

    /// The recorded response of an earlier stage.
    pub fn previous(&self, stage: Stage) -> Option<&StageResponse> {
        self.previous_stage_results.get(&stage)
    }
}

fn default_requires_approval() -> bool {
    true
}

/// Structured result of running one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    pub success: bool,
    pub message: String,
    /// Clarification questions for the human.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Value>,
    /// Whether a human must approve the stage before the pipeline advances.
    /// Absent in decoded responses means `true`.
    #[serde(default = "default_requires_approval")]
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StageResponse {
    /// A successful response that waits for approval.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            questions: Vec::new(),
            analysis: None,
            alternatives: Vec::new(),
            recommendations: Vec::new(),
            requires_approval: true,
            next_action: None,
            data: None,
        }
    }

    /// A failed response. Failures never wait for approval.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            requires_approval: false,
            ..Self::success(message)
        }
    }

    pub fn with_questions(mut self, questions: Vec<String>) -> Self {
        self.questions = questions;
        self
    }

    pub fn with_analysis(mut self, analysis: Value) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<Value>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_recommendations(mut self, recommendations: Vec<Value>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_next_action(mut self, next_action: impl Into<String>) -> Self {
        self.next_action = Some(next_action.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn requiring_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }

    /// Whether the response carries anything the human is expected to answer
    /// or choose between.
    pub fn needs_input(&self) -> bool {
        !self.questions.is_empty() || !self.alternatives.is_empty()
    }
}
