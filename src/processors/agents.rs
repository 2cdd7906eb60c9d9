//! Built-in deterministic stage agents.
//!
//! Each stage is a variant of the closed [`StageAgent`] enum, so building a
//! processor for a stage is an exhaustive match rather than a name lookup.
//! The agents do not call out to any model: they derive a structured
//! analysis, clarification questions, alternatives and recommendations from
//! the feature context, and write one markdown artifact.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use stagehand_common::{Stage, StageContext, StageResponse};
use std::collections::BTreeMap;

use super::artifacts::{ArtifactStore, category};
use super::{ProcessorFactory, StageProcessor};
use crate::config::Config;

/// Builds a [`StageAgent`] for any stage.
#[derive(Debug, Clone)]
pub struct BuiltinFactory {
    artifacts: ArtifactStore,
    approval_overrides: BTreeMap<Stage, bool>,
}

impl BuiltinFactory {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self {
            artifacts,
            approval_overrides: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            artifacts: ArtifactStore::new(config.docs_root()),
            approval_overrides: config.approval_overrides(),
        }
    }

    /// Override whether a stage's successful result waits for approval.
    pub fn with_approval(mut self, stage: Stage, require_approval: bool) -> Self {
        self.approval_overrides.insert(stage, require_approval);
        self
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    fn requires_approval(&self, stage: Stage) -> bool {
        self.approval_overrides.get(&stage).copied().unwrap_or(true)
    }
}

impl ProcessorFactory for BuiltinFactory {
    fn create(&self, stage: Stage, context: StageContext) -> Box<dyn StageProcessor> {
        let run = AgentRun {
            context,
            artifacts: self.artifacts.clone(),
            require_approval: self.requires_approval(stage),
        };
        Box::new(StageAgent::new(stage, run))
    }
}

/// Inputs shared by every built-in agent.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub context: StageContext,
    pub artifacts: ArtifactStore,
    pub require_approval: bool,
}

#[derive(Debug, Clone)]
pub enum StageAgent {
    Spec(AgentRun),
    Tech(AgentRun),
    Impl(AgentRun),
    Test(AgentRun),
    Sec(AgentRun),
    Perf(AgentRun),
    Docs(AgentRun),
    Ready(AgentRun),
}

/// A response plus the markdown document that goes with it.
struct Draft {
    response: StageResponse,
    document: String,
}

impl StageAgent {
    pub fn new(stage: Stage, run: AgentRun) -> Self {
        match stage {
            Stage::Spec => StageAgent::Spec(run),
            Stage::Tech => StageAgent::Tech(run),
            Stage::Impl => StageAgent::Impl(run),
            Stage::Test => StageAgent::Test(run),
            Stage::Sec => StageAgent::Sec(run),
            Stage::Perf => StageAgent::Perf(run),
            Stage::Docs => StageAgent::Docs(run),
            Stage::Ready => StageAgent::Ready(run),
        }
    }

    pub fn run(&self) -> &AgentRun {
        match self {
            StageAgent::Spec(run)
            | StageAgent::Tech(run)
            | StageAgent::Impl(run)
            | StageAgent::Test(run)
            | StageAgent::Sec(run)
            | StageAgent::Perf(run)
            | StageAgent::Docs(run)
            | StageAgent::Ready(run) => run,
        }
    }

    fn draft(&self) -> Draft {
        match self {
            StageAgent::Spec(run) => draft_spec(&run.context),
            StageAgent::Tech(run) => draft_tech(&run.context),
            StageAgent::Impl(run) => draft_impl(&run.context),
            StageAgent::Test(run) => draft_test(&run.context),
            StageAgent::Sec(run) => draft_sec(&run.context),
            StageAgent::Perf(run) => draft_perf(&run.context),
            StageAgent::Docs(run) => draft_docs(&run.context),
            StageAgent::Ready(run) => draft_ready(&run.context),
        }
    }
}

#[async_trait]
impl StageProcessor for StageAgent {
    fn stage(&self) -> Stage {
        match self {
            StageAgent::Spec(_) => Stage::Spec,
            StageAgent::Tech(_) => Stage::Tech,
            StageAgent::Impl(_) => Stage::Impl,
            StageAgent::Test(_) => Stage::Test,
            StageAgent::Sec(_) => Stage::Sec,
            StageAgent::Perf(_) => Stage::Perf,
            StageAgent::Docs(_) => Stage::Docs,
            StageAgent::Ready(_) => Stage::Ready,
        }
    }

    async fn execute(&self) -> Result<StageResponse> {
        let stage = self.stage();
        let run = self.run();
        tracing::info!(
            stage = %stage,
            role = stage.role(),
            feature = %run.context.feature,
            "running built-in agent"
        );

        let Draft {
            mut response,
            document,
        } = self.draft();

        let artifact = run
            .artifacts
            .write(stage, &run.context.feature, &document)
            .map(|path| path.display().to_string())
            .map_err(|err| {
                tracing::warn!(stage = %stage, error = %format!("{:#}", err), "artifact write failed");
                format!("{:#}", err)
            });
        response.data = Some(with_artifact_data(response.data.take(), stage, artifact));

        if response.success {
            response.requires_approval = run.require_approval;
        }
        Ok(response)
    }
}

/// Adds the stage category and artifact outcome to a draft's data. Data that
/// is not an object is kept under `draft`.
fn with_artifact_data(
    data: Option<Value>,
    stage: Stage,
    artifact: Result<String, String>,
) -> Value {
    let mut map = match data {
        Some(Value::Object(map)) => map,
        Some(other) => Map::from_iter([("draft".to_string(), other)]),
        None => Map::new(),
    };
    map.insert("category".into(), json!(category(stage)));
    match artifact {
        Ok(path) => map.insert("artifact".into(), json!(path)),
        Err(err) => map.insert("artifact_error".into(), json!(err)),
    };
    Value::Object(map)
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn checklist(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- [ ] {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe(ctx: &StageContext) -> &str {
    if ctx.description.trim().is_empty() {
        "No description provided."
    } else {
        ctx.description.trim()
    }
}

fn input_section(ctx: &StageContext) -> String {
    match &ctx.user_input {
        Some(input) => format!("## Input From Reviewer\n{}\n\n", input),
        None => String::new(),
    }
}

fn footer(stage: Stage) -> String {
    format!(
        "\n---\nGenerated by the {} agent on {}\n",
        stage.role(),
        chrono::Utc::now().to_rfc3339()
    )
}

fn render_options(title: &str, options: &[Value]) -> String {
    let mut out = format!("## {}\n", title);
    for option in options {
        let name = option["name"]
            .as_str()
            .or_else(|| option["title"].as_str())
            .unwrap_or("Option");
        let id = option["id"].as_str().unwrap_or("-");
        let detail = option["description"]
            .as_str()
            .or_else(|| option["reasoning"].as_str())
            .unwrap_or("");
        out.push_str(&format!("### {} ({})\n{}\n\n", name, id, detail));
    }
    out
}

/// Questions are only asked until the reviewer has answered them.
fn open_questions(ctx: &StageContext, questions: Vec<String>) -> Vec<String> {
    if ctx.user_input.is_some() {
        Vec::new()
    } else {
        questions
    }
}

fn draft_spec(ctx: &StageContext) -> Draft {
    let analysis = json!({
        "feature": ctx.feature,
        "description": ctx.description,
        "businessValue": if ctx.user_input.is_some() { "See reviewer input" } else { "To be determined with stakeholders" },
        "stakeholders": "To be identified",
        "priority": "To be assessed",
        "complexity": "To be analyzed",
        "userInput": ctx.user_input,
    });
    let questions = open_questions(
        ctx,
        vec![
            format!("What is the business value of \"{}\"?", ctx.feature),
            "Who are the stakeholders for this feature?".to_string(),
            "What is the priority of this feature?".to_string(),
            "Are there specific performance requirements?".to_string(),
            "Are there security requirements we must follow?".to_string(),
            "What are the acceptance criteria for this feature?".to_string(),
        ],
    );
    let alternatives = vec![
        json!({
            "id": "alternative-1",
            "name": "Minimal Scope",
            "description": "Deliver the smallest change that satisfies the core use case",
            "pros": ["Quick to implement", "Low risk"],
            "cons": ["Limited functionality"],
            "effort": "Low",
        }),
        json!({
            "id": "alternative-2",
            "name": "Complete Solution",
            "description": "Cover every identified use case in a single delivery",
            "pros": ["Full functionality", "No follow-up work"],
            "cons": ["Longer delivery", "Higher risk"],
            "effort": "High",
        }),
        json!({
            "id": "alternative-3",
            "name": "Incremental Delivery",
            "description": "Ship the core use case first and extend it in small iterations",
            "pros": ["Early feedback", "Controlled risk"],
            "cons": ["Several release cycles"],
            "effort": "Medium",
        }),
    ];
    let recommendations = vec![json!({
        "id": "recommendation-1",
        "title": "Recommended approach: Incremental Delivery",
        "reasoning": "Delivers the core value early while keeping the option to extend the feature based on feedback.",
        "alternative": "alternative-3",
    })];

    let next_action = if questions.is_empty() {
        "Review and approve the specification"
    } else {
        "Answer the clarification questions, then approve the specification"
    };

    let mut document = format!(
        "# {} Feature Specification\n\n## Overview\n{}\n\n{}## Requirements\n{}\n\n## Acceptance Criteria\n{}\n\n",
        ctx.feature,
        describe(ctx),
        input_section(ctx),
        checklist(&[
            "Functional requirements agreed with stakeholders",
            "Non-functional requirements agreed with stakeholders",
        ]),
        checklist(&[
            "Feature works as described",
            "All tests pass",
            "Security requirements met",
            "Performance requirements met",
            "Documentation updated",
        ]),
    );
    document.push_str(&render_options("Alternatives", &alternatives));
    document.push_str(&render_options("Recommendations", &recommendations));
    if !questions.is_empty() {
        document.push_str(&format!("## Open Questions\n{}\n", bullets(&questions)));
    }
    document.push_str(&footer(Stage::Spec));

    Draft {
        response: StageResponse::success(format!("Specification drafted for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_questions(questions)
            .with_alternatives(alternatives)
            .with_recommendations(recommendations)
            .with_next_action(next_action),
        document,
    }
}

fn draft_tech(ctx: &StageContext) -> Draft {
    let spec_summary = ctx
        .previous(Stage::Spec)
        .map(|resp| resp.message.clone())
        .unwrap_or_else(|| "No specification recorded".to_string());
    let analysis = json!({
        "feature": ctx.feature,
        "basedOn": spec_summary,
        "components": ["domain model", "service layer", "interface layer", "persistence"],
        "integrationPoints": "To be confirmed against the existing system",
        "userInput": ctx.user_input,
    });
    let questions = open_questions(
        ctx,
        vec![
            "Which existing components does this feature extend?".to_string(),
            "What data needs to be persisted, and for how long?".to_string(),
            "Are there external services this feature depends on?".to_string(),
            "What are the expected load and data volumes?".to_string(),
        ],
    );
    let alternatives = vec![
        json!({
            "id": "alternative-1",
            "name": "Extend Existing Module",
            "description": "Add the feature inside the module that owns the closest domain",
            "effort": "Low",
        }),
        json!({
            "id": "alternative-2",
            "name": "Dedicated Service",
            "description": "Build the feature as a separately deployed service with its own API",
            "effort": "High",
        }),
        json!({
            "id": "alternative-3",
            "name": "New Internal Module",
            "description": "Create a new module with a narrow interface inside the existing deployable",
            "effort": "Medium",
        }),
    ];
    let recommendations = vec![json!({
        "id": "recommendation-1",
        "title": "Recommended design: New Internal Module",
        "reasoning": "Keeps deployment simple while isolating the new code behind a narrow interface.",
        "alternative": "alternative-3",
    })];

    let mut document = format!(
        "# {} Technical Design\n\n## Context\n{}\n\nBased on: {}\n\n{}## Components\n{}\n\n",
        ctx.feature,
        describe(ctx),
        analysis["basedOn"].as_str().unwrap_or_default(),
        input_section(ctx),
        checklist(&["Domain model", "Service layer", "Interface layer", "Persistence"]),
    );
    document.push_str(&render_options("Design Options", &alternatives));
    document.push_str(&render_options("Recommendations", &recommendations));
    if !questions.is_empty() {
        document.push_str(&format!("## Open Questions\n{}\n", bullets(&questions)));
    }
    document.push_str(&footer(Stage::Tech));

    let next_action = if questions.is_empty() {
        "Review and approve the technical design"
    } else {
        "Answer the architecture questions, then approve the technical design"
    };

    Draft {
        response: StageResponse::success(format!("Technical design drafted for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_questions(questions)
            .with_alternatives(alternatives)
            .with_recommendations(recommendations)
            .with_next_action(next_action),
        document,
    }
}

fn draft_impl(ctx: &StageContext) -> Draft {
    let tasks = vec![
        format!("Add domain types for {}", ctx.feature),
        "Implement service logic behind the agreed interface".to_string(),
        "Wire the interface layer to the service".to_string(),
        "Add persistence and migrations if required".to_string(),
    ];
    let analysis = json!({
        "feature": ctx.feature,
        "tasks": tasks,
        "userInput": ctx.user_input,
    });
    let recommendations = vec![
        json!({
            "id": "recommendation-1",
            "title": "Keep changes reviewable",
            "reasoning": "Land the tasks as separate commits so each can be reviewed on its own.",
        }),
        json!({
            "id": "recommendation-2",
            "title": "Follow the project's code quality gates",
            "reasoning": "Run the formatter, linter and unit tests before requesting approval.",
        }),
    ];

    let mut document = format!(
        "# {} Implementation Plan\n\n## Summary\n{}\n\n{}## Tasks\n{}\n\n",
        ctx.feature,
        describe(ctx),
        input_section(ctx),
        tasks
            .iter()
            .map(|task| format!("- [ ] {}", task))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    document.push_str(&render_options("Recommendations", &recommendations));
    document.push_str(&footer(Stage::Impl));

    Draft {
        response: StageResponse::success(format!("Implementation planned for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_recommendations(recommendations)
            .with_next_action("Review the implementation plan and approve"),
        document,
    }
}

fn draft_test(ctx: &StageContext) -> Draft {
    let analysis = json!({
        "feature": ctx.feature,
        "strategy": {
            "unit": "Cover domain rules and edge cases",
            "integration": "Exercise the service through its public interface",
            "endToEnd": "Walk the main user journey",
        },
        "coverageTarget": 80,
        "userInput": ctx.user_input,
    });
    let recommendations = vec![json!({
        "id": "recommendation-1",
        "title": "Write failing tests first for every acceptance criterion",
        "reasoning": "Each acceptance criterion from the specification maps to at least one test.",
    })];

    let mut document = format!(
        "# {} Test Plan\n\n## Scope\n{}\n\n{}## Strategy\n{}\n\nCoverage target: 80%\n\n",
        ctx.feature,
        describe(ctx),
        input_section(ctx),
        checklist(&["Unit tests", "Integration tests", "End-to-end tests"]),
    );
    document.push_str(&render_options("Recommendations", &recommendations));
    document.push_str(&footer(Stage::Test));

    Draft {
        response: StageResponse::success(format!("Test plan prepared for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_recommendations(recommendations)
            .with_next_action("Review the test results and approve"),
        document,
    }
}

const SECURITY_CHECKS: [&str; 6] = [
    "Access control enforced on every entry point",
    "Input validated and output encoded",
    "Secrets kept out of source and logs",
    "Sensitive data encrypted in transit and at rest",
    "Dependencies free of known vulnerabilities",
    "Security-relevant events are logged",
];

fn draft_sec(ctx: &StageContext) -> Draft {
    let checks: Vec<Value> = SECURITY_CHECKS
        .iter()
        .map(|check| json!({ "check": check, "status": "to verify" }))
        .collect();
    let analysis = json!({
        "feature": ctx.feature,
        "checks": checks,
        "userInput": ctx.user_input,
    });
    let recommendations = vec![json!({
        "id": "recommendation-1",
        "title": "Threat-model the new entry points",
        "reasoning": "Every new interface added by this feature should be reviewed for abuse cases.",
    })];

    let mut document = format!(
        "# {} Security Review\n\n## Scope\n{}\n\n{}## Checklist\n{}\n\n",
        ctx.feature,
        describe(ctx),
        input_section(ctx),
        checklist(&SECURITY_CHECKS),
    );
    document.push_str(&render_options("Recommendations", &recommendations));
    document.push_str(&footer(Stage::Sec));

    Draft {
        response: StageResponse::success(format!("Security review completed for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_recommendations(recommendations)
            .with_next_action("Review the security findings and approve"),
        document,
    }
}

fn draft_perf(ctx: &StageContext) -> Draft {
    let analysis = json!({
        "feature": ctx.feature,
        "budgets": {
            "p95LatencyMs": 200,
            "p99LatencyMs": 500,
            "errorRatePercent": 0.1,
        },
        "userInput": ctx.user_input,
    });
    let recommendations = vec![json!({
        "id": "recommendation-1",
        "title": "Measure before optimizing",
        "reasoning": "Record a baseline for the main user journey and compare against the budgets.",
    })];

    let mut document = format!(
        "# {} Performance Review\n\n## Scope\n{}\n\n{}## Budgets\n- p95 latency: 200 ms\n- p99 latency: 500 ms\n- Error rate: 0.1%\n\n",
        ctx.feature,
        describe(ctx),
        input_section(ctx),
    );
    document.push_str(&render_options("Recommendations", &recommendations));
    document.push_str(&footer(Stage::Perf));

    Draft {
        response: StageResponse::success(format!("Performance review completed for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_recommendations(recommendations)
            .with_next_action("Review the performance budgets and approve"),
        document,
    }
}

fn draft_docs(ctx: &StageContext) -> Draft {
    let sections = ["Overview", "Getting Started", "Usage", "Troubleshooting"];
    let analysis = json!({
        "feature": ctx.feature,
        "audience": "End users and support staff",
        "sections": sections,
        "userInput": ctx.user_input,
    });

    let mut document = format!(
        "# {} User Guide\n\n## Overview\n{}\n\n{}",
        ctx.feature,
        describe(ctx),
        input_section(ctx),
    );
    for section in &sections[1..] {
        document.push_str(&format!("## {}\nTo be completed.\n\n", section));
    }
    document.push_str(&footer(Stage::Docs));

    Draft {
        response: StageResponse::success(format!("User documentation drafted for \"{}\"", ctx.feature))
            .with_analysis(analysis)
            .with_next_action("Review the documentation and approve"),
        document,
    }
}

fn draft_ready(ctx: &StageContext) -> Draft {
    let unapproved: Vec<String> = Stage::Ready
        .predecessors()
        .iter()
        .filter(|stage| !ctx.approvals.get(*stage).is_some_and(|status| status.is_approved()))
        .map(|stage| stage.to_string())
        .collect();
    let failed: Vec<String> = ctx
        .previous_stage_results
        .iter()
        .filter(|(stage, resp)| **stage != Stage::Ready && !resp.success)
        .map(|(stage, _)| stage.to_string())
        .collect();
    let ready = unapproved.is_empty() && failed.is_empty();

    let analysis = json!({
        "feature": ctx.feature,
        "readyForRelease": ready,
        "unapprovedStages": unapproved,
        "failedStages": failed,
        "stagesReviewed": ctx.previous_stage_results.len(),
    });

    let stage_lines: Vec<String> = Stage::Ready
        .predecessors()
        .iter()
        .map(|stage| {
            let approved = ctx.approvals.get(stage).is_some_and(|status| status.is_approved());
            format!(
                "- [{}] {} ({})",
                if approved { "x" } else { " " },
                stage.display_name(),
                stage
            )
        })
        .collect();

    let verdict = if ready { "READY FOR RELEASE" } else { "NOT READY" };
    let mut document = format!(
        "# {} Release Readiness\n\n{}## Stage Sign-off\n{}\n\n## Verdict\n**{}**\n",
        ctx.feature,
        input_section(ctx),
        stage_lines.join("\n"),
        verdict,
    );
    document.push_str(&footer(Stage::Ready));

    let response = if ready {
        StageResponse::success(format!("Feature \"{}\" is ready for release", ctx.feature))
            .with_next_action("Approve to complete the pipeline")
    } else {
        let mut blockers = unapproved.clone();
        blockers.extend(failed.iter().cloned());
        blockers.sort();
        blockers.dedup();
        StageResponse::failure(format!(
            "Feature \"{}\" is not ready for release: {} not signed off",
            ctx.feature,
            blockers.join(", ")
        ))
        .with_next_action("Complete and approve the outstanding stages, then run the readiness check again")
    };

    Draft {
        response: response.with_analysis(analysis),
        document,
    }
}
