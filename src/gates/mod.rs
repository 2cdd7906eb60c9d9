use crate::ui::PipelineUI;
use anyhow::Result;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use stagehand_common::{Stage, StageResponse};

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Approve,
    ApproveAll, // User chose "yes to all"
    Input(String),
    Reject(String),
    Stop,
}

pub struct ApprovalGate {
    pub skip_all: bool,
}

impl ApprovalGate {
    pub fn new(skip_all: bool) -> Self {
        Self { skip_all }
    }

    pub fn check_stage(
        &mut self,
        stage: Stage,
        response: &StageResponse,
        ui: &PipelineUI,
    ) -> Result<GateDecision> {
        ui.print_response(stage, response);

        // --yes approves successful stages but never a failure
        if self.skip_all {
            if !response.success {
                println!(
                    "  {} (--yes does not approve failed stages)",
                    console::style("Stopping").dim()
                );
                return Ok(GateDecision::Stop);
            }
            println!("  {} (--yes flag)", console::style("Auto-approved").dim());
            return Ok(GateDecision::Approve);
        }

        self.prompt_user(stage, response)
    }

    fn prompt_user(&mut self, stage: Stage, response: &StageResponse) -> Result<GateDecision> {
        let mut options = vec![
            format!("Approve the {} stage", stage),
            "Approve this and all remaining stages (--yes)".to_string(),
        ];
        let answers_questions = response.needs_input();
        options.push(if answers_questions {
            "Answer the questions and re-run".to_string()
        } else {
            "Add input and re-run".to_string()
        });
        options.push("Reject this stage".to_string());
        options.push("Stop here".to_string());

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} is waiting for approval", stage.display_name()))
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => Ok(GateDecision::Approve),
            1 => {
                self.skip_all = true;
                Ok(GateDecision::ApproveAll)
            }
            2 => {
                let text: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt(if answers_questions { "Answers" } else { "Input" })
                    .interact_text()?;
                Ok(GateDecision::Input(text))
            }
            3 => {
                let reason: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Reason")
                    .allow_empty(true)
                    .interact_text()?;
                Ok(GateDecision::Reject(reason))
            }
            _ => Ok(GateDecision::Stop),
        }
    }
}
