//! Gated sequential execution of the remaining stages: `stagehand run`.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;
use super::pipeline::{emit, open_pipeline};

pub async fn cmd_run(cli: &Cli, project_dir: &Path) -> Result<()> {
    use stagehand::gates::{ApprovalGate, GateDecision};
    use stagehand::orchestrator::Approval;
    use stagehand::ui::PipelineUI;
    use stagehand_common::{PipelineStatus, StageCursor};

    let (config, commands) = open_pipeline(cli, project_dir)?;
    let orchestrator = commands.orchestrator();

    if !orchestrator.store().exists() {
        eprintln!(
            "No pipeline found at {}. Run 'stagehand start <feature>' first.",
            config.state_file().display()
        );
        return Ok(());
    }

    let initial = orchestrator.load_state();
    let feature = initial.feature.clone();
    let ui = PipelineUI::new(initial.approved_count() as u64, cli.verbose);
    let mut gate = ApprovalGate::new(cli.yes);

    // A stage already waiting for approval is gated on its recorded response
    // instead of being executed again.
    let mut waiting = (initial.current_status == PipelineStatus::Pending)
        .then(|| {
            let stage = initial.resolved_cursor().stage()?;
            Some((stage, initial.agent_responses.get(&stage)?.clone()))
        })
        .flatten();

    loop {
        let stage = match orchestrator.get_current_stage() {
            Ok(StageCursor::At(stage)) => stage,
            Ok(StageCursor::Completed) => {
                ui.pipeline_complete(&feature);
                break;
            }
            Err(err) => {
                ui.pipeline_stopped(&err.to_string());
                break;
            }
        };

        let response = match waiting.take() {
            Some((pending, response)) if pending == stage => response,
            _ => {
                ui.start_stage(stage);
                match orchestrator.execute_current_stage().await {
                    Ok(run) => {
                        ui.stage_finished(stage, &run.response);
                        run.response
                    }
                    Err(err) => {
                        ui.pipeline_stopped(&err.to_string());
                        break;
                    }
                }
            }
        };

        if orchestrator.load_state().status_of(stage).is_approved() {
            ui.print_response(stage, &response);
            ui.stage_approved(stage);
            continue;
        }

        match gate.check_stage(stage, &response, &ui)? {
            GateDecision::Approve | GateDecision::ApproveAll => {
                if let Err(err) = orchestrator.approve_stage(stage, Approval::default()) {
                    ui.pipeline_stopped(&err.to_string());
                    break;
                }
                ui.stage_approved(stage);
            }
            GateDecision::Input(text) => {
                if let Err(err) = orchestrator.provide_user_input(&text) {
                    ui.pipeline_stopped(&err.to_string());
                    break;
                }
            }
            GateDecision::Reject(reason) => {
                if let Err(err) = orchestrator.fail_stage(stage, &reason) {
                    ui.pipeline_stopped(&err.to_string());
                    break;
                }
                ui.stage_rejected(stage, reason.trim());
                ui.pipeline_stopped(&format!(
                    "Stopped. Add input and run `stagehand run` to redo the {} stage.",
                    stage
                ));
                break;
            }
            GateDecision::Stop => {
                ui.pipeline_stopped(&format!(
                    "Stopped at the {} stage. Run `stagehand run` to pick up from here.",
                    stage
                ));
                break;
            }
        }
    }

    emit(cli, &commands.status())
}
