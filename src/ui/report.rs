//! Plain (non-animated) rendering of command outcomes and status reports.

use console::style;
use stagehand_common::{PipelineStatus, Stage, StageCursor, StageStatus};

use super::icons::{CHECK, CROSS, HINT, PENDING, STOP};
use super::progress::response_lines;
use crate::commands::CommandOutcome;
use crate::orchestrator::StatusReport;

pub fn status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!("{}", style(format!("Pipeline: {}", report.feature)).bold()),
        format!("{}", style("=".repeat(10 + report.feature.len())).dim()),
    ];
    if !report.description.is_empty() {
        lines.push(report.description.clone());
    }
    lines.push(String::new());

    for stage in Stage::ALL {
        let status = report.stages.get(&stage).copied().unwrap_or_default();
        let icon = match status {
            StageStatus::Approved => CHECK,
            StageStatus::Failed => CROSS,
            StageStatus::Pending => PENDING,
        };
        let marker = if report.current_stage == StageCursor::At(stage) {
            format!("{}", style("<- current").yellow())
        } else {
            String::new()
        };
        lines.push(format!(
            "  {}{:<24} {:<9} {}",
            icon,
            stage.display_name(),
            status.to_string(),
            marker
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "Progress: {}  Status: {}",
        style(&report.progress).cyan(),
        colored_status(report.current_status)
    ));
    if report.emergency_stop {
        lines.push(format!("{}{}", STOP, style("Emergency stop is active").red().bold()));
    }
    lines.push(format!("Notes: {}", report.notes));
    lines.push(format!(
        "Updated: {}",
        report.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if !report.questions.is_empty() {
        lines.push(String::new());
        lines.push("Outstanding questions:".to_string());
        for (i, question) in report.questions.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, question));
        }
    }

    lines.push(String::new());
    lines.push(format!("{}Next: {}", HINT, report.next_action));
    lines
}

fn colored_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Approved => style(status).green().to_string(),
        PipelineStatus::Failed => style(status).red().to_string(),
        PipelineStatus::Pending => style(status).yellow().to_string(),
        PipelineStatus::InProgress => style(status).cyan().to_string(),
    }
}

pub fn print_status(report: &StatusReport) {
    for line in status_lines(report) {
        println!("{}", line);
    }
}

/// Print an outcome for humans. Failures go to stderr.
pub fn print_outcome(outcome: &CommandOutcome, verbose: bool) {
    if let Some(report) = &outcome.status
        && outcome.response.is_none()
    {
        print_status(report);
        return;
    }

    if !outcome.success {
        eprintln!("{}{}", CROSS, style(&outcome.message).red());
        eprintln!("   {}", style(&outcome.next_step).dim());
        if let (Some(StageCursor::At(stage)), Some(response)) = (outcome.stage, &outcome.response) {
            for line in response_lines(stage, response, verbose).into_iter().skip(1) {
                eprintln!("{}", line);
            }
        }
        return;
    }

    match (outcome.stage, &outcome.response) {
        (Some(StageCursor::At(stage)), Some(response)) => {
            for line in response_lines(stage, response, verbose) {
                println!("{}", line);
            }
        }
        _ => println!("{}{}", CHECK, outcome.message),
    }
    println!();
    println!("{}Next: {}", HINT, outcome.next_step);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PipelineState;

    #[test]
    fn test_status_lines_mark_current_stage() {
        console::set_colors_enabled(false);
        let mut state = PipelineState::new("login", "better login");
        state.set_status(Stage::Spec, StageStatus::Approved);
        state.current_stage = StageCursor::At(Stage::Tech);
        let report = StatusReport::from_state(&state);

        let lines = status_lines(&report);
        let current: Vec<_> = lines.iter().filter(|l| l.contains("<- current")).collect();
        assert_eq!(current.len(), 1);
        assert!(current[0].contains(Stage::Tech.display_name()));
        assert!(lines.iter().any(|l| l.contains("Progress: 1/8")));
        assert!(lines.iter().any(|l| l.contains("better login")));
        assert!(lines.last().is_some_and(|l| l.contains("Next:")));
    }

    #[test]
    fn test_status_lines_flag_emergency_stop() {
        console::set_colors_enabled(false);
        let mut state = PipelineState::new("login", "");
        state.emergency_stop = true;
        let lines = status_lines(&StatusReport::from_state(&state));
        assert!(lines.iter().any(|l| l.contains("Emergency stop is active")));
    }
}
