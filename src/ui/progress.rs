use crate::ui::icons::{
    CHECK, CROSS, DOC, HINT, OPTION, PENDING, PROGRESS, QUESTION, RUNNING, SPARKLE, STOP,
};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;
use stagehand_common::{Stage, StageResponse};
use std::time::Duration;

/// Terminal UI for `stagehand run`, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Stage bar: how many of the eight stages are approved
/// - Work bar: spinner while a stage processor runs
pub struct PipelineUI {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    work_bar: ProgressBar,
    verbose: bool,
}

impl PipelineUI {
    /// Create the UI with the stage bar already advanced to `approved`.
    pub fn new(approved: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let stage_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let stage_bar = multi.add(ProgressBar::new(Stage::ALL.len() as u64));
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix("Stages");
        stage_bar.set_position(approved);

        let work_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let work_bar = multi.add(ProgressBar::new_spinner());
        work_bar.set_style(work_style);
        work_bar.set_prefix("  Work");

        Self {
            multi,
            stage_bar,
            work_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Print the stage header and start the spinner.
    pub fn start_stage(&self, stage: Stage) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{}Stage {}: {}",
            RUNNING,
            style(stage.index() + 1).yellow().bold(),
            stage.display_name()
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));

        self.stage_bar
            .set_message(format!("{}", style(stage.as_str()).yellow()));
        self.work_bar.set_message(format!(
            "Running {} {}",
            style(stage.role()).cyan(),
            style("(starting...)").dim()
        ));
        self.work_bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// Stop the spinner with the processor's outcome.
    pub fn stage_finished(&self, stage: Stage, response: &StageResponse) {
        if response.success {
            self.work_bar
                .finish_with_message(format!("{}{} finished", CHECK, stage.display_name()));
        } else {
            self.work_bar.finish_with_message(format!(
                "{}{} failed: {}",
                CROSS,
                stage.display_name(),
                response.message
            ));
        }
        self.work_bar.reset();
    }

    pub fn stage_approved(&self, stage: Stage) {
        self.stage_bar.inc(1);
        self.print_line(format!(
            "{}{} approved",
            CHECK,
            style(stage.display_name()).green().bold()
        ));
    }

    pub fn stage_rejected(&self, stage: Stage, reason: &str) {
        self.print_line(format!(
            "{}{} rejected{}",
            CROSS,
            style(stage.display_name()).red().bold(),
            if reason.is_empty() {
                String::new()
            } else {
                format!(": {}", reason)
            }
        ));
    }

    pub fn pipeline_complete(&self, feature: &str) {
        self.stage_bar.finish_with_message("done");
        self.print_line(format!(
            "\n{}{} is ready for release!\n",
            SPARKLE,
            style(feature).green().bold()
        ));
    }

    pub fn pipeline_stopped(&self, reason: &str) {
        self.stage_bar.abandon();
        self.print_line(format!("\n{}{}\n", STOP, reason));
    }

    /// Print the parts of a stage response a reviewer needs before deciding.
    pub fn print_response(&self, stage: Stage, response: &StageResponse) {
        for line in response_lines(stage, response, self.verbose) {
            self.print_line(line);
        }
    }
}

/// Render a stage response as display lines.
///
/// Analysis is only included when `verbose` is set.
pub fn response_lines(stage: Stage, response: &StageResponse, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let icon = if !response.success {
        CROSS
    } else if response.requires_approval {
        PENDING
    } else {
        CHECK
    };
    lines.push(format!(
        "{}{}: {}",
        icon,
        style(stage.display_name()).bold(),
        response.message
    ));

    if !response.questions.is_empty() {
        lines.push(format!("  {}{}", QUESTION, style("Questions").underlined()));
        for (i, question) in response.questions.iter().enumerate() {
            lines.push(format!("     {}. {}", i + 1, question));
        }
    }
    if !response.alternatives.is_empty() {
        lines.push(format!("  {}{}", OPTION, style("Alternatives").underlined()));
        for (i, option) in response.alternatives.iter().enumerate() {
            lines.push(format!("     {}. {}", i + 1, describe_option(option)));
        }
    }
    if !response.recommendations.is_empty() {
        lines.push(format!("  {}{}", HINT, style("Recommendations").underlined()));
        for (i, option) in response.recommendations.iter().enumerate() {
            lines.push(format!("     {}. {}", i + 1, describe_option(option)));
        }
    }
    if let Some(artifact) = response
        .data
        .as_ref()
        .and_then(|data| data.get("artifact"))
        .and_then(Value::as_str)
    {
        lines.push(format!("  {}{}", DOC, style(artifact).dim()));
    }
    if verbose && let Some(analysis) = &response.analysis {
        lines.push(format!("  {}{}", PROGRESS, style("Analysis").underlined()));
        let pretty = serde_json::to_string_pretty(analysis).unwrap_or_else(|_| analysis.to_string());
        for line in pretty.lines() {
            lines.push(format!("     {}", style(line).dim()));
        }
    }
    lines
}

/// One-line summary of an alternative or recommendation object.
fn describe_option(option: &Value) -> String {
    let Some(object) = option.as_object() else {
        return match option {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
    };
    let id = object.get("id").and_then(Value::as_str);
    let title = ["name", "title", "summary", "description"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str));
    match (id, title) {
        (Some(id), Some(title)) => format!("{} [{}]", title, style(id).dim()),
        (None, Some(title)) => title.to_string(),
        (Some(id), None) => id.to_string(),
        (None, None) => option.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_option() {
        console::set_colors_enabled(false);
        assert_eq!(
            describe_option(&json!({"id": "alternative-1", "name": "Minimal"})),
            "Minimal [alternative-1]"
        );
        assert_eq!(describe_option(&json!({"title": "Cache"})), "Cache");
        assert_eq!(describe_option(&json!("plain")), "plain");
    }

    #[test]
    fn test_response_lines_lists_sections() {
        console::set_colors_enabled(false);
        let response = StageResponse::success("drafted")
            .with_questions(vec!["Who uses it?".into()])
            .with_alternatives(vec![json!({"id": "a", "name": "Small"})])
            .with_analysis(json!({"scope": "narrow"}))
            .with_data(json!({"artifact": "docs/specs/login.md"}));

        let lines = response_lines(Stage::Spec, &response, false);
        let text = lines.join("\n");
        assert!(text.contains("drafted"));
        assert!(text.contains("1. Who uses it?"));
        assert!(text.contains("Small [a]"));
        assert!(text.contains("docs/specs/login.md"));
        assert!(!text.contains("narrow"));

        let verbose = response_lines(Stage::Spec, &response, true).join("\n");
        assert!(verbose.contains("narrow"));
    }
}
