//! Stage processor backed by an external program.
//!
//! The program receives the [`StageContext`] as JSON on stdin and the stage
//! name in `STAGEHAND_STAGE`, and must print a [`StageResponse`] JSON object
//! on stdout. Text around the object is ignored.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use stagehand_common::{Stage, StageContext, StageResponse};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ProcessorFactory, StageProcessor};
use crate::util::extract_json_object;

#[derive(Debug, Clone)]
pub struct CommandFactory {
    command: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandFactory {
    pub fn new(command: impl Into<String>, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl ProcessorFactory for CommandFactory {
    fn create(&self, stage: Stage, context: StageContext) -> Box<dyn StageProcessor> {
        Box::new(ExternalProcessor {
            stage,
            context,
            command: self.command.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
        })
    }
}

pub struct ExternalProcessor {
    stage: Stage,
    context: StageContext,
    command: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl ExternalProcessor {
    fn parse_output(stdout: &str) -> Result<StageResponse> {
        let json = extract_json_object(stdout)
            .context("Processor output did not contain a JSON object")?;
        serde_json::from_str(&json).context("Processor output is not a valid stage response")
    }
}

#[async_trait]
impl StageProcessor for ExternalProcessor {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn execute(&self) -> Result<StageResponse> {
        let payload =
            serde_json::to_vec(&self.context).context("Failed to encode stage context")?;

        tracing::info!(stage = %self.stage, command = %self.command, "spawning stage processor");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .env("STAGEHAND_STAGE", self.stage.as_str())
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn processor `{}`", self.command))?;

        // A processor may exit without reading its input; the exit status decides.
        if let Some(mut stdin) = child.stdin.take()
            && let Err(err) = stdin.write_all(&payload).await
        {
            tracing::debug!(stage = %self.stage, error = %err, "processor closed stdin early");
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for processor")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(stage = %self.stage, stderr = %stderr.trim(), "processor stderr");
        }

        if !output.status.success() {
            bail!(
                "Processor `{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }

        Self::parse_output(&stdout)
    }
}
