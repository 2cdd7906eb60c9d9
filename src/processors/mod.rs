//! Stage processors and the factories that build them.
//!
//! The orchestrator only sees [`ProcessorFactory`] and [`StageProcessor`].
//! Two real factories exist: [`BuiltinFactory`] (deterministic in-process
//! agents, one per stage) and [`CommandFactory`] (an external program that
//! speaks JSON over stdin/stdout). [`ConfiguredFactory`] picks one from the
//! loaded configuration.

pub mod agents;
pub mod artifacts;
pub mod external;

pub use agents::{AgentRun, BuiltinFactory, StageAgent};
pub use artifacts::ArtifactStore;
pub use external::{CommandFactory, ExternalProcessor};

use anyhow::Result;
use async_trait::async_trait;
use stagehand_common::{Stage, StageContext, StageResponse};

use crate::config::Config;

/// Performs one stage's work for the context it was created with.
///
/// Returning `Err` is not fatal: the orchestrator records the stage as
/// failed and keeps the pipeline resumable.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    fn stage(&self) -> Stage;

    async fn execute(&self) -> Result<StageResponse>;
}

/// Maps a stage to the processor that handles it.
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, stage: Stage, context: StageContext) -> Box<dyn StageProcessor>;
}

/// The factory selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredFactory {
    Builtin(BuiltinFactory),
    Command(CommandFactory),
}

impl ConfiguredFactory {
    /// External command when one is configured, built-in agents otherwise.
    pub fn from_config(config: &Config) -> Self {
        match config.processor_command() {
            Some(command) => ConfiguredFactory::Command(CommandFactory::new(
                command,
                config.processor_args().to_vec(),
                config.project_dir.clone(),
            )),
            None => ConfiguredFactory::Builtin(BuiltinFactory::from_config(config)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ConfiguredFactory::Builtin(_) => "built-in agents".to_string(),
            ConfiguredFactory::Command(factory) => format!("external command `{}`", factory.command()),
        }
    }
}

impl ProcessorFactory for ConfiguredFactory {
    fn create(&self, stage: Stage, context: StageContext) -> Box<dyn StageProcessor> {
        match self {
            ConfiguredFactory::Builtin(factory) => factory.create(stage, context),
            ConfiguredFactory::Command(factory) => factory.create(stage, context),
        }
    }
}

/// Scripted processors for orchestrator and command tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub enum Script {
        Respond(StageResponse),
        Fail(String),
    }

    /// Returns a canned result per stage and records every context it sees.
    #[derive(Clone)]
    pub struct ScriptedFactory {
        scripts: BTreeMap<Stage, Script>,
        fallback: Script,
        contexts: Arc<Mutex<Vec<StageContext>>>,
    }

    impl ScriptedFactory {
        /// Every stage succeeds and waits for approval.
        pub fn approving() -> Self {
            Self {
                scripts: BTreeMap::new(),
                fallback: Script::Respond(StageResponse::success("done")),
                contexts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Every stage succeeds without waiting for approval.
        pub fn auto() -> Self {
            Self {
                fallback: Script::Respond(StageResponse::success("done").requiring_approval(false)),
                ..Self::approving()
            }
        }

        pub fn with(mut self, stage: Stage, script: Script) -> Self {
            self.scripts.insert(stage, script);
            self
        }

        pub fn contexts(&self) -> Vec<StageContext> {
            self.contexts.lock().unwrap().clone()
        }
    }

    struct ScriptedProcessor {
        stage: Stage,
        script: Script,
    }

    #[async_trait]
    impl StageProcessor for ScriptedProcessor {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn execute(&self) -> Result<StageResponse> {
            match &self.script {
                Script::Respond(resp) => Ok(resp.clone()),
                Script::Fail(msg) => Err(anyhow::anyhow!(msg.clone())),
            }
        }
    }

    impl ProcessorFactory for ScriptedFactory {
        fn create(&self, stage: Stage, context: StageContext) -> Box<dyn StageProcessor> {
            self.contexts.lock().unwrap().push(context);
            let script = self
                .scripts
                .get(&stage)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone());
            Box::new(ScriptedProcessor { stage, script })
        }
    }
}
