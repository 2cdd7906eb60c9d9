use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stagehand_common::{PipelineStatus, Stage, StageCursor, StageResponse, StageStatus};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{PipelineError, PipelineResult};

/// Version of the persisted document layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Feature name used by a state that was never started.
pub const DEFAULT_FEATURE: &str = "new-feature";

pub const HALT_NOTE_PREFIX: &str = "EMERGENCY STOP: ";

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_stages() -> BTreeMap<Stage, StageStatus> {
    Stage::ALL
        .iter()
        .map(|stage| (*stage, StageStatus::Pending))
        .collect()
}

/// The complete persisted record of one feature's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub feature: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_stages")]
    pub stages: BTreeMap<Stage, StageStatus>,
    #[serde(default)]
    pub current_stage: StageCursor,
    #[serde(default)]
    pub current_status: PipelineStatus,
    #[serde(default)]
    pub emergency_stop: bool,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub agent_responses: BTreeMap<Stage, StageResponse>,
    #[serde(default)]
    pub user_input: BTreeMap<Stage, String>,
    #[serde(default)]
    pub selected_alternatives: BTreeMap<Stage, Value>,
    #[serde(default)]
    pub approved_recommendations: BTreeMap<Stage, Value>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            feature: DEFAULT_FEATURE.to_string(),
            description: String::new(),
            stages: default_stages(),
            current_stage: StageCursor::At(Stage::Spec),
            current_status: PipelineStatus::InProgress,
            emergency_stop: false,
            notes: "Pipeline ready".to_string(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            agent_responses: BTreeMap::new(),
            user_input: BTreeMap::new(),
            selected_alternatives: BTreeMap::new(),
            approved_recommendations: BTreeMap::new(),
        }
    }
}

impl PipelineState {
    /// A fresh state for a newly started feature.
    ///
    /// Unlike [`Default`], which stands for a pipeline that was never started
    /// and carries the epoch as its timestamps, this is stamped with the
    /// current time.
    pub fn new(feature: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            feature: feature.to_string(),
            description: description.to_string(),
            notes: format!("Started pipeline for {}", feature),
            created_at: now,
            last_updated: now,
            ..Self::default()
        }
    }

    pub fn status_of(&self, stage: Stage) -> StageStatus {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    pub fn set_status(&mut self, stage: Stage, status: StageStatus) {
        self.stages.insert(stage, status);
    }

    /// First stage in pipeline order that is not approved, or `Completed`.
    pub fn first_unapproved(&self) -> StageCursor {
        Stage::ALL
            .into_iter()
            .find(|stage| !self.status_of(*stage).is_approved())
            .map_or(StageCursor::Completed, StageCursor::At)
    }

    /// First predecessor of `stage` that is not yet approved.
    pub fn blocking_predecessor(&self, stage: Stage) -> Option<Stage> {
        stage
            .predecessors()
            .iter()
            .copied()
            .find(|prev| !self.status_of(*prev).is_approved())
    }

    /// The stage the pipeline is on.
    ///
    /// The stored pointer wins while it names an unapproved stage (it may
    /// have been moved there by a direct stage run). A stale pointer falls
    /// back to the first unapproved stage in pipeline order.
    pub fn resolved_cursor(&self) -> StageCursor {
        match self.current_stage {
            StageCursor::At(stage) if !self.status_of(stage).is_approved() => self.current_stage,
            _ => self.first_unapproved(),
        }
    }

    /// Reason recorded by the last emergency stop.
    pub fn halt_reason(&self) -> &str {
        self.notes
            .strip_prefix(HALT_NOTE_PREFIX)
            .unwrap_or(&self.notes)
    }

    pub fn approved_count(&self) -> usize {
        Stage::ALL
            .iter()
            .filter(|stage| self.status_of(**stage).is_approved())
            .count()
    }

    /// `"<approved>/<total>"`.
    pub fn progress(&self) -> String {
        format!("{}/{}", self.approved_count(), Stage::ALL.len())
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Fill in any stage missing from a decoded document.
    fn normalize(mut self) -> Self {
        for stage in Stage::ALL {
            self.stages.entry(stage).or_default();
        }
        self
    }
}

/// Durable home of the single pipeline state.
///
/// `load` is best-effort: any read or decode failure yields a fresh default
/// state. `save` replaces the whole document.
pub trait StateStore: Send + Sync {
    fn load(&self) -> PipelineState;
    fn save(&self, state: &PipelineState) -> PipelineResult<()>;
}

/// JSON document on disk at a fixed path.
pub struct FileStateStore {
    state_file: PathBuf,
}

impl FileStateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    pub fn exists(&self) -> bool {
        self.state_file.exists()
    }

    fn read(&self) -> anyhow::Result<PipelineState> {
        use anyhow::Context;

        let content = fs::read_to_string(&self.state_file)
            .with_context(|| format!("Failed to read {}", self.state_file.display()))?;
        let state: PipelineState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.state_file.display()))?;
        if state.schema_version > SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema version {} (newest supported is {})",
                state.schema_version,
                SCHEMA_VERSION
            );
        }
        Ok(state.normalize())
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> PipelineState {
        if !self.state_file.exists() {
            tracing::debug!(path = %self.state_file.display(), "no pipeline state, using defaults");
            return PipelineState::default();
        }
        match self.read() {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(
                    path = %self.state_file.display(),
                    error = %format!("{:#}", err),
                    "unreadable pipeline state, falling back to defaults"
                );
                PipelineState::default()
            }
        }
    }

    fn save(&self, state: &PipelineState) -> PipelineResult<()> {
        let content = serde_json::to_string_pretty(state).map_err(PipelineError::StateEncode)?;

        if let Some(parent) = self.state_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| PipelineError::StateWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.state_file, content).map_err(|source| PipelineError::StateWrite {
            path: self.state_file.clone(),
            source,
        })?;

        tracing::debug!(path = %self.state_file.display(), "pipeline state saved");
        Ok(())
    }
}

/// In-process store, for tests and embedding.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<PipelineState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PipelineState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// The last saved state, if any.
    pub fn snapshot(&self) -> Option<PipelineState> {
        self.state.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> PipelineState {
        self.snapshot().unwrap_or_default()
    }

    fn save(&self, state: &PipelineState) -> PipelineResult<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        *guard = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn make_store() -> (FileStateStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".stagehand").join("pipeline.json");
        (FileStateStore::new(path), dir)
    }

    fn assert_default(state: &PipelineState) {
        assert_eq!(state.feature, DEFAULT_FEATURE);
        assert_eq!(state.stages.len(), 8);
        assert!(state.stages.values().all(|s| *s == StageStatus::Pending));
        assert_eq!(state.current_stage, StageCursor::At(Stage::Spec));
        assert!(!state.emergency_stop);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let (store, _dir) = make_store();
        assert_default(&store.load());
    }

    #[test]
    fn test_never_started_state_has_fixed_timestamps() {
        let (store, _dir) = make_store();
        let state = store.load();
        assert_eq!(state.created_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(state, store.load());

        let started = PipelineState::new("billing", "");
        assert!(started.created_at > DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(started.created_at, started.last_updated);
    }

    #[test]
    fn test_load_corrupt_file_returns_default() {
        let (store, _dir) = make_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "feature: \"login\"\nstages:\n  spec: approved\n").unwrap();
        assert_default(&store.load());
    }

    #[test]
    fn test_load_newer_schema_returns_default() {
        let (store, _dir) = make_store();
        let mut doc = serde_json::to_value(PipelineState::new("login", "")).unwrap();
        doc["schema_version"] = json!(SCHEMA_VERSION + 1);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), doc.to_string()).unwrap();
        assert_default(&store.load());
    }

    #[test]
    fn test_save_then_load_is_fixed_point() {
        let (store, _dir) = make_store();
        let mut state = PipelineState::new("login-redesign", "improve login UX");
        state.set_status(Stage::Spec, StageStatus::Approved);
        state.set_status(Stage::Tech, StageStatus::Failed);
        state.current_stage = StageCursor::At(Stage::Tech);
        state.current_status = PipelineStatus::Failed;
        state.user_input.insert(Stage::Tech, "use postgres".into());
        state.agent_responses.insert(
            Stage::Spec,
            StageResponse::success("spec done").with_questions(vec!["Who?".into()]),
        );
        state
            .selected_alternatives
            .insert(Stage::Spec, json!({"id": "alternative-3"}));
        state
            .approved_recommendations
            .insert(Stage::Spec, json!("recommendation-1"));

        store.save(&state).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, state);

        store.save(&loaded).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_load_fills_missing_stages() {
        let (store, _dir) = make_store();
        let mut doc = serde_json::to_value(PipelineState::new("login", "")).unwrap();
        doc["stages"] = json!({"spec": "approved"});
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), doc.to_string()).unwrap();

        let state = store.load();
        assert_eq!(state.feature, "login");
        assert_eq!(state.stages.len(), 8);
        assert_eq!(state.status_of(Stage::Spec), StageStatus::Approved);
        assert_eq!(state.status_of(Stage::Ready), StageStatus::Pending);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let (store, _dir) = make_store();
        assert!(!store.exists());
        store.save(&PipelineState::default()).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn test_first_unapproved_and_progress() {
        let mut state = PipelineState::default();
        assert_eq!(state.first_unapproved(), StageCursor::At(Stage::Spec));
        assert_eq!(state.progress(), "0/8");

        state.set_status(Stage::Spec, StageStatus::Approved);
        state.set_status(Stage::Tech, StageStatus::Approved);
        assert_eq!(state.first_unapproved(), StageCursor::At(Stage::Impl));
        assert_eq!(state.blocking_predecessor(Stage::Test), Some(Stage::Impl));
        assert_eq!(state.blocking_predecessor(Stage::Impl), None);

        for stage in Stage::ALL {
            state.set_status(stage, StageStatus::Approved);
        }
        assert_eq!(state.first_unapproved(), StageCursor::Completed);
        assert_eq!(state.progress(), "8/8");
    }

    #[test]
    fn test_resolved_cursor_prefers_stored_pointer_until_stale() {
        let mut state = PipelineState::default();
        state.current_stage = StageCursor::At(Stage::Impl);
        assert_eq!(state.resolved_cursor(), StageCursor::At(Stage::Impl));

        state.set_status(Stage::Impl, StageStatus::Approved);
        assert_eq!(state.resolved_cursor(), StageCursor::At(Stage::Spec));

        state.current_stage = StageCursor::Completed;
        assert_eq!(state.resolved_cursor(), StageCursor::At(Stage::Spec));
    }

    #[test]
    fn test_halt_reason_strips_prefix() {
        let mut state = PipelineState::default();
        state.notes = format!("{}database migration running", HALT_NOTE_PREFIX);
        assert_eq!(state.halt_reason(), "database migration running");
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert_default(&store.load());
        let state = PipelineState::new("search", "faster search");
        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
        assert_eq!(store.snapshot(), Some(state));
    }

    #[test]
    fn test_recovery_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        {
            let store = FileStateStore::new(path.clone());
            let mut state = PipelineState::new("billing", "");
            state.set_status(Stage::Spec, StageStatus::Approved);
            store.save(&state).unwrap();
        }

        {
            let store = FileStateStore::new(path);
            let state = store.load();
            assert_eq!(state.feature, "billing");
            assert_eq!(state.status_of(Stage::Spec), StageStatus::Approved);
        }
    }
}
