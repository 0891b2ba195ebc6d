//! StateStore — the single writer for tickets, runs, and config under a
//! configurable base directory (default `runtime/state`).
//!
//! Every namespace is one JSON file per entity. Writes go to a sibling
//! `.tmp` file and are renamed into place so a crash never leaves a reader
//! looking at a half-written file.

use agentyard_core::{AgentId, ConversationHistory, Error, ExecutionState, Result, RunId, RunStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct StateStore {
    base: PathBuf,
}

/// Result of `resume_execution`: the freshly-running state plus the ids
/// the caller must rehydrate ("returns the list of restored worker and
/// agent IDs").
pub struct ResumedExecution {
    pub state: ExecutionState,
    pub worker_ids: Vec<agentyard_core::WorkerId>,
    pub agent_ids: Vec<AgentId>,
}

impl StateStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn tickets_dir(&self) -> PathBuf {
        self.base.join("tickets")
    }

    fn runs_dir(&self) -> PathBuf {
        self.base.join("runs")
    }

    fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir().join(run_id.as_str())
    }

    fn run_state_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("state.json")
    }

    fn config_path(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn ticket_tree_path(&self, project_id: &str) -> PathBuf {
        self.tickets_dir().join(format!("{}.json", project_id))
    }

    /// Writes `content` to `path` via a temp file + rename so readers never
    /// observe a partial write.
    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    /// Reads and parses `path`. `Ok(None)` means the file is absent;
    /// `Err` means it exists but failed to parse — these are distinct
    /// outcomes, not collapsed into one.
    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // -- tickets ------------------------------------------------------

    pub async fn save_ticket_tree(&self, tree: &agentyard_core::ticket::TicketTree) -> Result<()> {
        let path = self.ticket_tree_path(&tree.project_id);
        let json = serde_json::to_string_pretty(tree)?;
        Self::write_atomic(&path, &json).await?;
        debug!(project_id = %tree.project_id, "saved ticket tree");
        Ok(())
    }

    pub async fn load_ticket_tree(
        &self,
        project_id: &str,
    ) -> Result<Option<agentyard_core::ticket::TicketTree>> {
        Self::read_json(&self.ticket_tree_path(project_id)).await
    }

    pub async fn list_project_ids(&self) -> Result<Vec<String>> {
        let dir = self.tickets_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    // -- runs -----------------------------------------------------------

    pub async fn save_execution_state(&self, state: &ExecutionState) -> Result<()> {
        let path = self.run_state_path(&state.run_id);
        let json = serde_json::to_string_pretty(state)?;
        Self::write_atomic(&path, &json).await?;
        Ok(())
    }

    pub async fn load_execution_state(&self, run_id: &RunId) -> Result<Option<ExecutionState>> {
        Self::read_json(&self.run_state_path(run_id)).await
    }

    fn conversation_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("conversation.json")
    }

    /// Merges `history` into the one `conversation.json` a run owns, keyed
    /// by agent id, rather than scattering one file per agent.
    pub async fn save_conversation(&self, run_id: &RunId, agent_id: &AgentId, history: &ConversationHistory) -> Result<()> {
        let path = self.conversation_path(run_id);
        let mut histories: HashMap<AgentId, ConversationHistory> = Self::read_json(&path).await?.unwrap_or_default();
        histories.insert(agent_id.clone(), history.clone());
        let json = serde_json::to_string_pretty(&histories)?;
        Self::write_atomic(&path, &json).await
    }

    pub async fn load_conversations(&self, run_id: &RunId) -> Result<HashMap<AgentId, ConversationHistory>> {
        Ok(Self::read_json(&self.conversation_path(run_id)).await?.unwrap_or_default())
    }

    /// `pauseExecution` — requires a `Running` execution, flips it to
    /// `Paused`, persists.
    pub async fn pause_execution(&self, run_id: &RunId) -> Result<ExecutionState> {
        let mut state = self
            .load_execution_state(run_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("run {} not found", run_id)))?;
        match state.status {
            // No-op when already paused.
            RunStatus::Paused => Ok(state),
            RunStatus::Completed | RunStatus::Failed => Err(Error::invalid_state(format!(
                "cannot pause run {} in terminal status {:?}",
                run_id, state.status
            ))),
            RunStatus::Running => {
                state.status = RunStatus::Paused;
                state.touch();
                self.save_execution_state(&state).await?;
                info!(%run_id, "execution paused");
                Ok(state)
            }
        }
    }

    /// `resumeExecution` — requires a `Paused` execution, flips it to
    /// `Running`, persists, and returns the worker/agent ids the caller
    /// must rehydrate.
    pub async fn resume_execution(&self, run_id: &RunId) -> Result<ResumedExecution> {
        let mut state = self
            .load_execution_state(run_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("run {} not found", run_id)))?;
        if state.status != RunStatus::Paused {
            return Err(Error::invalid_state(format!(
                "cannot resume run {} in status {:?}",
                run_id, state.status
            )));
        }
        state.status = RunStatus::Running;
        state.touch();
        self.save_execution_state(&state).await?;
        info!(%run_id, "execution resumed");
        Ok(ResumedExecution {
            worker_ids: state.worker_states.keys().cloned().collect(),
            agent_ids: state.conversation_histories.keys().cloned().collect(),
            state,
        })
    }

    /// Scans `runs/` for every execution whose status is `running` or
    /// `paused`, descending by `lastUpdated` — the restart-recovery scan a
    /// process runs on startup to pick back up in-flight work.
    pub async fn find_in_progress_executions(&self) -> Result<Vec<ExecutionState>> {
        let dir = self.runs_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let state_path = entry.path().join("state.json");
            if let Some(state) = Self::read_json::<ExecutionState>(&state_path).await? {
                if matches!(state.status, RunStatus::Running | RunStatus::Paused) {
                    found.push(state);
                }
            }
        }
        found.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(found)
    }

    /// `cleanupOldRuns(days=7)` — removes run directories whose
    /// `lastUpdated` is older than the cutoff. Returns the deleted run ids.
    pub async fn cleanup_old_runs(&self, days: i64) -> Result<Vec<RunId>> {
        let dir = self.runs_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
        let mut removed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let state_path = entry.path().join("state.json");
            let stale = match Self::read_json::<ExecutionState>(&state_path).await? {
                Some(state) => state.last_updated < cutoff,
                None => false,
            };
            if stale {
                if let Err(e) = fs::remove_dir_all(entry.path()).await {
                    warn!(path = %entry.path().display(), error = %e, "failed to remove stale run directory");
                    continue;
                }
                if let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) {
                    removed.push(RunId::new(name));
                }
            }
        }
        Ok(removed)
    }

    // -- workflow state ---------------------------------------------------
    //
    // A workflow and the run it drives share one id, so `WorkflowState`
    // lives alongside `state.json` and `quality.json` under the same
    // `runs/<id>/` directory rather than in its own top-level namespace.

    fn workflow_state_path(&self, workflow_id: &agentyard_core::TaskId) -> PathBuf {
        self.runs_dir().join(workflow_id.as_str()).join("workflow.json")
    }

    pub async fn save_workflow_state(&self, state: &agentyard_core::WorkflowState) -> Result<()> {
        let path = self.workflow_state_path(&state.workflow_id);
        let json = serde_json::to_string_pretty(state)?;
        Self::write_atomic(&path, &json).await
    }

    pub async fn load_workflow_state(
        &self,
        workflow_id: &agentyard_core::TaskId,
    ) -> Result<Option<agentyard_core::WorkflowState>> {
        Self::read_json(&self.workflow_state_path(workflow_id)).await
    }

    // -- quality gate result ----------------------------------------------

    fn quality_result_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("quality.json")
    }

    pub async fn save_quality_result<T: serde::Serialize>(&self, run_id: &RunId, result: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(result)?;
        Self::write_atomic(&self.quality_result_path(run_id), &json).await
    }

    pub async fn load_quality_result<T: serde::de::DeserializeOwned>(&self, run_id: &RunId) -> Result<Option<T>> {
        Self::read_json(&self.quality_result_path(run_id)).await
    }

    // -- config -----------------------------------------------------------

    pub async fn save_config(&self, config: &agentyard_core::SystemConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        Self::write_atomic(&self.config_path(), &json).await
    }

    pub async fn load_config(&self) -> Result<agentyard_core::SystemConfig> {
        Ok(Self::read_json(&self.config_path()).await?.unwrap_or_default())
    }
}
