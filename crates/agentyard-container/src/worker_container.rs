//! WorkerContainer — one container owned by one worker for the
//! duration of one ticket. Composes an `IsolationConfig` into runtime
//! `CreateOptions`, and owns the `created -> running -> stopped ->
//! destroyed` state machine.

use crate::isolation::IsolationConfig;
use crate::runtime::{ContainerRuntime, CreateOptions};
use agentyard_core::{AgentId, Error, Result, RunId, WorkerId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerState {
    /// No container created yet (equivalent to the spec's `null`).
    None,
    Created,
    Running,
    Stopped,
    Destroyed,
}

/// Extra configuration the worker supplies when cloning a repo inside the
/// container.
#[derive(Clone, Debug, Default)]
pub struct GitConfig {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub token: Option<String>,
}

pub struct WorkerContainerConfig {
    pub image: String,
    pub isolation: IsolationConfig,
    pub results_dir: Option<String>,
    pub git: GitConfig,
    pub run_id: Option<RunId>,
    pub extra_env: HashMap<String, String>,
}

impl Default for WorkerContainerConfig {
    fn default() -> Self {
        Self {
            image: "agentcompany/worker:latest".to_string(),
            isolation: IsolationConfig::default(),
            results_dir: None,
            git: GitConfig::default(),
            run_id: None,
            extra_env: HashMap::new(),
        }
    }
}

/// Owns one container for one worker. `create`/`start`/`stop`/`destroy`
/// enforce the state machine contract; `destroy` is the only exit
/// path every caller must reach for a clean slate per task.
pub struct WorkerContainer {
    worker_id: WorkerId,
    agent_id: AgentId,
    config: WorkerContainerConfig,
    runtime: Arc<dyn ContainerRuntime>,
    state: Mutex<ContainerState>,
    container_id: Mutex<Option<String>>,
    name: String,
}

impl WorkerContainer {
    pub fn new(worker_id: WorkerId, agent_id: AgentId, config: WorkerContainerConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let name = generate_container_name(&worker_id);
        Self {
            worker_id,
            agent_id,
            config,
            runtime,
            state: Mutex::new(ContainerState::None),
            container_id: Mutex::new(None),
            name,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> ContainerState {
        *self.state.lock().await
    }

    pub async fn container_id(&self) -> Option<String> {
        self.container_id.lock().await.clone()
    }

    fn build_options(&self) -> CreateOptions {
        let isolation = &self.config.isolation;
        let mut env = HashMap::new();
        env.insert("WORKER_ID".to_string(), self.worker_id.as_str().to_string());
        env.insert("WORKSPACE_PATH".to_string(), "/workspace".to_string());
        if let Some(run_id) = &self.config.run_id {
            env.insert("RUN_ID".to_string(), run_id.as_str().to_string());
        }
        if let Some(url) = &self.config.git.repo_url {
            env.insert("GIT_REPO_URL".to_string(), url.clone());
        }
        if let Some(branch) = &self.config.git.branch {
            env.insert("GIT_BRANCH".to_string(), branch.clone());
        }
        if let Some(token) = &self.config.git.token {
            env.insert("GIT_TOKEN".to_string(), token.clone());
        }
        // Caller-provided env merges on top of the defaults.
        for (k, v) in &self.config.extra_env {
            env.insert(k.clone(), v.clone());
        }

        let mut tmpfs: Vec<(String, String)> = isolation
            .tmpfs_mounts
            .iter()
            .map(|m| (m.clone(), isolation.tmpfs_options().to_string()))
            .collect();
        if isolation.read_only_root {
            tmpfs.push(("/workspace".to_string(), "rw".to_string()));
        }

        // No host `/workspace` bind mount — the only volume is an
        // optional read-only results mount.
        let volumes = self
            .config
            .results_dir
            .as_ref()
            .map(|dir| vec![(dir.clone(), "/results".to_string(), true)])
            .unwrap_or_default();

        CreateOptions {
            name: self.name.clone(),
            image: self.config.image.clone(),
            env,
            volumes,
            network_mode: isolation.network_mode.clone(),
            security_opts: isolation.security_opts(),
            cap_drop: isolation.cap_drop(),
            pids_limit: Some(isolation.pids_limit),
            tmpfs,
            read_only_root: isolation.read_only_root,
            work_dir: Some("/workspace".to_string()),
        }
    }

    /// `create()` — rejects if current state is created/running/stopped,
    /// succeeds unconditionally from none/destroyed.
    pub async fn create(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if matches!(*state, ContainerState::Created | ContainerState::Running | ContainerState::Stopped) {
            return Err(Error::invalid_state(format!(
                "cannot create container for worker {} in state {:?}",
                self.worker_id, *state
            )));
        }
        let id = self.runtime.create_container(self.build_options()).await?;
        *self.container_id.lock().await = Some(id.clone());
        *state = ContainerState::Created;
        info!(worker_id = %self.worker_id, agent_id = %self.agent_id, container_id = %id, "container created");
        Ok(())
    }

    /// `start()` — requires `created`, idempotent on `running`, rejects on `destroyed`.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match *state {
            ContainerState::Running => Ok(()),
            ContainerState::Created => {
                *state = ContainerState::Running;
                info!(worker_id = %self.worker_id, "container started");
                Ok(())
            }
            ContainerState::Destroyed => Err(Error::invalid_state(format!(
                "cannot start container for worker {}: already destroyed",
                self.worker_id
            ))),
            other => Err(Error::invalid_state(format!(
                "cannot start container for worker {} in state {:?}",
                self.worker_id, other
            ))),
        }
    }

    /// `stop()` — requires `running`, idempotent on {stopped, destroyed}.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match *state {
            ContainerState::Stopped | ContainerState::Destroyed => Ok(()),
            ContainerState::Running => {
                let id = self.container_id.lock().await.clone();
                if let Some(id) = id {
                    self.runtime.stop_container(&id).await?;
                }
                *state = ContainerState::Stopped;
                info!(worker_id = %self.worker_id, "container stopped");
                Ok(())
            }
            other => Err(Error::invalid_state(format!(
                "cannot stop container for worker {} in state {:?}",
                self.worker_id, other
            ))),
        }
    }

    /// `destroy(force?)` — from `running`, stops first (ignoring stop
    /// errors when `force`); removes the container; transitions to
    /// `destroyed`. Idempotent on `destroyed` and on never-created.
    pub async fn destroy(&self, force: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if matches!(*state, ContainerState::Destroyed) {
            return Ok(());
        }
        if matches!(*state, ContainerState::None) {
            *state = ContainerState::Destroyed;
            return Ok(());
        }

        if matches!(*state, ContainerState::Running) {
            let id = self.container_id.lock().await.clone();
            if let Some(id) = id {
                let stop_result = self.runtime.stop_container(&id).await;
                if let Err(e) = stop_result {
                    if !force {
                        return Err(e);
                    }
                    tracing::warn!(worker_id = %self.worker_id, error = %e, "ignoring stop error during forced destroy");
                }
            }
        }

        let id = self.container_id.lock().await.clone();
        if let Some(id) = id {
            self.runtime.remove_container(&id).await?;
        }
        *state = ContainerState::Destroyed;
        info!(worker_id = %self.worker_id, "container destroyed");
        Ok(())
    }

    pub async fn logs(&self, tail: Option<usize>) -> Result<String> {
        let id = self.container_id.lock().await.clone().ok_or_else(|| {
            Error::invalid_state(format!("worker {} has no container to read logs from", self.worker_id))
        })?;
        self.runtime.get_container_logs(&id, tail).await
    }

    /// `verifyIsolation()` — inspects the effective config, not the runtime.
    pub fn verify_isolation(&self) -> crate::isolation::IsolationReport {
        crate::isolation::verify_isolation(&self.config.isolation)
    }

    pub fn isolation_config(&self) -> &IsolationConfig {
        &self.config.isolation
    }
}

/// `agentcompany-worker-<workerId>-<ms-timestamp>-<6hex>`.
fn generate_container_name(worker_id: &WorkerId) -> String {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix = &Uuid::new_v4().simple().to_string()[..6];

    format!("agentcompany-worker-{}-{}-{}", worker_id, ms, suffix)
}

/// Extracts the worker id from a container name: strip the fixed prefix,
/// then drop the final two hyphen-separated segments (timestamp, hex).
pub fn extract_worker_id(container_name: &str) -> Option<String> {
    let stripped = container_name.strip_prefix("agentcompany-worker-")?;
    let mut parts: Vec<&str> = stripped.split('-').collect();
    if parts.len() < 3 {
        return None;
    }
    parts.truncate(parts.len() - 2);
    Some(parts.join("-"))
}
