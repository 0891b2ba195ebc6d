//! Orchestrator — top-level façade: admission, task submission,
//! one Manager + one WorkflowEngine, global pause/emergency-stop, and the
//! retry/fallback helpers every long-running operation in the substrate
//! goes through.
//!
//! The backoff shape (`base_ms`, `multiplier`, `max_ms`) is grounded on an
//! adaptive-backoff poll loop: retry count capped, delay growing
//! multiplicatively up to a ceiling.

use agentyard_core::{Error, ProjectId, Result, TaskId, WorkerId};
use agentyard_store::StateStore;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::workflow_engine::WorkflowEngine;

#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct RetryReport<T> {
    pub success: bool,
    pub result: Option<T>,
    pub attempts: usize,
    pub last_error: Option<Error>,
}

#[derive(Debug)]
pub struct FallbackReport<T> {
    pub result: T,
    pub used_fallback: bool,
}

pub struct Orchestrator {
    store: StateStore,
    engine: Arc<WorkflowEngine>,
    paused: AtomicBool,
    emergency_stopped: AtomicBool,
}

impl Orchestrator {
    pub fn new(store: StateStore, engine: Arc<WorkflowEngine>) -> Self {
        Self { store, engine, paused: AtomicBool::new(false), emergency_stopped: AtomicBool::new(false) }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stopped.load(Ordering::SeqCst)
    }

    /// `submitTask(instruction, projectId, opts)`. Rejects empty input and
    /// any call after `emergencyStop`. Persists the run descriptor, then
    /// hands off to the WorkflowEngine asynchronously — the returned
    /// `taskId` is available immediately, before proposal runs.
    pub async fn submit_task(&self, instruction: &str, project_id: ProjectId) -> Result<TaskId> {
        if instruction.trim().is_empty() {
            return Err(Error::invalid_input("instruction must be non-empty"));
        }
        if project_id.as_str().trim().is_empty() {
            return Err(Error::invalid_input("project id must be non-empty"));
        }
        if self.is_emergency_stopped() {
            return Err(Error::invalid_state("orchestrator is emergency-stopped".to_string()));
        }

        let workflow_id = TaskId::new(format!("task-{}", Uuid::new_v4()));
        self.engine.start(workflow_id.clone(), project_id, instruction).await?;

        let engine = Arc::clone(&self.engine);
        let id = workflow_id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.propose(&id).await {
                warn!(workflow_id = %id, error = %e, "proposal failed during submitTask hand-off");
            }
        });

        info!(workflow_id = %workflow_id, "task submitted");
        Ok(workflow_id)
    }

    pub async fn pause_all_agents(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        for run in self.store.find_in_progress_executions().await? {
            if run.status == agentyard_core::RunStatus::Running {
                self.store.pause_execution(&run.run_id).await?;
            }
        }
        info!("all agents paused");
        Ok(())
    }

    /// `resumeAllAgents()` — fails once `emergencyStop` has run.
    pub async fn resume_all_agents(&self) -> Result<()> {
        if self.is_emergency_stopped() {
            return Err(Error::invalid_state("cannot resume after emergency stop".to_string()));
        }
        self.paused.store(false, Ordering::SeqCst);
        for run in self.store.find_in_progress_executions().await? {
            if run.status == agentyard_core::RunStatus::Paused {
                self.store.resume_execution(&run.run_id).await?;
            }
        }
        info!("all agents resumed");
        Ok(())
    }

    /// `emergencyStop()` — absorbing terminal sink: paused and
    /// emergency_stopped both become permanently true.
    pub async fn emergency_stop(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        self.emergency_stopped.store(true, Ordering::SeqCst);
        warn!("emergency stop engaged");

        for run in self.store.find_in_progress_executions().await? {
            if let Err(e) = self.store.pause_execution(&run.run_id).await {
                warn!(run_id = %run.run_id, error = %e, "failed to pause run during emergency stop");
            }
        }
        Ok(())
    }

    /// `executeWithRetry(op, {retryConfig})` — retries while `is_retryable`
    /// accepts the error, backing off exponentially between attempts.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        config: RetryConfig,
        is_retryable: impl Fn(&Error) -> bool,
        mut op: F,
    ) -> RetryReport<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = config.base_delay;
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < config.max_attempts {
            attempts += 1;
            match op().await {
                Ok(result) => {
                    return RetryReport { success: true, result: Some(result), attempts, last_error: None };
                }
                Err(e) => {
                    let retryable = is_retryable(&e);
                    warn!(attempt = attempts, error = %e, retryable, "executeWithRetry attempt failed");
                    last_error = Some(e);
                    if !retryable || attempts >= config.max_attempts {
                        break;
                    }
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_secs_f64((delay.as_secs_f64() * config.multiplier).min(config.max_delay.as_secs_f64()));
                }
            }
        }

        RetryReport { success: false, result: None, attempts, last_error }
    }

    /// `executeWithFallback(primary, fallback)` — runs `fallback` only when
    /// `primary` errors.
    pub async fn execute_with_fallback<T, P, F>(&self, primary: P, fallback: F) -> Result<FallbackReport<T>>
    where
        P: Future<Output = Result<T>>,
        F: Future<Output = Result<T>>,
    {
        match primary.await {
            Ok(result) => Ok(FallbackReport { result, used_fallback: false }),
            Err(primary_err) => {
                warn!(error = %primary_err, "primary failed, invoking fallback");
                let result = fallback.await?;
                Ok(FallbackReport { result, used_fallback: true })
            }
        }
    }

    pub async fn get_active_agents(&self, worker_ids: &[WorkerId]) -> Vec<(WorkerId, &'static str)> {
        let status = if self.is_emergency_stopped() {
            "terminated"
        } else if self.is_paused() {
            "paused"
        } else {
            "active"
        };
        worker_ids.iter().cloned().map(|id| (id, status)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SingleTaskManager;
    use crate::reviewer::AlwaysApprove;
    use crate::workflow_engine::WorkflowEngineConfig;
    use agentyard_agent::{WorkerPool, WorkerPoolConfig};
    use agentyard_llm::{LlmProvider, ScriptedProvider, ScriptedTurn};
    use agentyard_store::TicketHierarchy;
    use std::sync::atomic::AtomicUsize;

    fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        let store = StateStore::new(dir);
        let hierarchy = TicketHierarchy::new(store.clone());
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::default()));
        let tools = Arc::new(agentyard_tools::create_default_registry(dir));
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "task_complete".to_string(),
            arguments: "{}".to_string(),
        }]));
        let runtime = Arc::new(agentyard_container::BypassValidationRuntime::new(
            agentyard_core::config::ContainerRuntimeMode::Rootless,
        ));
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            hierarchy,
            pool,
            provider,
            tools,
            Arc::new(AlwaysApprove),
            Arc::new(SingleTaskManager),
            runtime,
            WorkflowEngineConfig::default(),
        ));
        Orchestrator::new(store, engine)
    }

    #[tokio::test]
    async fn submit_task_rejects_empty_instruction_or_project() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        assert!(orch.submit_task("", ProjectId::new("proj")).await.is_err());
        assert!(orch.submit_task("x", ProjectId::new("")).await.is_err());
    }

    #[tokio::test]
    async fn submit_task_returns_immediately_with_a_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let orch = orchestrator(dir.path());
        let id = orch.submit_task("build feature X", ProjectId::new("proj-001")).await.unwrap();
        assert!(id.as_str().starts_with("task-"));

        let persisted = store.load_workflow_state(&id).await.unwrap();
        assert!(persisted.is_some(), "submitTask must persist a run descriptor before returning");
    }

    #[tokio::test]
    async fn emergency_stop_is_absorbing() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        orch.emergency_stop().await.unwrap();

        assert!(orch.is_emergency_stopped());
        assert!(orch.is_paused());
        assert!(orch.resume_all_agents().await.is_err());
        assert!(orch.submit_task("x", ProjectId::new("proj")).await.is_err());
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        orch.pause_all_agents().await.unwrap();
        assert!(orch.is_paused());
        orch.resume_all_agents().await.unwrap();
        assert!(!orch.is_paused());
    }

    #[tokio::test]
    async fn execute_with_retry_retries_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);

        let report = orch
            .execute_with_retry(
                RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), multiplier: 1.0, max_delay: Duration::from_millis(1) },
                |_| true,
                move || {
                    let calls = Arc::clone(&calls2);
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        if n < 2 {
                            Err(Error::invalid_state("not yet".to_string()))
                        } else {
                            Ok(42)
                        }
                    }
                },
            )
            .await;

        assert!(report.success);
        assert_eq!(report.result, Some(42));
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn execute_with_retry_stops_on_non_retryable_error() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let report: RetryReport<()> = orch
            .execute_with_retry(
                RetryConfig::default(),
                |_| false,
                || async { Err(Error::invalid_input("bad input".to_string())) },
            )
            .await;

        assert!(!report.success);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn execute_with_fallback_runs_fallback_only_on_primary_error() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let report = orch
            .execute_with_fallback(async { Err::<i32, _>(Error::invalid_state("down".to_string())) }, async { Ok(7) })
            .await
            .unwrap();
        assert!(report.used_fallback);
        assert_eq!(report.result, 7);

        let report = orch.execute_with_fallback(async { Ok::<i32, Error>(1) }, async { Ok(7) }).await.unwrap();
        assert!(!report.used_fallback);
        assert_eq!(report.result, 1);
    }
}
