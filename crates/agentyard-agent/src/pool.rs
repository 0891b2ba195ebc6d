//! WorkerPool — acquires, types, and releases workers against a
//! bounded pool, backed by a capability-aware pending queue.

use agentyard_core::{AgentId, Error, Result, WorkerId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerAvailability {
    Idle,
    Working,
    Terminated,
}

#[derive(Clone, Debug)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub agent_id: AgentId,
    pub capabilities: HashSet<String>,
    pub availability: WorkerAvailability,
    pub current_task: Option<PendingTask>,
}

#[derive(Clone, Debug)]
pub struct PendingTask {
    pub ticket_id: String,
    pub required_capabilities: HashSet<String>,
}

/// `workerType` → capability set + AI adapter/model preference, used for
/// typed acquisition. Held separately from `WorkerInfo` since a type describes a
/// class of worker, not one instance.
#[derive(Clone, Debug, Default)]
pub struct WorkerTypeRegistry {
    types: HashMap<String, HashSet<String>>,
}

impl WorkerTypeRegistry {
    pub fn register(&mut self, worker_type: impl Into<String>, capabilities: impl IntoIterator<Item = String>) {
        self.types.insert(worker_type.into(), capabilities.into_iter().collect());
    }

    pub fn capabilities_for(&self, worker_type: &str) -> HashSet<String> {
        self.types.get(worker_type).cloned().unwrap_or_default()
    }
}

struct PoolState {
    workers: HashMap<WorkerId, WorkerInfo>,
    pending: VecDeque<PendingTask>,
}

/// Gate for `releaseWorker`'s no-capability-match fallback: disabled by
/// default since an unconditional handoff can violate capability contracts
/// (see DESIGN.md).
pub struct WorkerPoolConfig {
    pub max_workers: usize,
    pub use_containers: bool,
    pub allow_fallback_assignment: bool,
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            use_containers: false,
            allow_fallback_assignment: false,
            poll_interval: Duration::from_millis(100),
        }
    }
}

pub struct WorkerPool {
    state: Mutex<PoolState>,
    config: WorkerPoolConfig,
    type_registry: Mutex<WorkerTypeRegistry>,
    next_worker_seq: std::sync::atomic::AtomicU64,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            state: Mutex::new(PoolState {
                workers: HashMap::new(),
                pending: VecDeque::new(),
            }),
            config,
            type_registry: Mutex::new(WorkerTypeRegistry::default()),
            next_worker_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub async fn register_worker_type(&self, worker_type: impl Into<String>, capabilities: impl IntoIterator<Item = String>) {
        self.type_registry.lock().await.register(worker_type, capabilities);
    }

    fn fresh_worker_id(&self) -> WorkerId {
        let seq = self.next_worker_seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        WorkerId::new(format!("worker-{}", seq))
    }

    /// Idle match, else grow the pool, else `None`.
    async fn try_get_available_worker(&self, required: &HashSet<String>) -> Option<WorkerId> {
        let mut state = self.state.lock().await;

        if let Some(info) = state
            .workers
            .values()
            .find(|w| w.availability == WorkerAvailability::Idle && required.is_subset(&w.capabilities))
        {
            let id = info.worker_id.clone();
            let entry = state.workers.get_mut(&id).unwrap();
            entry.availability = WorkerAvailability::Working;
            return Some(id);
        }

        if state.workers.len() < self.config.max_workers {
            let worker_id = self.fresh_worker_id();
            state.workers.insert(
                worker_id.clone(),
                WorkerInfo {
                    worker_id: worker_id.clone(),
                    agent_id: AgentId::new(worker_id.as_str()),
                    capabilities: required.clone(),
                    availability: WorkerAvailability::Working,
                    current_task: None,
                },
            );
            return Some(worker_id);
        }

        None
    }

    /// `getAvailableWorker` — single attempt, no blocking.
    pub async fn get_available_worker(&self, required_capabilities: &[&str]) -> Option<WorkerId> {
        let required: HashSet<String> = required_capabilities.iter().map(|s| s.to_string()).collect();
        self.try_get_available_worker(&required).await
    }

    /// `acquireWorker(timeout)` — polls at `poll_interval` until success or
    /// the deadline passes.
    pub async fn acquire_worker(&self, required_capabilities: &[&str], timeout: Duration) -> Result<WorkerId> {
        let required: HashSet<String> = required_capabilities.iter().map(|s| s.to_string()).collect();
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(id) = self.try_get_available_worker(&required).await {
                return Ok(id);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Typed acquisition: resolves capabilities via the `WorkerTypeRegistry`
    /// then delegates to `acquire_worker`.
    pub async fn acquire_worker_by_type(&self, worker_type: &str, timeout: Duration) -> Result<WorkerId> {
        let caps = self.type_registry.lock().await.capabilities_for(worker_type);
        let required: Vec<&str> = caps.iter().map(|s| s.as_str()).collect();
        self.acquire_worker(&required, timeout).await
    }

    /// `releaseWorker` — clears the current task, then either hands the
    /// worker the first capability-matching pending task (it stays
    /// `Working`) or marks it idle. The capability-blind fallback is
    /// gated behind `config.allow_fallback_assignment`.
    pub async fn release_worker(&self, worker_id: &WorkerId) -> Result<()> {
        let mut state = self.state.lock().await;
        let capabilities = {
            let info = state
                .workers
                .get_mut(worker_id)
                .ok_or_else(|| Error::not_found(format!("worker {} not found", worker_id)))?;
            info.current_task = None;
            info.capabilities.clone()
        };

        let matched_index = state
            .pending
            .iter()
            .position(|task| task.required_capabilities.is_subset(&capabilities));

        let reassignment = match matched_index {
            Some(idx) => state.pending.remove(idx),
            None if self.config.allow_fallback_assignment => {
                if state.pending.is_empty() {
                    None
                } else {
                    warn!(%worker_id, "releaseWorker falling back to first pending task with no capability match");
                    state.pending.pop_front()
                }
            }
            None => None,
        };

        let info = state.workers.get_mut(worker_id).unwrap();
        match reassignment {
            Some(task) => {
                debug!(%worker_id, ticket = %task.ticket_id, "reassigned pending task on release");
                info.current_task = Some(task);
                info.availability = WorkerAvailability::Working;
            }
            None => {
                info.availability = WorkerAvailability::Idle;
            }
        }
        Ok(())
    }

    pub async fn enqueue_pending(&self, task: PendingTask) {
        self.state.lock().await.pending.push_back(task);
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn worker_info(&self, worker_id: &WorkerId) -> Option<WorkerInfo> {
        self.state.lock().await.workers.get(worker_id).cloned()
    }

    pub async fn active_worker_ids(&self) -> Vec<WorkerId> {
        self.state.lock().await.workers.keys().cloned().collect()
    }

    /// `stop()` — terminates every worker. Container destruction (when
    /// `use_containers` is set) is the caller's responsibility via
    /// `agentyard_container`; this only flips bookkeeping state.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        for info in state.workers.values_mut() {
            info.availability = WorkerAvailability::Terminated;
            info.current_task = None;
        }
        info!(count = state.workers.len(), "worker pool stopped");
    }

    /// `reset()` — `stop()` plus a full clear, for test re-initialization.
    pub async fn reset(&self) {
        self.stop().await;
        let mut state = self.state.lock().await;
        state.workers.clear();
        state.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn acquires_up_to_max_workers_then_blocks() {
        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 2, ..Default::default() });
        let w1 = pool.get_available_worker(&[]).await;
        let w2 = pool.get_available_worker(&[]).await;
        let w3 = pool.get_available_worker(&[]).await;
        assert!(w1.is_some());
        assert!(w2.is_some());
        assert!(w3.is_none());
    }

    #[tokio::test]
    async fn acquire_worker_times_out_when_pool_exhausted() {
        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 1, ..Default::default() });
        pool.get_available_worker(&[]).await.unwrap();
        let result = pool.acquire_worker(&[], Duration::from_millis(150)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn release_reassigns_matching_pending_task() {
        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 1, ..Default::default() });
        let worker = pool.get_available_worker(&["rust"]).await.unwrap();
        pool.enqueue_pending(PendingTask { ticket_id: "t1".into(), required_capabilities: caps(&["rust"]) }).await;

        pool.release_worker(&worker).await.unwrap();

        let info = pool.worker_info(&worker).await.unwrap();
        assert_eq!(info.availability, WorkerAvailability::Working);
        assert_eq!(info.current_task.unwrap().ticket_id, "t1");
        assert_eq!(pool.pending_len().await, 0);
    }

    #[tokio::test]
    async fn release_goes_idle_when_no_pending_task_matches() {
        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 1, ..Default::default() });
        let worker = pool.get_available_worker(&["rust"]).await.unwrap();
        pool.enqueue_pending(PendingTask { ticket_id: "t1".into(), required_capabilities: caps(&["python"]) }).await;

        pool.release_worker(&worker).await.unwrap();

        let info = pool.worker_info(&worker).await.unwrap();
        assert_eq!(info.availability, WorkerAvailability::Idle);
        assert_eq!(pool.pending_len().await, 1);
    }

    #[tokio::test]
    async fn release_uses_fallback_only_when_enabled() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_workers: 1,
            allow_fallback_assignment: true,
            ..Default::default()
        });
        let worker = pool.get_available_worker(&["rust"]).await.unwrap();
        pool.enqueue_pending(PendingTask { ticket_id: "t1".into(), required_capabilities: caps(&["python"]) }).await;

        pool.release_worker(&worker).await.unwrap();

        let info = pool.worker_info(&worker).await.unwrap();
        assert_eq!(info.availability, WorkerAvailability::Working);
    }

    #[tokio::test]
    async fn stop_terminates_all_workers() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let w = pool.get_available_worker(&[]).await.unwrap();
        pool.stop().await;
        let info = pool.worker_info(&w).await.unwrap();
        assert_eq!(info.availability, WorkerAvailability::Terminated);
    }

    #[tokio::test]
    async fn reset_clears_the_pool() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        pool.get_available_worker(&[]).await.unwrap();
        pool.reset().await;
        assert!(pool.active_worker_ids().await.is_empty());
    }

    #[tokio::test]
    async fn acquire_worker_by_type_resolves_registered_capabilities() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        pool.register_worker_type("rust-dev", vec!["rust".to_string(), "cargo".to_string()]).await;
        let worker = pool.acquire_worker_by_type("rust-dev", Duration::from_millis(100)).await.unwrap();
        let info = pool.worker_info(&worker).await.unwrap();
        assert!(info.capabilities.contains("rust"));
        assert!(info.capabilities.contains("cargo"));
    }
}
