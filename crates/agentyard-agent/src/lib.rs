//! agentyard-agent — the per-ticket worker conversation loop and the
//! pool that acquires, types, and releases workers against it.

pub mod pool;
pub mod worker;

pub use pool::{PendingTask, WorkerAvailability, WorkerInfo, WorkerPool, WorkerPoolConfig, WorkerTypeRegistry};
pub use worker::{WorkerAgent, WorkerAgentConfig, WorkerOutcome, WorkerResult, MAX_ITERATIONS};
