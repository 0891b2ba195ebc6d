//! Manager agent — a minimal, pluggable contract. The engine
//! treats decomposition as opaque and only consumes its output, so this
//! crate ships one scripted implementation for tests and wiring; a real
//! deployment supplies its own.

use agentyard_core::{Result, WorkerType};
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub struct SubTask {
    pub title: String,
    pub worker_type: WorkerType,
    pub acceptance_criteria: Vec<String>,
}

#[async_trait]
pub trait Manager: Send + Sync {
    async fn receive_task(&self, instruction: &str) -> Result<()>;
    async fn decompose_task(&self, instruction: &str) -> Result<Vec<SubTask>>;
    async fn assign_task(&self, subtask: &SubTask) -> Result<()>;
    async fn start_progress_monitoring(&self);
}

/// Decomposes every instruction into one `developer` subtask. Useful for
/// wiring and tests; a production deployment plugs in an LLM-driven
/// decomposer behind the same trait.
pub struct SingleTaskManager;

#[async_trait]
impl Manager for SingleTaskManager {
    async fn receive_task(&self, _instruction: &str) -> Result<()> {
        Ok(())
    }

    async fn decompose_task(&self, instruction: &str) -> Result<Vec<SubTask>> {
        Ok(vec![SubTask {
            title: instruction.to_string(),
            worker_type: WorkerType::Developer,
            acceptance_criteria: vec!["implementation matches the instruction".to_string()],
        }])
    }

    async fn assign_task(&self, _subtask: &SubTask) -> Result<()> {
        Ok(())
    }

    async fn start_progress_monitoring(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_task_manager_decomposes_to_one_developer_subtask() {
        let manager = SingleTaskManager;
        let subtasks = manager.decompose_task("build feature X").await.unwrap();
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].worker_type, WorkerType::Developer);
    }
}
