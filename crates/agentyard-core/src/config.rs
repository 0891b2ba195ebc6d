//! System configuration — pure types and defaults, no parsing logic beyond
//! serde. Persisted by the store at `config.json`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemConfig {
    pub max_concurrent_workers: usize,
    pub default_timeout_secs: u64,
    pub default_ai_adapter: String,
    pub default_model: String,
    pub container_runtime: ContainerRuntimeMode,
    pub allowed_docker_commands: Vec<String>,
    pub docker_socket_path: String,
    pub worker_cpu_limit: Option<String>,
    pub worker_memory_limit: Option<String>,
    pub runtime_base_path: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: 3,
            default_timeout_secs: 120,
            default_ai_adapter: "anthropic".to_string(),
            default_model: "claude-sonnet-4-20250514".to_string(),
            container_runtime: ContainerRuntimeMode::HostSocket,
            allowed_docker_commands: vec![
                "run".to_string(),
                "stop".to_string(),
                "rm".to_string(),
                "logs".to_string(),
                "inspect".to_string(),
            ],
            docker_socket_path: "/var/run/docker.sock".to_string(),
            worker_cpu_limit: None,
            worker_memory_limit: None,
            runtime_base_path: "runtime/state".to_string(),
        }
    }
}

/// Closed list of recognized AI adapters `defaultAiAdapter` may name.
pub const KNOWN_AI_ADAPTERS: &[&str] = &["anthropic", "scripted"];

impl SystemConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_model.trim().is_empty() {
            return Err("defaultModel must be non-empty".to_string());
        }
        if !KNOWN_AI_ADAPTERS.contains(&self.default_ai_adapter.as_str()) {
            return Err(format!(
                "defaultAiAdapter '{}' is not on the known list: {:?}",
                self.default_ai_adapter, KNOWN_AI_ADAPTERS
            ));
        }
        if self.max_concurrent_workers == 0 {
            return Err("maxConcurrentWorkers must be >= 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerRuntimeMode {
    HostSocket,
    Rootless,
    Nested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SystemConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_adapter() {
        let mut cfg = SystemConfig::default();
        cfg.default_ai_adapter = "made-up".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_model() {
        let mut cfg = SystemConfig::default();
        cfg.default_model = "".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn serde_defaults_fill_missing_fields() {
        let cfg: SystemConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.max_concurrent_workers, 3);
    }
}
