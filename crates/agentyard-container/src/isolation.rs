//! Isolation configuration and verification — pure, synchronous,
//! and independent of the runtime: `verify_isolation` inspects the
//! *effective configuration*, it never calls out to the container engine.

use agentyard_core::WorkerId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IsolationConfig {
    pub network_mode: String,
    pub no_new_privileges: bool,
    pub drop_all_capabilities: bool,
    pub pids_limit: u32,
    pub tmpfs_mounts: Vec<String>,
    pub read_only_root: bool,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            network_mode: "none".to_string(),
            no_new_privileges: true,
            drop_all_capabilities: true,
            pids_limit: 256,
            tmpfs_mounts: vec!["/tmp".to_string(), "/var/tmp".to_string()],
            read_only_root: false,
        }
    }
}

impl IsolationConfig {
    /// The `rw,noexec,nosuid,size=256m` tmpfs options applied to every
    /// configured mount point.
    pub fn tmpfs_options(&self) -> &'static str {
        "rw,noexec,nosuid,size=256m"
    }

    pub fn security_opts(&self) -> Vec<String> {
        let mut opts = Vec::new();
        if self.no_new_privileges {
            opts.push("no-new-privileges:true".to_string());
        }
        opts
    }

    pub fn cap_drop(&self) -> Vec<String> {
        if self.drop_all_capabilities {
            vec!["ALL".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IsolationReport {
    pub network_isolated: bool,
    pub filesystem_isolated: bool,
    pub read_only_shared_correct: bool,
    pub security_options_correct: bool,
    pub errors: Vec<String>,
}

impl IsolationReport {
    pub fn is_fully_isolated(&self) -> bool {
        self.errors.is_empty()
    }
}

/// `verifyIsolation()` — inspects `config` without touching the runtime.
pub fn verify_isolation(config: &IsolationConfig) -> IsolationReport {
    let mut errors = Vec::new();

    let network_isolated = config.network_mode == "none";
    if !network_isolated {
        errors.push(format!("Network isolation violated: networkMode is '{}', expected 'none'", config.network_mode));
    }

    let filesystem_isolated = config.tmpfs_mounts.iter().any(|m| m == "/tmp")
        && config.tmpfs_mounts.iter().any(|m| m == "/var/tmp");
    if !filesystem_isolated {
        errors.push("Filesystem isolation violated: expected tmpfs mounts at /tmp and /var/tmp".to_string());
    }

    let read_only_shared_correct = !config.read_only_root || config.tmpfs_mounts.iter().any(|m| m == "/workspace");
    if !read_only_shared_correct {
        errors.push("Read-only root requires a writable tmpfs at /workspace".to_string());
    }

    let security_options_correct = config.no_new_privileges && config.drop_all_capabilities;
    if !security_options_correct {
        errors.push("Security options violated: expected no-new-privileges and cap-drop=ALL".to_string());
    }

    IsolationReport {
        network_isolated,
        filesystem_isolated,
        read_only_shared_correct,
        security_options_correct,
        errors,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContainerIsolationComparison {
    pub isolated: bool,
    pub network_isolated: bool,
    pub filesystem_isolated: bool,
    pub errors: Vec<String>,
}

/// `verifyContainerIsolation(A, B)` — two containers
/// with distinct worker ids and default isolation are fully isolated;
/// sharing an id always fails regardless of configuration.
pub fn verify_container_isolation(
    id_a: &WorkerId,
    config_a: &IsolationConfig,
    id_b: &WorkerId,
    config_b: &IsolationConfig,
) -> ContainerIsolationComparison {
    let report_a = verify_isolation(config_a);
    let report_b = verify_isolation(config_b);

    let mut errors = Vec::new();
    errors.extend(report_a.errors.iter().cloned());
    errors.extend(report_b.errors.iter().cloned());

    if id_a == id_b {
        errors.push(format!("Worker containers share an id: {}", id_a));
    }

    let network_isolated = report_a.network_isolated && report_b.network_isolated;
    let filesystem_isolated = report_a.filesystem_isolated && report_b.filesystem_isolated;
    let isolated = errors.is_empty();

    ContainerIsolationComparison { isolated, network_isolated, filesystem_isolated, errors }
}
