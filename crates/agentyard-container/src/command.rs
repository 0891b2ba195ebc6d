//! Container command validation — pure, synchronous, independent of
//! process execution so it can be unit-tested against the tokenizer and the
//! allow/deny sets alone.

use std::collections::HashSet;

/// Subcommands that remain forbidden no matter what `allow_set` a caller
/// configures — the security floor.
pub const DENY_ALWAYS: &[&str] = &[
    "exec", "cp", "export", "import", "load", "save", "commit", "push", "pull", "build",
    "network", "volume", "system", "swarm", "node", "service", "stack", "secret", "config",
    "plugin", "trust",
];

/// Default allow set.
pub const DEFAULT_ALLOW: &[&str] = &["run", "stop", "rm", "logs", "inspect"];

/// Global option flags that consume the following token as a value (host,
/// context, config-dir, …) rather than being the subcommand themselves.
const VALUE_FLAGS: &[&str] = &["-h", "--host", "-c", "--context", "--config"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandValidation {
    pub valid: bool,
    pub error: Option<String>,
    pub detected_command: Option<String>,
}

impl CommandValidation {
    fn ok(detected: impl Into<String>) -> Self {
        Self { valid: true, error: None, detected_command: Some(detected.into()) }
    }

    fn reject(error: impl Into<String>, detected: Option<String>) -> Self {
        Self { valid: false, error: Some(error.into()), detected_command: detected }
    }
}

/// Tokenizes `input` respecting single and double quotes (quote characters
/// are consumed, not retained in the token).
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_current = false;

    for ch in input.chars() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                has_current = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_current = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_current {
                    tokens.push(std::mem::take(&mut current));
                    has_current = false;
                }
            }
            c => {
                current.push(c);
                has_current = true;
            }
        }
    }
    if has_current {
        tokens.push(current);
    }
    tokens
}

/// Validates `command` in host-socket mode against `cli_name` (e.g.
/// `"docker"`) and a configurable `allow_set`. The deny-always set is
/// immune to `allow_set`.
pub fn validate_command(command: &str, cli_name: &str, allow_set: &[String]) -> CommandValidation {
    let tokens = tokenize(command);
    if tokens.is_empty() {
        return CommandValidation::reject("invalid command format: empty command", None);
    }

    if !tokens[0].eq_ignore_ascii_case(cli_name) {
        return CommandValidation::reject(
            format!("invalid command format: must begin with '{}'", cli_name),
            None,
        );
    }

    let mut subcommand: Option<String> = None;
    let mut i = 1;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.starts_with('-') {
            if VALUE_FLAGS.contains(&tok.as_str()) {
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        subcommand = Some(tok.to_lowercase());
        break;
    }

    let subcommand = match subcommand {
        Some(s) => s,
        None => return CommandValidation::reject("invalid command format: no subcommand present", None),
    };

    if DENY_ALWAYS.contains(&subcommand.as_str()) {
        return CommandValidation::reject(
            format!(
                "disallowed command: '{}' is in the security floor deny-always set and cannot be re-enabled by configuration",
                subcommand
            ),
            Some(subcommand),
        );
    }

    let allowed: HashSet<&str> = allow_set.iter().map(|s| s.as_str()).collect();
    if !allowed.contains(subcommand.as_str()) {
        return CommandValidation::reject(
            format!(
                "disallowed command: '{}' is not in the allow set {:?}",
                subcommand, allow_set
            ),
            Some(subcommand),
        );
    }

    CommandValidation::ok(subcommand)
}

/// Convenience wrapper using the default CLI name (`docker`) and allow set.
pub fn validate_default(command: &str) -> CommandValidation {
    let allow: Vec<String> = DEFAULT_ALLOW.iter().map(|s| s.to_string()).collect();
    validate_command(command, "docker", &allow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_allow() -> Vec<String> {
        DEFAULT_ALLOW.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn run_is_allowed() {
        let v = validate_command("docker run -d nginx", "docker", &default_allow());
        assert!(v.valid);
        assert_eq!(v.detected_command.as_deref(), Some("run"));
    }

    #[test]
    fn exec_is_denied_even_if_allow_listed() {
        let mut allow = default_allow();
        allow.push("exec".to_string());
        let v = validate_command("docker exec -it c bash", "docker", &allow);
        assert!(!v.valid);
        assert_eq!(v.detected_command.as_deref(), Some("exec"));
        assert!(v.error.unwrap().contains("security"));
    }

    #[test]
    fn global_host_flag_is_skipped_to_find_subcommand() {
        let v = validate_command("docker -H unix:///x.sock stop c", "docker", &default_allow());
        assert!(v.valid);
        assert_eq!(v.detected_command.as_deref(), Some("stop"));
    }

    #[test]
    fn missing_cli_name_is_rejected() {
        let v = validate_command("kubectl run pod", "docker", &default_allow());
        assert!(!v.valid);
        assert!(v.detected_command.is_none());
    }

    #[test]
    fn empty_command_is_rejected() {
        let v = validate_command("", "docker", &default_allow());
        assert!(!v.valid);
    }

    #[test]
    fn subcommand_case_is_folded() {
        let v = validate_command("docker RUN -d nginx", "docker", &default_allow());
        assert!(v.valid);
        assert_eq!(v.detected_command.as_deref(), Some("run"));
    }

    #[test]
    fn quoted_arguments_do_not_confuse_tokenizer() {
        let v = validate_command(r#"docker run -e MSG="hello world" nginx"#, "docker", &default_allow());
        assert!(v.valid);
    }

    #[test]
    fn unlisted_subcommand_is_rejected_with_allow_set_in_message() {
        let v = validate_command("docker network create mynet", "docker", &default_allow());
        assert!(!v.valid);
        // network is in the deny-always set, so it is rejected before the
        // allow-set check — but either message names the offending command.
        assert_eq!(v.detected_command.as_deref(), Some("network"));
    }

    #[test]
    fn subcommand_outside_allow_but_not_denied_reports_allow_set() {
        let v = validate_command("docker ps -a", "docker", &default_allow());
        assert!(!v.valid);
        assert!(v.error.unwrap().contains("run"));
    }
}
