//! Core data models for the sshtask runner

use crate::error::{Result, SshTaskError};
use serde::{Deserialize, Serialize};

// Input validation limits
pub const MAX_TASK_FILE_SIZE: usize = 1_048_576; // 1 MB
pub const MAX_STEP_COUNT: usize = 256;
pub const MAX_STEP_NAME_LEN: usize = 64;
pub const MAX_COMMAND_LEN: usize = 4_096; // 4 KB

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 20;

/// Connection settings for one remote host.
///
/// Constructed once per task invocation, passed by value into the session,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    /// Seconds allowed for TCP connect + SSH handshake
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: u64,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_ready_timeout() -> u64 {
    DEFAULT_READY_TIMEOUT_SECS
}

/// Credential variant. The enum guarantees exactly one is populated.
///
/// Secrets can be given inline or indirected through an environment
/// variable so task files can be committed without credentials in them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum AuthMethod {
    Password {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password_env: Option<String>,
    },
    Key {
        key_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase_env: Option<String>,
    },
}

impl AuthMethod {
    /// Resolve the password for the `Password` variant, reading the
    /// environment when only `password_env` is given.
    pub fn resolve_password(&self) -> Result<String> {
        match self {
            AuthMethod::Password {
                password,
                password_env,
            } => {
                if let Some(secret) = password {
                    return Ok(secret.clone());
                }
                if let Some(var) = password_env {
                    return std::env::var(var).map_err(|_| {
                        SshTaskError::Validation(format!(
                            "Environment variable '{}' is not set",
                            var
                        ))
                    });
                }
                Err(SshTaskError::Validation(
                    "Password auth requires 'password' or 'password_env'".to_string(),
                ))
            }
            AuthMethod::Key { .. } => Err(SshTaskError::Validation(
                "resolve_password called on key auth".to_string(),
            )),
        }
    }

    /// Resolve the optional key passphrase for the `Key` variant.
    pub fn resolve_passphrase(&self) -> Result<Option<String>> {
        match self {
            AuthMethod::Key {
                passphrase,
                passphrase_env,
                ..
            } => {
                if let Some(secret) = passphrase {
                    return Ok(Some(secret.clone()));
                }
                if let Some(var) = passphrase_env {
                    return std::env::var(var).map(Some).map_err(|_| {
                        SshTaskError::Validation(format!(
                            "Environment variable '{}' is not set",
                            var
                        ))
                    });
                }
                Ok(None)
            }
            AuthMethod::Password { .. } => Ok(None),
        }
    }
}

/// Per-command execution options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RemoteCommandOptions {
    #[serde(default)]
    pub fail_on_stderr: bool,
}

/// Outcome of one remote command. Immutable after creation.
///
/// An absent exit code means the remote never reported one; that case is
/// treated as success by the resolution policy in
/// [`crate::session::RemoteSession::run_command`].
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr_written: bool,
}

/// Task file parsed from YAML: one connection, a sequence of steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub connection: ConnectionConfig,
    pub steps: Vec<StepConfig>,
}

/// One named step of a task file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    #[serde(flatten)]
    pub action: StepAction,
}

/// Step variants: run commands, run an uploaded script, or copy files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepAction {
    Exec(ExecStep),
    Script(ScriptStep),
    Copy(CopyStep),
}

/// Run a list of commands sequentially over one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecStep {
    pub commands: Vec<String>,
    #[serde(default)]
    pub fail_on_stderr: bool,
}

/// Upload a local script, execute it remotely, then delete it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub script_path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub fail_on_stderr: bool,
}

/// Copy local files or directories to a remote target folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyStep {
    pub sources: Vec<String>,
    pub target_folder: String,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    #[serde(default)]
    pub fail_on_empty_source: bool,
}

fn default_overwrite() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let yaml = r#"
host: build.example.com
username: deploy
auth:
  method: key
  key_path: ~/.ssh/id_rsa
"#;
        let config: ConnectionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.ready_timeout, 20);
        assert!(matches!(config.auth, AuthMethod::Key { .. }));
    }

    #[test]
    fn test_auth_method_password_serde() {
        let yaml = r#"
method: password
password_env: SSH_PASSWORD
"#;
        let auth: AuthMethod = serde_yaml::from_str(yaml).unwrap();
        match auth {
            AuthMethod::Password {
                password,
                password_env,
            } => {
                assert!(password.is_none());
                assert_eq!(password_env.as_deref(), Some("SSH_PASSWORD"));
            }
            _ => panic!("Expected password auth"),
        }
    }

    #[test]
    fn test_resolve_password_inline() {
        let auth = AuthMethod::Password {
            password: Some("hunter2".to_string()),
            password_env: None,
        };
        assert_eq!(auth.resolve_password().unwrap(), "hunter2");
    }

    #[test]
    fn test_resolve_password_from_env() {
        std::env::set_var("SSHTASK_TEST_PW", "from-env");
        let auth = AuthMethod::Password {
            password: None,
            password_env: Some("SSHTASK_TEST_PW".to_string()),
        };
        assert_eq!(auth.resolve_password().unwrap(), "from-env");
    }

    #[test]
    fn test_resolve_password_missing() {
        let auth = AuthMethod::Password {
            password: None,
            password_env: None,
        };
        assert!(matches!(
            auth.resolve_password(),
            Err(SshTaskError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_passphrase_absent_is_none() {
        let auth = AuthMethod::Key {
            key_path: "/home/ci/.ssh/id_rsa".to_string(),
            passphrase: None,
            passphrase_env: None,
        };
        assert!(auth.resolve_passphrase().unwrap().is_none());
    }

    #[test]
    fn test_step_action_serde() {
        let yaml = r#"
name: restart
type: exec
commands:
  - "systemctl restart myapp"
"#;
        let step: StepConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.name, "restart");
        match step.action {
            StepAction::Exec(exec) => {
                assert_eq!(exec.commands.len(), 1);
                assert!(!exec.fail_on_stderr);
            }
            _ => panic!("Expected exec step"),
        }
    }

    #[test]
    fn test_copy_step_defaults() {
        let yaml = r#"
name: publish
type: copy
sources: ["dist"]
target_folder: /var/www/app
"#;
        let step: StepConfig = serde_yaml::from_str(yaml).unwrap();
        match step.action {
            StepAction::Copy(copy) => {
                assert!(copy.overwrite);
                assert!(!copy.fail_on_empty_source);
            }
            _ => panic!("Expected copy step"),
        }
    }

    #[test]
    fn test_remote_command_options_default() {
        let options = RemoteCommandOptions::default();
        assert!(!options.fail_on_stderr);
    }
}
