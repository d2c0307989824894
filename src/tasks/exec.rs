//! Remote command and script execution steps

use crate::error::{Result, SshTaskError};
use crate::models::{ConnectionConfig, ExecStep, RemoteCommandOptions, ScriptStep, StepAction};
use crate::session::RemoteSession;
use crate::tasks::StepRunner;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Runner for `exec` and `script` steps.
///
/// Commands run sequentially over one session; the first failure aborts the
/// step. ssh2 is synchronous, so the work happens on the blocking pool.
pub struct ExecRunner;

impl ExecRunner {
    fn run_commands_blocking(connection: &ConnectionConfig, step: &ExecStep) -> Result<()> {
        let options = RemoteCommandOptions {
            fail_on_stderr: step.fail_on_stderr,
        };

        let mut session = RemoteSession::connect(connection)?;
        let result = step
            .commands
            .iter()
            .try_for_each(|command| session.run_command(command, options).map(|_| ()));
        session.close();
        result
    }

    fn run_script_blocking(connection: &ConnectionConfig, step: &ScriptStep) -> Result<()> {
        let expanded = shellexpand::tilde(&step.script_path).to_string();
        let local_path = Path::new(&expanded);
        if !local_path.is_file() {
            return Err(SshTaskError::Validation(format!(
                "Script file not found: {}",
                expanded
            )));
        }

        // Home-relative name, unique per invocation
        let remote_name = format!("sshtask-{}.sh", std::process::id());

        let mut session = RemoteSession::connect(connection)?;
        let result = Self::execute_script(&mut session, local_path, &remote_name, step);

        // Best-effort removal of the uploaded script; never masks the
        // primary outcome
        if let Err(e) = session.run_command(
            &cleanup_command(&remote_name),
            RemoteCommandOptions::default(),
        ) {
            debug!("Ignoring script cleanup error: {}", e);
        }
        session.close();
        result
    }

    fn execute_script(
        session: &mut RemoteSession,
        local_path: &Path,
        remote_name: &str,
        step: &ScriptStep,
    ) -> Result<()> {
        info!(
            "Uploading script {} as {}",
            local_path.display(),
            remote_name
        );
        session.upload_file(local_path, remote_name)?;
        session.run_command(&prepare_command(remote_name), RemoteCommandOptions::default())?;
        session.run_command(
            &invoke_command(remote_name, &step.args),
            RemoteCommandOptions {
                fail_on_stderr: step.fail_on_stderr,
            },
        )?;
        Ok(())
    }
}

/// Strip CR line endings and mark the script executable. Scripts edited on
/// Windows carry CRLF endings that the remote shell would choke on.
fn prepare_command(remote_name: &str) -> String {
    format!(
        "tr -d '\\r' < {0} > {0}.unix && chmod +x {0}.unix",
        remote_name
    )
}

fn invoke_command(remote_name: &str, args: &[String]) -> String {
    let mut command = format!("./{}.unix", remote_name);
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}

fn cleanup_command(remote_name: &str) -> String {
    format!("rm -f {0} {0}.unix", remote_name)
}

#[async_trait]
impl StepRunner for ExecRunner {
    async fn run(&self, connection: &ConnectionConfig, action: &StepAction) -> anyhow::Result<()> {
        match action {
            StepAction::Exec(step) => {
                let connection = connection.clone();
                let step = step.clone();
                tokio::task::spawn_blocking(move || {
                    Self::run_commands_blocking(&connection, &step)
                })
                .await??;
                Ok(())
            }
            StepAction::Script(step) => {
                let connection = connection.clone();
                let step = step.clone();
                tokio::task::spawn_blocking(move || Self::run_script_blocking(&connection, &step))
                    .await??;
                Ok(())
            }
            _ => Err(anyhow::anyhow!("Invalid step type for ExecRunner")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CopyStep;

    #[test]
    fn test_prepare_command_strips_cr_and_marks_executable() {
        let command = prepare_command("sshtask-42.sh");
        assert_eq!(
            command,
            "tr -d '\\r' < sshtask-42.sh > sshtask-42.sh.unix && chmod +x sshtask-42.sh.unix"
        );
        // The prep pipeline must not contain semicolons the session would
        // rewrite into newlines
        assert!(!command.contains(';'));
    }

    #[test]
    fn test_invoke_command_appends_args() {
        let command = invoke_command("sshtask-42.sh", &["--fast".to_string(), "prod".to_string()]);
        assert_eq!(command, "./sshtask-42.sh.unix --fast prod");
    }

    #[test]
    fn test_invoke_command_without_args() {
        assert_eq!(invoke_command("sshtask-42.sh", &[]), "./sshtask-42.sh.unix");
    }

    #[test]
    fn test_cleanup_command_removes_both_copies() {
        assert_eq!(
            cleanup_command("sshtask-42.sh"),
            "rm -f sshtask-42.sh sshtask-42.sh.unix"
        );
    }

    #[tokio::test]
    async fn test_exec_runner_rejects_copy_step() {
        let connection = ConnectionConfig {
            host: "app.example.com".to_string(),
            port: 22,
            username: "deploy".to_string(),
            auth: crate::models::AuthMethod::Key {
                key_path: "/home/ci/.ssh/id_rsa".to_string(),
                passphrase: None,
                passphrase_env: None,
            },
            ready_timeout: 20,
        };
        let action = StepAction::Copy(CopyStep {
            sources: vec!["dist".to_string()],
            target_folder: "/var/www".to_string(),
            overwrite: true,
            fail_on_empty_source: false,
        });

        let result = ExecRunner.run(&connection, &action).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_script_runner_rejects_missing_script() {
        let connection = ConnectionConfig {
            host: "app.example.com".to_string(),
            port: 22,
            username: "deploy".to_string(),
            auth: crate::models::AuthMethod::Key {
                key_path: "/home/ci/.ssh/id_rsa".to_string(),
                passphrase: None,
                passphrase_env: None,
            },
            ready_timeout: 20,
        };
        let action = StepAction::Script(ScriptStep {
            script_path: "/nonexistent/setup.sh".to_string(),
            args: vec![],
            fail_on_stderr: false,
        });

        // Fails on the local script check before any connection attempt
        let result = ExecRunner.run(&connection, &action).await;
        assert!(result.is_err());
    }
}
