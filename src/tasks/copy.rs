//! File copy step: local files and directories to a remote target folder

use crate::error::{Result, SshTaskError};
use crate::models::{ConnectionConfig, CopyStep, StepAction};
use crate::session::RemoteSession;
use crate::tasks::StepRunner;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Runner for `copy` steps.
///
/// Uploads happen sequentially over one session. With `overwrite: false`,
/// files already present on the remote are skipped via the session's
/// existence check.
pub struct CopyRunner;

impl CopyRunner {
    fn run_blocking(connection: &ConnectionConfig, step: &CopyStep) -> Result<()> {
        let files = collect_sources(&step.sources)?;

        if files.is_empty() {
            if step.fail_on_empty_source {
                return Err(SshTaskError::Validation(
                    "No files matched the configured sources".to_string(),
                ));
            }
            warn!("No files matched the configured sources; nothing to copy");
            return Ok(());
        }

        let mut session = RemoteSession::connect(connection)?;
        let result = Self::copy_all(&mut session, &files, step);
        session.close();
        result
    }

    fn copy_all(
        session: &mut RemoteSession,
        files: &[(PathBuf, String)],
        step: &CopyStep,
    ) -> Result<()> {
        for (local, relative) in files {
            let remote = join_remote(&step.target_folder, relative);
            if !step.overwrite && session.path_exists(&remote)? {
                info!("Skipping existing remote file {}", remote);
                continue;
            }
            session.upload_file(local, &remote)?;
            info!("Copied {} to {}", local.display(), remote);
        }
        Ok(())
    }
}

/// Expand sources into pairs of (local file, path relative to the target
/// folder). A file source lands directly under the target; a directory
/// source is walked recursively and keeps its internal structure.
fn collect_sources(sources: &[String]) -> Result<Vec<(PathBuf, String)>> {
    let mut out = Vec::new();
    for source in sources {
        let expanded = shellexpand::tilde(source).to_string();
        let path = PathBuf::from(&expanded);
        if path.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| {
                    SshTaskError::Validation(format!("Source '{}' has no file name", source))
                })?;
            out.push((path, name));
        } else if path.is_dir() {
            walk_dir(&path, &path, &mut out)?;
        } else {
            warn!("Source '{}' does not exist", source);
        }
    }
    Ok(out)
}

fn walk_dir(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_dir(root, &path, out)?;
        } else if path.is_file() {
            let relative = path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| path.to_string_lossy().to_string());
            out.push((path, relative));
        }
    }
    Ok(())
}

fn join_remote(target_folder: &str, relative: &str) -> String {
    format!("{}/{}", target_folder.trim_end_matches('/'), relative)
}

#[async_trait]
impl StepRunner for CopyRunner {
    async fn run(&self, connection: &ConnectionConfig, action: &StepAction) -> anyhow::Result<()> {
        match action {
            StepAction::Copy(step) => {
                let connection = connection.clone();
                let step = step.clone();
                tokio::task::spawn_blocking(move || Self::run_blocking(&connection, &step))
                    .await??;
                Ok(())
            }
            _ => Err(anyhow::anyhow!("Invalid step type for CopyRunner")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthMethod, ExecStep};
    use tempfile::TempDir;

    #[test]
    fn test_join_remote_trims_trailing_slash() {
        assert_eq!(join_remote("/var/www/", "index.html"), "/var/www/index.html");
        assert_eq!(join_remote("/var/www", "index.html"), "/var/www/index.html");
    }

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.tar.gz");
        fs::write(&file, b"payload").unwrap();

        let files = collect_sources(&[file.to_string_lossy().to_string()]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, "app.tar.gz");
    }

    #[test]
    fn test_collect_directory_keeps_structure() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("assets/css")).unwrap();
        fs::write(dir.path().join("index.html"), b"<html>").unwrap();
        fs::write(dir.path().join("assets/css/site.css"), b"body{}").unwrap();

        let mut files =
            collect_sources(&[dir.path().to_string_lossy().to_string()]).unwrap();
        files.sort_by(|a, b| a.1.cmp(&b.1));

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].1, "assets/css/site.css");
        assert_eq!(files[1].1, "index.html");
    }

    #[test]
    fn test_collect_missing_source_is_empty() {
        let files = collect_sources(&["/nonexistent/path".to_string()]).unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_copy_runner_rejects_exec_step() {
        let connection = ConnectionConfig {
            host: "app.example.com".to_string(),
            port: 22,
            username: "deploy".to_string(),
            auth: AuthMethod::Key {
                key_path: "/home/ci/.ssh/id_rsa".to_string(),
                passphrase: None,
                passphrase_env: None,
            },
            ready_timeout: 20,
        };
        let action = StepAction::Exec(ExecStep {
            commands: vec!["uptime".to_string()],
            fail_on_stderr: false,
        });

        let result = CopyRunner.run(&connection, &action).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_source_fails_when_configured() {
        let connection = ConnectionConfig {
            host: "app.example.com".to_string(),
            port: 22,
            username: "deploy".to_string(),
            auth: AuthMethod::Key {
                key_path: "/home/ci/.ssh/id_rsa".to_string(),
                passphrase: None,
                passphrase_env: None,
            },
            ready_timeout: 20,
        };
        let action = StepAction::Copy(CopyStep {
            sources: vec!["/nonexistent/path".to_string()],
            target_folder: "/var/www".to_string(),
            overwrite: true,
            fail_on_empty_source: true,
        });

        // Fails on the empty source set before any connection attempt
        let result = CopyRunner.run(&connection, &action).await;
        assert!(result.is_err());
    }
}
