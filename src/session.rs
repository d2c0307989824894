//! Remote session: connect once, run N commands and/or transfer M files,
//! then close once.
//!
//! The session has a two-state lifecycle (open, closed). Operations on a
//! closed session fail fast with [`SshTaskError::SessionClosed`]; `close`
//! is idempotent and never returns an error. Callers issue operations
//! strictly sequentially, so no locking is needed.

use crate::error::{Result, SshTaskError};
use crate::models::{CommandResult, ConnectionConfig, RemoteCommandOptions};
use crate::transport::ssh::Ssh2Transport;
use crate::transport::{StreamEvent, Transport};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rewrite semicolon-separated commands into newline-separated form.
///
/// The remote shell runs newline-separated commands sequentially, which
/// matches the semantics of top-level `;` separators.
pub fn normalize_command(command: &str) -> String {
    command.replace(';', "\n")
}

pub struct RemoteSession {
    /// `None` once closed
    transport: Option<Box<dyn Transport>>,
    host: String,
}

impl RemoteSession {
    /// Open an authenticated session using the ssh2 transport.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let transport = Ssh2Transport::connect(config)?;
        Ok(Self::from_transport(Box::new(transport), &config.host))
    }

    /// Wrap an already-connected transport.
    pub fn from_transport(transport: Box<dyn Transport>, host: &str) -> Self {
        Self {
            transport: Some(transport),
            host: host.to_string(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&mut self) -> Result<&mut (dyn Transport + 'static)> {
        self.transport
            .as_deref_mut()
            .ok_or(SshTaskError::SessionClosed)
    }

    /// Execute a command on the remote host.
    ///
    /// Stdout lines are logged as they arrive, in order. Whether any stderr
    /// data arrived is accumulated. The outcome is resolved at stream close:
    ///
    /// 1. stderr data arrived and `fail_on_stderr` is set: error.
    /// 2. Exit code present and non-zero: error carrying command and code.
    /// 3. Otherwise success. An absent exit code counts as success.
    pub fn run_command(
        &mut self,
        command: &str,
        options: RemoteCommandOptions,
    ) -> Result<CommandResult> {
        let normalized = normalize_command(command);
        debug!(host = %self.host, "Executing remote command: {}", normalized);

        let mut channel = self.transport()?.exec(&normalized)?;
        let mut stdout = String::new();
        let mut stderr_written = false;

        let exit_code = loop {
            match channel.next_event()? {
                StreamEvent::Stdout(line) => {
                    info!("{}", line);
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                StreamEvent::Stderr(chunk) => {
                    stderr_written = true;
                    warn!("remote stderr: {}", chunk.trim_end());
                }
                StreamEvent::Closed { exit_code } => break exit_code,
            }
        };

        if stderr_written && options.fail_on_stderr {
            return Err(SshTaskError::StderrDetected {
                command: command.to_string(),
            });
        }

        match exit_code {
            Some(code) if code != 0 => Err(SshTaskError::CommandFailed {
                command: command.to_string(),
                exit_code: code,
            }),
            _ => Ok(CommandResult {
                exit_code,
                stdout,
                stderr_written,
            }),
        }
    }

    /// Transfer one local file to an absolute or home-relative remote path,
    /// creating missing parent directories first. No retry, no checksum
    /// verification, no partial-transfer resume.
    pub fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> Result<String> {
        debug!(
            host = %self.host,
            "Uploading {} to {}",
            local_path.display(),
            remote_path
        );
        self.ensure_remote_parent(remote_path)?;
        self.transport()?.put(local_path, remote_path)?;
        Ok(remote_path.to_string())
    }

    /// Best-effort existence check for a remote path.
    pub fn path_exists(&mut self, remote_path: &str) -> Result<bool> {
        self.transport()?.exists(remote_path)
    }

    /// Create each missing component of the remote parent directory.
    fn ensure_remote_parent(&mut self, remote_path: &str) -> Result<()> {
        let path = Path::new(remote_path);
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let mut current = PathBuf::new();
        for part in parent.components() {
            current.push(part);
            if current.as_os_str().is_empty() || current == Path::new("/") {
                continue;
            }
            let dir = current.to_string_lossy().to_string();
            if self.transport()?.exists(&dir)? {
                continue;
            }
            debug!("Creating remote directory {}", dir);
            self.transport()?.mkdir(&dir)?;
        }
        Ok(())
    }

    /// Close the session: file-transfer channel first, then the command
    /// transport. Teardown errors are demoted to debug logs so they can
    /// never mask the primary task outcome. Safe to call repeatedly and on
    /// a never-used session.
    pub fn close(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        if let Err(e) = transport.close_file_channel() {
            debug!("Ignoring file channel teardown error: {}", e);
        }
        if let Err(e) = transport.close() {
            debug!("Ignoring transport teardown error: {}", e);
        }
        debug!(host = %self.host, "Session closed");
    }
}
