//! ssh2-backed transport
//!
//! Blocking by design: the ssh2 library is synchronous, so the task layer
//! wraps session work in `tokio::task::spawn_blocking`.

use crate::error::{Result, SshTaskError};
use crate::models::{AuthMethod, ConnectionConfig};
use crate::transport::{CommandChannel, StreamEvent, Transport};
use ssh2::{OpenFlags, OpenType, Session, Sftp};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub struct Ssh2Transport {
    session: Session,
    /// SFTP sub-channel, opened on first file operation
    sftp: Option<Sftp>,
    host: String,
}

impl Ssh2Transport {
    /// Open a TCP connection, perform the SSH handshake, and authenticate
    /// with the configured credential variant. No retries; failures surface
    /// immediately as [`SshTaskError::Connection`].
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let target = format!("{}:{}", config.host, config.port);
        debug!("Opening SSH transport to {}", target);

        let conn_err = |message: String| SshTaskError::Connection {
            host: config.host.clone(),
            message,
        };

        let addr = target
            .to_socket_addrs()
            .map_err(|e| conn_err(format!("Failed to resolve host: {}", e)))?
            .next()
            .ok_or_else(|| conn_err("Host resolved to no addresses".to_string()))?;

        let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(config.ready_timeout))
            .map_err(|e| conn_err(format!("Failed to connect: {}", e)))?;

        let mut session =
            Session::new().map_err(|e| conn_err(format!("Failed to create session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session.set_timeout((config.ready_timeout * 1000) as u32);
        session
            .handshake()
            .map_err(|e| conn_err(format!("SSH handshake failed: {}", e)))?;

        match &config.auth {
            AuthMethod::Password { .. } => {
                let password = config.auth.resolve_password()?;
                session
                    .userauth_password(&config.username, &password)
                    .map_err(|e| conn_err(format!("Password authentication failed: {}", e)))?;
            }
            AuthMethod::Key { key_path, .. } => {
                let expanded = shellexpand::tilde(key_path).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(SshTaskError::Validation(format!(
                        "SSH key file not found: {}",
                        expanded
                    )));
                }
                let passphrase = config.auth.resolve_passphrase()?;
                session
                    .userauth_pubkey_file(
                        &config.username,
                        None,
                        Path::new(&expanded),
                        passphrase.as_deref(),
                    )
                    .map_err(|e| conn_err(format!("Key authentication failed: {}", e)))?;
            }
        }

        if !session.authenticated() {
            return Err(conn_err("Authentication failed".to_string()));
        }

        // The handshake timeout does not apply to command execution
        session.set_timeout(0);

        debug!("SSH transport to {} established", target);

        Ok(Self {
            session,
            sftp: None,
            host: config.host.clone(),
        })
    }

    fn sftp(&mut self) -> Result<&Sftp> {
        if self.sftp.is_none() {
            let sftp = self.session.sftp().map_err(|e| SshTaskError::Connection {
                host: self.host.clone(),
                message: format!("Failed to open SFTP channel: {}", e),
            })?;
            self.sftp = Some(sftp);
        }
        Ok(self.sftp.as_ref().unwrap())
    }
}

impl Transport for Ssh2Transport {
    fn exec(&mut self, command: &str) -> Result<Box<dyn CommandChannel>> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| SshTaskError::Ssh(format!("Failed to open channel: {}", e)))?;
        channel
            .exec(command)
            .map_err(|e| SshTaskError::Ssh(format!("Failed to execute command: {}", e)))?;
        Ok(Box::new(Ssh2CommandChannel {
            reader: BufReader::new(channel),
            phase: Phase::Stdout,
        }))
    }

    fn exists(&mut self, remote_path: &str) -> Result<bool> {
        let sftp = self.sftp()?;
        match sftp.stat(Path::new(remote_path)) {
            Ok(_) => Ok(true),
            Err(err) => {
                let io_err: std::io::Error = err.into();
                if io_err.kind() == std::io::ErrorKind::NotFound {
                    Ok(false)
                } else {
                    Err(SshTaskError::Transfer {
                        path: remote_path.to_string(),
                        message: io_err.to_string(),
                    })
                }
            }
        }
    }

    fn mkdir(&mut self, remote_path: &str) -> Result<()> {
        let sftp = self.sftp()?;
        sftp.mkdir(Path::new(remote_path), 0o755)
            .map_err(|e| SshTaskError::Transfer {
                path: remote_path.to_string(),
                message: format!("mkdir failed: {}", e),
            })
    }

    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
        let mut local_file = fs::File::open(local_path)?;
        let sftp = self.sftp()?;
        let mut remote_file = sftp
            .open_mode(
                Path::new(remote_path),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                0o644,
                OpenType::File,
            )
            .map_err(|e| SshTaskError::Transfer {
                path: remote_path.to_string(),
                message: format!("Failed to open remote file: {}", e),
            })?;
        std::io::copy(&mut local_file, &mut remote_file).map_err(|e| SshTaskError::Transfer {
            path: remote_path.to_string(),
            message: format!("Write failed: {}", e),
        })?;
        Ok(())
    }

    fn close_file_channel(&mut self) -> Result<()> {
        // ssh2 closes the SFTP channel on drop
        self.sftp.take();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.session
            .disconnect(None, "session closed", None)
            .map_err(|e| SshTaskError::Ssh(format!("Disconnect failed: {}", e)))
    }
}

enum Phase {
    Stdout,
    Stderr,
    Close,
}

/// Adapts one ssh2 exec channel into the [`StreamEvent`] sequence: stdout
/// line events, then at most one stderr event, then `Closed`.
struct Ssh2CommandChannel {
    reader: BufReader<ssh2::Channel>,
    phase: Phase,
}

impl CommandChannel for Ssh2CommandChannel {
    fn next_event(&mut self) -> Result<StreamEvent> {
        loop {
            match self.phase {
                Phase::Stdout => {
                    let mut line = String::new();
                    let read = self
                        .reader
                        .read_line(&mut line)
                        .map_err(|e| SshTaskError::Ssh(format!("Failed to read stdout: {}", e)))?;
                    if read == 0 {
                        self.phase = Phase::Stderr;
                        continue;
                    }
                    while line.ends_with('\n') || line.ends_with('\r') {
                        line.pop();
                    }
                    return Ok(StreamEvent::Stdout(line));
                }
                Phase::Stderr => {
                    self.phase = Phase::Close;
                    let mut text = String::new();
                    self.reader
                        .get_mut()
                        .stderr()
                        .read_to_string(&mut text)
                        .map_err(|e| SshTaskError::Ssh(format!("Failed to read stderr: {}", e)))?;
                    if !text.is_empty() {
                        return Ok(StreamEvent::Stderr(text));
                    }
                }
                Phase::Close => {
                    let channel = self.reader.get_mut();
                    channel
                        .wait_close()
                        .map_err(|e| SshTaskError::Ssh(format!("Failed to close channel: {}", e)))?;
                    let exit_code = channel.exit_status().ok();
                    return Ok(StreamEvent::Closed { exit_code });
                }
            }
        }
    }
}
