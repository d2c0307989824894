//! Transport abstraction over the SSH/SFTP library
//!
//! The session logic in [`crate::session`] is written against these traits
//! so the command resolution policy and the upload call ordering can be
//! tested with a recording mock. The only production implementation is
//! [`ssh::Ssh2Transport`].

pub mod ssh;

use crate::error::Result;

#[cfg(test)]
use mockall::automock;

/// Events produced by one in-flight remote command.
///
/// The underlying library reports a command as a stream of data callbacks
/// plus one close; the session adapts that stream into a single
/// [`crate::models::CommandResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One line of stdout, without the trailing newline
    Stdout(String),
    /// A chunk of stderr output
    Stderr(String),
    /// Stream closed; the remote exit code may be absent
    Closed { exit_code: Option<i32> },
}

/// Event source for one dispatched command
pub trait CommandChannel: Send {
    /// Return the next event. `Closed` is terminal; callers must not poll
    /// past it.
    fn next_event(&mut self) -> Result<StreamEvent>;
}

/// One authenticated connection to a remote host.
///
/// The exec channel and the file-transfer channel share the same identity
/// and host. All operations are blocking; async callers go through
/// `tokio::task::spawn_blocking`.
#[cfg_attr(test, automock)]
pub trait Transport: Send {
    /// Dispatch a command and return its event stream
    fn exec(&mut self, command: &str) -> Result<Box<dyn CommandChannel>>;

    /// Best-effort existence check for a remote path
    fn exists(&mut self, remote_path: &str) -> Result<bool>;

    /// Create a single remote directory
    fn mkdir(&mut self, remote_path: &str) -> Result<()>;

    /// Transfer one local file to the remote path
    fn put(&mut self, local_path: &std::path::Path, remote_path: &str) -> Result<()>;

    /// Close the file-transfer sub-channel, if open
    fn close_file_channel(&mut self) -> Result<()>;

    /// Tear down the transport
    fn close(&mut self) -> Result<()>;
}
