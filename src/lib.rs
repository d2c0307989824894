//! # sshtask
//!
//! Remote command execution and file copy over SSH for CI pipelines.
//!
//! A task file names a remote host, credentials, and an ordered list of
//! steps. Each step either runs commands, uploads and runs a script, or
//! copies files to the remote. All remote work goes through
//! [`session::RemoteSession`], a thin stateful wrapper over an SSH/SFTP
//! transport.

pub mod cli;
pub mod error;
pub mod logging;
pub mod models;
pub mod parser;
pub mod session;
pub mod tasks;
pub mod transport;

pub use error::{Result, SshTaskError};
pub use models::{CommandResult, ConnectionConfig, RemoteCommandOptions, TaskFile};
pub use session::RemoteSession;
