//! Error types for sshtask

use thiserror::Error;

/// sshtask error types
#[derive(Error, Debug)]
pub enum SshTaskError {
    /// YAML parsing errors
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Task file size exceeded limit
    #[error("Task file exceeds 1MB limit (size: {0} bytes)")]
    TaskFileSizeExceeded(usize),

    /// Step count exceeded limit
    #[error("Step count {count} exceeds limit of {limit}")]
    StepCountExceeded { count: usize, limit: usize },

    /// Invalid step name format
    #[error("Invalid step name '{name}': only alphanumeric, underscore, and dash allowed")]
    InvalidStepName { name: String },

    /// Command validation errors
    #[error("Command exceeds {limit} bytes")]
    CommandTooLong { limit: usize },

    /// Transport-level connect or authentication failure
    #[error("Connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    /// Remote command exited with a non-zero code
    #[error("Command '{command}' exited with code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    /// Remote command wrote to stderr while fail_on_stderr was set
    #[error("Command '{command}' wrote to stderr")]
    StderrDetected { command: String },

    /// File transfer failure (upload, mkdir, stat)
    #[error("Transfer of '{path}' failed: {message}")]
    Transfer { path: String, message: String },

    /// Transport-level errors during command execution
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Operation attempted on a closed session
    #[error("Session is closed")]
    SessionClosed,

    /// Generic validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using SshTaskError
pub type Result<T> = std::result::Result<T, SshTaskError>;
