//! CLI interface for sshtask

use crate::error::{Result, SshTaskError};
use crate::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use crate::models::{
    AuthMethod, ConnectionConfig, CopyStep, ExecStep, StepAction, DEFAULT_READY_TIMEOUT_SECS,
    DEFAULT_SSH_PORT,
};
use crate::parser::{parse_task_file, validate_connection};
use crate::tasks::{self, StepRunner};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// sshtask - Remote command execution and file copy over SSH for CI pipelines
#[derive(Parser, Debug)]
#[command(name = "sshtask")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Remote command execution and file copy over SSH for CI pipelines", long_about = None)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute every step of a task file
    Run {
        /// Path to task YAML file
        taskfile: PathBuf,
    },

    /// Validate a task file without connecting
    Validate {
        /// Path to task YAML file
        taskfile: PathBuf,
    },

    /// Run one or more commands on a remote host
    Exec {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Commands to run sequentially
        #[arg(required = true)]
        commands: Vec<String>,

        /// Fail when the remote writes anything to stderr
        #[arg(long)]
        fail_on_stderr: bool,
    },

    /// Copy local files or directories to a remote folder
    Copy {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Local files or directories to copy
        #[arg(required = true)]
        sources: Vec<String>,

        /// Remote target folder
        #[arg(short, long)]
        target_folder: String,

        /// Skip files that already exist on the remote
        #[arg(long)]
        no_overwrite: bool,

        /// Fail when no local files match the sources
        #[arg(long)]
        fail_on_empty_source: bool,
    },
}

/// Connection flags shared by the one-off subcommands
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Remote host name or address
    #[arg(long)]
    pub host: String,

    /// Remote SSH port
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// Remote user name
    #[arg(short, long)]
    pub username: String,

    /// Environment variable holding the password
    #[arg(long, conflicts_with = "key_path")]
    pub password_env: Option<String>,

    /// Path to the private key file
    #[arg(long)]
    pub key_path: Option<String>,

    /// Environment variable holding the key passphrase
    #[arg(long, requires = "key_path")]
    pub passphrase_env: Option<String>,

    /// Seconds allowed for connect + handshake
    #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
    pub ready_timeout: u64,
}

impl ConnectionArgs {
    /// Build a [`ConnectionConfig`], requiring exactly one credential source.
    pub fn to_config(&self) -> Result<ConnectionConfig> {
        let auth = if let Some(key_path) = &self.key_path {
            AuthMethod::Key {
                key_path: key_path.clone(),
                passphrase: None,
                passphrase_env: self.passphrase_env.clone(),
            }
        } else if let Some(password_env) = &self.password_env {
            AuthMethod::Password {
                password: None,
                password_env: Some(password_env.clone()),
            }
        } else {
            return Err(SshTaskError::Validation(
                "Either --key-path or --password-env is required".to_string(),
            ));
        };

        let config = ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth,
            ready_timeout: self.ready_timeout,
        };
        validate_connection(&config)?;
        Ok(config)
    }
}

impl Cli {
    /// Initialize logging based on CLI arguments
    pub fn init_logging(&self) -> anyhow::Result<()> {
        let log_level: LogLevel = self.log_level.as_str().into();
        let log_format = match self.log_format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let config = LogConfig {
            level: log_level,
            format: log_format,
        };

        init_logging(&config)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Run { taskfile } => {
                self.run_task(taskfile).await?;
            }
            Commands::Validate { taskfile } => {
                self.validate_task(taskfile)?;
            }
            Commands::Exec {
                connection,
                commands,
                fail_on_stderr,
            } => {
                let config = connection.to_config()?;
                let action = StepAction::Exec(ExecStep {
                    commands: commands.clone(),
                    fail_on_stderr: *fail_on_stderr,
                });
                tasks::exec::ExecRunner.run(&config, &action).await?;
            }
            Commands::Copy {
                connection,
                sources,
                target_folder,
                no_overwrite,
                fail_on_empty_source,
            } => {
                let config = connection.to_config()?;
                let action = StepAction::Copy(CopyStep {
                    sources: sources.clone(),
                    target_folder: target_folder.clone(),
                    overwrite: !no_overwrite,
                    fail_on_empty_source: *fail_on_empty_source,
                });
                tasks::copy::CopyRunner.run(&config, &action).await?;
            }
        }
        Ok(())
    }

    /// Run all steps of a task file
    async fn run_task(&self, taskfile: &PathBuf) -> anyhow::Result<()> {
        info!("Loading task file from: {:?}", taskfile);

        let task = parse_task_file(taskfile)?;
        info!("Task '{}' loaded successfully", task.name);

        tasks::run_task_file(&task).await?;

        info!("Task '{}' completed successfully", task.name);
        Ok(())
    }

    /// Validate a task file without executing
    fn validate_task(&self, taskfile: &PathBuf) -> anyhow::Result<()> {
        info!("Validating task file: {:?}", taskfile);

        let task = parse_task_file(taskfile)?;

        println!("Task '{}' is valid", task.name);
        println!(
            "Target: {}@{}:{}",
            task.connection.username, task.connection.host, task.connection.port
        );
        println!("Steps: {}", task.steps.len());
        for step in &task.steps {
            let kind = match step.action {
                StepAction::Exec(_) => "exec",
                StepAction::Script(_) => "script",
                StepAction::Copy(_) => "copy",
            };
            println!("  - {} ({})", step.name, kind);
        }

        Ok(())
    }
}
