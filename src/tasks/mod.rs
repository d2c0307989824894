//! Task step runners
//!
//! Each runner opens one session, performs its operations sequentially, and
//! closes the session on both the success and the error path.

pub mod copy;
pub mod exec;

use crate::models::{ConnectionConfig, StepAction, TaskFile};
use async_trait::async_trait;
use tracing::info;

/// Runner for one category of task step
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Execute a step against the configured remote host
    async fn run(&self, connection: &ConnectionConfig, action: &StepAction) -> anyhow::Result<()>;
}

/// Execute every step of a task file in order, aborting on the first
/// failure.
pub async fn run_task_file(task: &TaskFile) -> anyhow::Result<()> {
    for step in &task.steps {
        info!("Running step '{}'", step.name);
        let runner: &dyn StepRunner = match step.action {
            StepAction::Exec(_) | StepAction::Script(_) => &exec::ExecRunner,
            StepAction::Copy(_) => &copy::CopyRunner,
        };
        runner.run(&task.connection, &step.action).await?;
        info!("Step '{}' completed", step.name);
    }
    Ok(())
}
