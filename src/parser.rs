//! YAML parser with validation for task files

use crate::error::{Result, SshTaskError};
use crate::models::*;
use std::fs;
use std::path::Path;

/// Parse a task file from disk.
///
/// Reads and validates a YAML task file, enforcing resource limits:
/// - file size must be <= 1MB
/// - step count must be <= 256
/// - step names must be alphanumeric + underscore/dash only
/// - commands must be <= 4KB each
///
/// # Errors
///
/// * `SshTaskError::Io` - If file cannot be read
/// * `SshTaskError::TaskFileSizeExceeded` - If file exceeds 1MB
/// * `SshTaskError::YamlParse` - If YAML is malformed
/// * See [`parse_task_yaml`] for the validation errors
///
/// # Example
///
/// ```no_run
/// use sshtask::parser::parse_task_file;
///
/// let task = parse_task_file("deploy.yaml")?;
/// println!("Loaded task: {}", task.name);
/// # Ok::<(), sshtask::error::SshTaskError>(())
/// ```
pub fn parse_task_file<P: AsRef<Path>>(path: P) -> Result<TaskFile> {
    let content = fs::read_to_string(path)?;
    parse_task_yaml(&content)
}

/// Parse a task file from a YAML string, enforcing all validation limits.
///
/// Prefer [`parse_task_file`] for loading from disk.
///
/// # Example
///
/// ```
/// use sshtask::parser::parse_task_yaml;
///
/// let yaml = r#"
/// name: deploy
/// connection:
///   host: app.example.com
///   username: deploy
///   auth:
///     method: key
///     key_path: ~/.ssh/id_rsa
/// steps:
///   - name: restart
///     type: exec
///     commands: ["systemctl restart myapp"]
/// "#;
///
/// let task = parse_task_yaml(yaml)?;
/// assert_eq!(task.name, "deploy");
/// # Ok::<(), sshtask::error::SshTaskError>(())
/// ```
pub fn parse_task_yaml(content: &str) -> Result<TaskFile> {
    // Validate file size limit
    if content.len() > MAX_TASK_FILE_SIZE {
        return Err(SshTaskError::TaskFileSizeExceeded(content.len()));
    }

    let task: TaskFile = serde_yaml::from_str(content)?;

    if task.steps.is_empty() {
        return Err(SshTaskError::Validation(
            "Task file must define at least one step".to_string(),
        ));
    }

    if task.steps.len() > MAX_STEP_COUNT {
        return Err(SshTaskError::StepCountExceeded {
            count: task.steps.len(),
            limit: MAX_STEP_COUNT,
        });
    }

    // Validate step names and check for duplicates
    {
        let mut seen_names = std::collections::HashSet::with_capacity(task.steps.len());
        for step in &task.steps {
            validate_step_name(&step.name)?;
            if !seen_names.insert(&step.name) {
                return Err(SshTaskError::Validation(format!(
                    "Duplicate step name '{}'",
                    step.name,
                )));
            }
        }
    }

    validate_connection(&task.connection)?;

    for step in &task.steps {
        validate_step_action(&step.name, &step.action)?;
    }

    Ok(task)
}

/// Validate step name format and length
fn validate_step_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_STEP_NAME_LEN {
        return Err(SshTaskError::InvalidStepName {
            name: name.to_string(),
        });
    }

    // Alphanumeric + underscore + dash only
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(SshTaskError::InvalidStepName {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Validate connection settings before any network activity happens
pub fn validate_connection(connection: &ConnectionConfig) -> Result<()> {
    if connection.host.is_empty() {
        return Err(SshTaskError::Validation(
            "Connection host cannot be empty".to_string(),
        ));
    }

    if connection.username.is_empty() {
        return Err(SshTaskError::Validation(
            "Connection username cannot be empty".to_string(),
        ));
    }

    if connection.ready_timeout == 0 {
        return Err(SshTaskError::Validation(
            "ready_timeout must be at least 1 second".to_string(),
        ));
    }

    match &connection.auth {
        AuthMethod::Password {
            password,
            password_env,
        } => {
            if password.is_none() && password_env.is_none() {
                return Err(SshTaskError::Validation(
                    "Password auth requires 'password' or 'password_env'".to_string(),
                ));
            }
        }
        AuthMethod::Key { key_path, .. } => {
            if key_path.is_empty() {
                return Err(SshTaskError::Validation(
                    "Key auth requires a non-empty 'key_path'".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validate one step's action configuration
fn validate_step_action(step_name: &str, action: &StepAction) -> Result<()> {
    match action {
        StepAction::Exec(exec) => {
            if exec.commands.is_empty() {
                return Err(SshTaskError::Validation(format!(
                    "Step '{}' has no commands",
                    step_name
                )));
            }
            for command in &exec.commands {
                if command.len() > MAX_COMMAND_LEN {
                    return Err(SshTaskError::CommandTooLong {
                        limit: MAX_COMMAND_LEN,
                    });
                }
                if command.trim().is_empty() {
                    return Err(SshTaskError::Validation(format!(
                        "Step '{}' contains an empty command",
                        step_name
                    )));
                }
            }
        }
        StepAction::Script(script) => {
            if script.script_path.is_empty() {
                return Err(SshTaskError::Validation(format!(
                    "Step '{}' has an empty script_path",
                    step_name
                )));
            }
        }
        StepAction::Copy(copy) => {
            if copy.sources.is_empty() {
                return Err(SshTaskError::Validation(format!(
                    "Step '{}' has no sources",
                    step_name
                )));
            }
            if copy.target_folder.is_empty() {
                return Err(SshTaskError::Validation(format!(
                    "Step '{}' has an empty target_folder",
                    step_name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml(steps: &str) -> String {
        format!(
            r#"
name: test-task
connection:
  host: app.example.com
  username: deploy
  auth:
    method: key
    key_path: ~/.ssh/id_rsa
steps:
{}"#,
            steps
        )
    }

    #[test]
    fn test_parse_simple_task() {
        let yaml = minimal_yaml(
            r#"
  - name: uptime
    type: exec
    commands: ["uptime"]
"#,
        );
        let task = parse_task_yaml(&yaml).unwrap();
        assert_eq!(task.name, "test-task");
        assert_eq!(task.steps.len(), 1);
        assert_eq!(task.steps[0].name, "uptime");
    }

    #[test]
    fn test_file_size_limit() {
        let large_yaml = "name: test\n".to_string() + &"# padding\n".repeat(120_000);
        let result = parse_task_yaml(&large_yaml);
        assert!(matches!(
            result,
            Err(SshTaskError::TaskFileSizeExceeded(_))
        ));
    }

    #[test]
    fn test_empty_steps_rejected() {
        let yaml = r#"
name: test
connection:
  host: app.example.com
  username: deploy
  auth:
    method: key
    key_path: ~/.ssh/id_rsa
steps: []
"#;
        let result = parse_task_yaml(yaml);
        assert!(matches!(result, Err(SshTaskError::Validation(_))));
    }

    #[test]
    fn test_step_name_validation() {
        assert!(validate_step_name("step1").is_ok());
        assert!(validate_step_name("step_1").is_ok());
        assert!(validate_step_name("step-1").is_ok());

        assert!(matches!(
            validate_step_name("step 1"),
            Err(SshTaskError::InvalidStepName { .. })
        ));
        assert!(matches!(
            validate_step_name("step@1"),
            Err(SshTaskError::InvalidStepName { .. })
        ));
        assert!(matches!(
            validate_step_name("a".repeat(65).as_str()),
            Err(SshTaskError::InvalidStepName { .. })
        ));
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let yaml = minimal_yaml(
            r#"
  - name: same
    type: exec
    commands: ["uptime"]
  - name: same
    type: exec
    commands: ["date"]
"#,
        );
        let result = parse_task_yaml(&yaml);
        assert!(
            matches!(result, Err(SshTaskError::Validation(msg)) if msg.contains("Duplicate step name"))
        );
    }

    #[test]
    fn test_password_auth_requires_a_source() {
        let yaml = r#"
name: test
connection:
  host: app.example.com
  username: deploy
  auth:
    method: password
steps:
  - name: uptime
    type: exec
    commands: ["uptime"]
"#;
        let result = parse_task_yaml(yaml);
        assert!(matches!(result, Err(SshTaskError::Validation(_))));
    }

    #[test]
    fn test_command_length_limit() {
        let yaml = minimal_yaml(&format!(
            r#"
  - name: big
    type: exec
    commands: ["{}"]
"#,
            "x".repeat(MAX_COMMAND_LEN + 1)
        ));
        let result = parse_task_yaml(&yaml);
        assert!(matches!(result, Err(SshTaskError::CommandTooLong { .. })));
    }

    #[test]
    fn test_empty_host_rejected() {
        let yaml = r#"
name: test
connection:
  host: ""
  username: deploy
  auth:
    method: key
    key_path: ~/.ssh/id_rsa
steps:
  - name: uptime
    type: exec
    commands: ["uptime"]
"#;
        let result = parse_task_yaml(yaml);
        assert!(matches!(result, Err(SshTaskError::Validation(_))));
    }

    #[test]
    fn test_copy_step_validation() {
        let yaml = minimal_yaml(
            r#"
  - name: publish
    type: copy
    sources: []
    target_folder: /var/www
"#,
        );
        let result = parse_task_yaml(&yaml);
        assert!(
            matches!(result, Err(SshTaskError::Validation(msg)) if msg.contains("no sources"))
        );
    }

    #[test]
    fn test_script_step_parses() {
        let yaml = minimal_yaml(
            r#"
  - name: setup
    type: script
    script_path: ./scripts/setup.sh
    args: ["--fast"]
"#,
        );
        let task = parse_task_yaml(&yaml).unwrap();
        match &task.steps[0].action {
            StepAction::Script(script) => {
                assert_eq!(script.script_path, "./scripts/setup.sh");
                assert_eq!(script.args, vec!["--fast"]);
            }
            _ => panic!("Expected script step"),
        }
    }
}
