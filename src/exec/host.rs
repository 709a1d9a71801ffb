use super::{CommandOutcome, CommandSpec, Executor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Runs commands in the orchestrator's own process and filesystem. No
/// isolation guarantees.
pub struct HostExecutor;

impl HostExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HostExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for HostExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .current_dir(&spec.workdir)
            .output()
            .await
            .with_context(|| format!("Failed to spawn '{}'", spec.command))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1) as i64,
            output: combined,
        })
    }

    fn describe(&self) -> String {
        "host".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec(command: &str) -> CommandSpec {
        CommandSpec {
            command: command.to_string(),
            workdir: PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let executor = HostExecutor::new();
        let outcome = executor.run(&spec("echo hello")).await.unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.succeeded());
        assert!(outcome.output.contains("hello"));
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let executor = HostExecutor::new();
        let outcome = executor.run(&spec("exit 3")).await.unwrap();

        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_stderr_captured() {
        let executor = HostExecutor::new();
        let outcome = executor.run(&spec("echo oops >&2")).await.unwrap();

        assert!(outcome.output.contains("oops"));
    }

    #[tokio::test]
    async fn test_workdir_honored() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker"), "x").unwrap();

        let executor = HostExecutor::new();
        let outcome = executor
            .run(&CommandSpec {
                command: "ls".to_string(),
                workdir: temp.path().to_path_buf(),
            })
            .await
            .unwrap();

        assert!(outcome.output.contains("marker"));
    }
}
