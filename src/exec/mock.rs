use super::{CommandOutcome, CommandSpec, ExecError, Executor, ExecutorFactory};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    exit_code: i64,
    output: String,
    delay_ms: u64,
}

/// Scripted executor for orchestration tests: commands are matched by
/// substring against registered rules and never touch a shell or daemon.
pub struct MockExecutor {
    rules: RwLock<Vec<Rule>>,
    calls: RwLock<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Commands containing `pattern` exit with `exit_code`.
    pub fn respond(&self, pattern: &str, exit_code: i64, output: &str) {
        self.rules.write().unwrap().push(Rule {
            pattern: pattern.to_string(),
            exit_code,
            output: output.to_string(),
            delay_ms: 0,
        });
    }

    pub fn fail_on(&self, pattern: &str, exit_code: i64) {
        self.respond(pattern, exit_code, "simulated failure");
    }

    /// Commands containing `pattern` succeed after sleeping, for
    /// cancellation tests.
    pub fn respond_slowly(&self, pattern: &str, delay_ms: u64) {
        self.rules.write().unwrap().push(Rule {
            pattern: pattern.to_string(),
            exit_code: 0,
            output: String::new(),
            delay_ms,
        });
    }

    /// Commands executed so far, in start order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn was_called(&self, pattern: &str) -> bool {
        self.calls
            .read()
            .unwrap()
            .iter()
            .any(|c| c.contains(pattern))
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
        self.calls.write().unwrap().push(spec.command.clone());

        let rule = self
            .rules
            .read()
            .unwrap()
            .iter()
            .find(|r| spec.command.contains(&r.pattern))
            .cloned();

        match rule {
            Some(rule) => {
                if rule.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(rule.delay_ms)).await;
                }
                Ok(CommandOutcome {
                    exit_code: rule.exit_code,
                    output: rule.output,
                })
            }
            None => Ok(CommandOutcome {
                exit_code: 0,
                output: String::new(),
            }),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Factory handing the same scripted executor to every context, with a
/// switch to simulate a missing container backend.
pub struct MockExecutorFactory {
    executor: Arc<MockExecutor>,
    container_backend: bool,
}

impl MockExecutorFactory {
    pub fn new(executor: Arc<MockExecutor>) -> Self {
        Self {
            executor,
            container_backend: true,
        }
    }

    pub fn without_container_backend(executor: Arc<MockExecutor>) -> Self {
        Self {
            executor,
            container_backend: false,
        }
    }
}

impl ExecutorFactory for MockExecutorFactory {
    fn host(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }

    fn container(&self, image: &str) -> Result<Arc<dyn Executor>, ExecError> {
        if self.container_backend {
            Ok(self.executor.clone())
        } else {
            Err(ExecError::BackendUnavailable(image.to_string()))
        }
    }
}
