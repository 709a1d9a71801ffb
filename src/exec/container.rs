use super::{CommandOutcome, CommandSpec, Executor, CACHE_MOUNT, WORKSPACE_MOUNT};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Runs each command in a freshly started container from a fixed image,
/// with the workspace bind-mounted at [`WORKSPACE_MOUNT`] and the shared
/// dependency cache volume at [`CACHE_MOUNT`]. The container is removed
/// after the command completes, regardless of outcome.
pub struct ContainerExecutor {
    docker: Docker,
    image: String,
    cache_volume: String,
}

impl ContainerExecutor {
    pub fn new(docker: Docker, image: String, cache_volume: String) -> Self {
        Self {
            docker,
            image,
            cache_volume,
        }
    }

    async fn create(&self, spec: &CommandSpec) -> Result<String> {
        let workspace = std::fs::canonicalize(&spec.workdir)
            .unwrap_or_else(|_| spec.workdir.clone())
            .display()
            .to_string();

        let host_config = HostConfig {
            binds: Some(vec![
                format!("{}:{}", workspace, WORKSPACE_MOUNT),
                format!("{}:{}", self.cache_volume, CACHE_MOUNT),
            ]),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                spec.command.clone(),
            ]),
            working_dir: Some(WORKSPACE_MOUNT.to_string()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let name = format!("gantry-{}", Uuid::new_v4());
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name,
                    platform: None,
                }),
                config,
            )
            .await
            .with_context(|| format!("Failed to create container from image '{}'", self.image))?;

        Ok(created.id)
    }

    async fn execute(&self, id: &str) -> Result<CommandOutcome> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start container")?;

        let mut wait = self
            .docker
            .wait_container(id, None::<WaitContainerOptions<String>>);

        let exit_code = match wait.next().await {
            Some(Ok(response)) => response.status_code,
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => return Err(e).context("Failed waiting for container"),
            None => bail!("Container wait stream ended without a status"),
        };

        let mut logs = self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut output = String::new();
        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(log) => output.push_str(&String::from_utf8_lossy(&log.into_bytes())),
                Err(error) => {
                    debug!(%error, "Log stream ended early");
                    break;
                }
            }
        }

        Ok(CommandOutcome { exit_code, output })
    }
}

#[async_trait]
impl Executor for ContainerExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
        let id = self.create(spec).await?;
        debug!(container = %id, image = %self.image, "Container created");

        // Scoped acquisition: once created, the container is removed on
        // every exit path.
        let result = self.execute(&id).await;

        if let Err(error) = self
            .docker
            .remove_container(
                &id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!(container = %id, %error, "Failed to remove container");
        } else {
            debug!(container = %id, "Container removed");
        }

        result
    }

    fn describe(&self) -> String {
        format!("container({})", self.image)
    }
}
