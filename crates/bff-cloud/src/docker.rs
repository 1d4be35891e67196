use std::path::Path;
use std::time::Duration;

use bff_core::{CommandExecutor, EngineConfig, ExecError, Invocation, RealExecutor};

const NO_SUCH_IMAGE_HINTS: &[&str] = &["No such image", "image not known"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    AlreadyRunning,
    /// Started by us; ready after this many readiness checks.
    Started { attempts: u32 },
}

/// Container engine operations, parameterized over the executor for testability.
pub struct DockerClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// True when `docker info` can reach the daemon.
    pub async fn engine_ready(&self) -> bool {
        match self.executor.exec(&docker(["info"])).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "container engine not ready");
                false
            }
        }
    }

    /// Make sure the engine answers, starting it if needed.
    ///
    /// After the configured start command, readiness is polled up to
    /// `max_attempts` times with exponential backoff capped at
    /// `max_backoff_ms`.
    pub async fn ensure_engine(&self, config: &EngineConfig) -> Result<EngineStatus, DockerError> {
        if self.engine_ready().await {
            return Ok(EngineStatus::AlreadyRunning);
        }

        if let Some(start) = &config.start {
            let invocation = Invocation::from_command_line(start)
                .map_err(|e| DockerError::EngineStart { source: e })?;
            tracing::info!(command = %invocation, "starting container engine");
            self.executor
                .exec_streaming(&invocation)
                .await
                .map_err(|e| DockerError::EngineStart { source: e })?;
        }

        let max_backoff = Duration::from_millis(config.max_backoff_ms);
        let mut delay = Duration::from_millis(config.initial_backoff_ms);
        for attempt in 1..=config.max_attempts {
            if self.engine_ready().await {
                return Ok(EngineStatus::Started { attempts: attempt });
            }
            if attempt < config.max_attempts {
                let delay_ms = delay.as_millis() as u64;
                tracing::debug!(attempt, delay_ms, "engine not ready yet");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_backoff);
            }
        }

        Err(DockerError::EngineUnavailable {
            attempts: config.max_attempts,
        })
    }

    /// Run the configured stop command. Returns `false` when there is none.
    pub async fn stop_engine(&self, config: &EngineConfig) -> Result<bool, DockerError> {
        let Some(stop) = &config.stop else {
            return Ok(false);
        };
        let invocation = Invocation::from_command_line(stop)
            .map_err(|e| DockerError::EngineStop { source: e })?;
        tracing::info!(command = %invocation, "stopping container engine");
        self.executor
            .exec_streaming(&invocation)
            .await
            .map_err(|e| DockerError::EngineStop { source: e })?;
        Ok(true)
    }

    pub async fn build(&self, image: &str, context: &Path) -> Result<(), DockerError> {
        self.executor
            .exec_streaming(&docker(["build", "-t", image, "."]).current_dir(context))
            .await
            .map_err(|e| DockerError::Build {
                image: image.to_owned(),
                source: e,
            })
    }

    pub async fn push(&self, image: &str) -> Result<(), DockerError> {
        self.executor
            .exec_streaming(&docker(["push", image]))
            .await
            .map_err(|e| DockerError::Push {
                image: image.to_owned(),
                source: e,
            })
    }

    /// Registry digest of a pushed image (`sha256:...`), if docker knows one.
    pub async fn digest(&self, image: &str) -> Result<Option<String>, DockerError> {
        let output = self
            .executor
            .exec(&docker([
                "image",
                "inspect",
                "--format",
                "{{index .RepoDigests 0}}",
                image,
            ]))
            .await
            .map_err(|e| DockerError::Inspect {
                image: image.to_owned(),
                source: e,
            })?;

        Ok(parse_digest(&output))
    }

    /// Force-remove every container created from `image`, running or not.
    /// Returns how many were removed.
    pub async fn remove_containers(&self, image: &str) -> Result<usize, DockerError> {
        let filter = format!("ancestor={image}");
        let output = self
            .executor
            .exec(&docker(["ps", "--all", "--quiet", "--filter", &filter]))
            .await
            .map_err(|e| DockerError::Containers { source: e })?;

        let ids: Vec<&str> = output.split_whitespace().collect();
        if ids.is_empty() {
            return Ok(0);
        }

        self.executor
            .exec(&docker(["rm", "--force"]).args(ids.iter().copied()))
            .await
            .map_err(|e| DockerError::Containers { source: e })?;
        Ok(ids.len())
    }

    /// Force-remove the local image. Returns `false` when it was not present.
    pub async fn remove_image(&self, image: &str) -> Result<bool, DockerError> {
        match self.executor.exec(&docker(["rmi", "--force", image])).await {
            Ok(_) => Ok(true),
            Err(e) if NO_SUCH_IMAGE_HINTS.iter().any(|h| e.stderr().contains(h)) => Ok(false),
            Err(e) => Err(DockerError::RemoveImage {
                image: image.to_owned(),
                source: e,
            }),
        }
    }
}

fn docker<const N: usize>(a: [&str; N]) -> Invocation {
    Invocation::new("docker").args(a)
}

/// `gcr.io/p/app@sha256:abc` -> `sha256:abc`
fn parse_digest(repo_digest: &str) -> Option<String> {
    repo_digest
        .trim()
        .rsplit_once('@')
        .map(|(_, digest)| digest.to_owned())
        .filter(|d| d.starts_with("sha256:"))
}

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("failed to start the container engine")]
    EngineStart { source: ExecError },

    #[error("container engine did not become ready after {attempts} attempts")]
    EngineUnavailable { attempts: u32 },

    #[error("docker build of {image} failed")]
    Build { image: String, source: ExecError },

    #[error("docker push of {image} failed")]
    Push { image: String, source: ExecError },

    #[error("failed to inspect {image}")]
    Inspect { image: String, source: ExecError },

    #[error("failed to stop the container engine")]
    EngineStop { source: ExecError },

    #[error("failed to remove containers")]
    Containers { source: ExecError },

    #[error("failed to remove image {image}")]
    RemoveImage { image: String, source: ExecError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_digest_extracts_sha() {
        assert_eq!(
            parse_digest("gcr.io/acme/demo-app@sha256:0123abcd\n").as_deref(),
            Some("sha256:0123abcd")
        );
    }

    #[test]
    fn parse_digest_rejects_unpushed_image() {
        assert_eq!(parse_digest("<no value>"), None);
        assert_eq!(parse_digest(""), None);
    }
}
