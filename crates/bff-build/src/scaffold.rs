use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use bff_core::{BackendConfig, CommandExecutor, ExecError, FrontendConfig, Invocation};

pub const ENV_FILE: &str = ".env";
const PACKAGE_JSON: &str = "package.json";
const NODE_MODULES: &str = "node_modules";

/// stderr fragments that point at the network rather than the tool.
const NETWORK_HINTS: &[&str] = &[
    "ENOTFOUND",
    "ETIMEDOUT",
    "ECONNRESET",
    "ECONNREFUSED",
    "EAI_AGAIN",
    "network",
    "Failed to fetch",
    "failed to download",
    "Connection refused",
    "timed out",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    EnvFile,
    FrontendDir,
    FrontendGenerator,
    FrontendInstall,
    FrontendBuild,
    BackendInstall,
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EnvFile => ".env file",
            Self::FrontendDir => "frontend directory",
            Self::FrontendGenerator => "frontend generator",
            Self::FrontendInstall => "frontend dependency install",
            Self::FrontendBuild => "frontend build",
            Self::BackendInstall => "backend dependency install",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Skipped(&'static str),
}

#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub steps: Vec<(BootstrapStep, StepStatus)>,
}

impl BootstrapReport {
    pub fn status(&self, step: BootstrapStep) -> Option<&StepStatus> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, st)| st)
    }

    fn push(&mut self, step: BootstrapStep, status: StepStatus) {
        tracing::debug!(%step, ?status, "bootstrap step");
        self.steps.push((step, status));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    pub skip_frontend: bool,
    pub skip_frontend_build: bool,
    pub skip_backend: bool,
}

/// Materializes local development state: `.env`, the frontend scaffold,
/// and installed dependencies. Every step checks before it creates.
pub struct Bootstrapper<'a, E: CommandExecutor> {
    executor: &'a E,
    root: &'a Path,
    frontend: &'a FrontendConfig,
    backend: &'a BackendConfig,
}

impl<'a, E: CommandExecutor> Bootstrapper<'a, E> {
    pub fn new(
        executor: &'a E,
        root: &'a Path,
        frontend: &'a FrontendConfig,
        backend: &'a BackendConfig,
    ) -> Self {
        Self {
            executor,
            root,
            frontend,
            backend,
        }
    }

    pub fn frontend_dir(&self) -> PathBuf {
        self.root.join(&self.frontend.dir)
    }

    /// Run all steps in order, stopping at the first failure.
    pub async fn run(&self, options: BootstrapOptions) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport::default();

        let env_status = ensure_env_file(self.root, self.backend.port)?;
        report.push(BootstrapStep::EnvFile, env_status);

        if options.skip_frontend {
            report.push(BootstrapStep::FrontendDir, StepStatus::Skipped("--skip-frontend"));
        } else {
            self.frontend_steps(options, &mut report).await?;
        }

        if options.skip_backend {
            report.push(BootstrapStep::BackendInstall, StepStatus::Skipped("--skip-backend"));
        } else {
            let invocation = Invocation::from_command_line(&self.backend.install)
                .map_err(|e| step_error(BootstrapStep::BackendInstall, e))?
                .current_dir(self.root);
            self.executor
                .exec_streaming(&invocation)
                .await
                .map_err(|e| step_error(BootstrapStep::BackendInstall, e))?;
            report.push(BootstrapStep::BackendInstall, StepStatus::Done);
        }

        Ok(report)
    }

    async fn frontend_steps(
        &self,
        options: BootstrapOptions,
        report: &mut BootstrapReport,
    ) -> Result<(), BootstrapError> {
        let dir = self.frontend_dir();

        if dir.is_dir() {
            report.push(BootstrapStep::FrontendDir, StepStatus::Skipped("already exists"));
        } else {
            std::fs::create_dir_all(&dir).map_err(|e| BootstrapError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
            report.push(BootstrapStep::FrontendDir, StepStatus::Done);
        }

        if dir.join(PACKAGE_JSON).exists() {
            report.push(
                BootstrapStep::FrontendGenerator,
                StepStatus::Skipped("package.json present"),
            );
        } else {
            self.run_in(&dir, BootstrapStep::FrontendGenerator, &self.frontend.generator)
                .await?;
            report.push(BootstrapStep::FrontendGenerator, StepStatus::Done);
        }

        if dir.join(NODE_MODULES).is_dir() {
            report.push(
                BootstrapStep::FrontendInstall,
                StepStatus::Skipped("node_modules present"),
            );
        } else {
            self.run_in(&dir, BootstrapStep::FrontendInstall, &self.frontend.install)
                .await?;
            report.push(BootstrapStep::FrontendInstall, StepStatus::Done);
        }

        if options.skip_frontend_build {
            report.push(
                BootstrapStep::FrontendBuild,
                StepStatus::Skipped("--skip-frontend-build"),
            );
        } else {
            self.run_in(&dir, BootstrapStep::FrontendBuild, &self.frontend.build)
                .await?;
            report.push(BootstrapStep::FrontendBuild, StepStatus::Done);
        }

        Ok(())
    }

    async fn run_in(
        &self,
        dir: &Path,
        step: BootstrapStep,
        command: &[String],
    ) -> Result<(), BootstrapError> {
        let invocation = Invocation::from_command_line(command)
            .map_err(|e| step_error(step, e))?
            .current_dir(dir);
        self.executor
            .exec_streaming(&invocation)
            .await
            .map_err(|e| step_error(step, e))
    }
}

/// Create `.env` with a `PORT` line, or append `PORT` to an existing file
/// that lacks it.
pub fn ensure_env_file(root: &Path, port: u16) -> Result<StepStatus, BootstrapError> {
    let path = root.join(ENV_FILE);
    let env_err = |e| BootstrapError::EnvFile {
        path: path.clone(),
        source: e,
    };

    if !path.exists() {
        let content = format!("# Local settings for the backend process\nPORT={port}\n");
        std::fs::write(&path, content).map_err(env_err)?;
        return Ok(StepStatus::Done);
    }

    let mut has_port = false;
    let entries = dotenvy::from_path_iter(&path).map_err(|e| BootstrapError::EnvParse {
        path: path.clone(),
        source: e,
    })?;
    for entry in entries {
        let (key, _) = entry.map_err(|e| BootstrapError::EnvParse {
            path: path.clone(),
            source: e,
        })?;
        if key == "PORT" {
            has_port = true;
        }
    }

    if has_port {
        return Ok(StepStatus::Skipped("already exists"));
    }

    let existing = std::fs::read_to_string(&path).map_err(env_err)?;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .map_err(env_err)?;
    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{separator}PORT={port}").map_err(env_err)?;
    Ok(StepStatus::Done)
}

fn step_error(step: BootstrapStep, source: ExecError) -> BootstrapError {
    match step {
        BootstrapStep::FrontendInstall | BootstrapStep::BackendInstall => {
            BootstrapError::DependencyInstall { step, source }
        }
        _ => BootstrapError::Scaffold { step, source },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to create {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    EnvFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    EnvParse {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("{step} failed")]
    Scaffold {
        step: BootstrapStep,
        source: ExecError,
    },

    #[error("{step} failed")]
    DependencyInstall {
        step: BootstrapStep,
        source: ExecError,
    },
}

impl BootstrapError {
    /// The step that failed, when the failure came from an external tool.
    pub fn step(&self) -> Option<BootstrapStep> {
        match self {
            Self::Scaffold { step, .. } | Self::DependencyInstall { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Dependency install failures whose output looks like a network problem;
    /// these are usually worth retrying as is.
    pub fn is_network_failure(&self) -> bool {
        match self {
            Self::DependencyInstall { source, .. } => {
                let stderr = source.stderr();
                NETWORK_HINTS.iter().any(|hint| stderr.contains(hint))
            }
            _ => false,
        }
    }
}
