use std::path::PathBuf;

use bff_build::{BootstrapError, DockerfileError, TemplateError};
use bff_cloud::{DockerError, GcloudError, GithubError, ProvisionError};
use bff_core::ProvisioningStage;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Core(#[from] bff_core::Error),

    #[error("template rendering failed")]
    Template(#[from] TemplateError),

    #[error("environment bootstrap failed")]
    Bootstrap(#[from] BootstrapError),

    #[error("Dockerfile generation failed")]
    Dockerfile(#[from] DockerfileError),

    #[error("cloud provisioning failed")]
    Provision(#[from] ProvisionError),

    #[error("Cloud Run deployment failed")]
    Deploy { source: GcloudError },

    #[error("service account operation failed")]
    ServiceAccount { source: GcloudError },

    #[error(
        "templates were rendered for {rendered:?}; refusing to render them again as {requested:?}"
    )]
    NameMismatch { rendered: String, requested: String },

    #[error("project is {stage}, not provisioned; run `bff init --admin` first")]
    NotProvisioned { stage: ProvisioningStage },

    #[error("failed to update {path}")]
    Gitignore {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LifecycleError {
    /// True when a dependency install failed on what looks like the network.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Self::Bootstrap(e) if e.is_network_failure())
    }

    /// True for credential failures anywhere in the cloud layer.
    pub fn is_cloud_auth(&self) -> bool {
        match self {
            Self::Provision(ProvisionError::CloudAuth { .. }) => true,
            Self::Deploy { source } | Self::ServiceAccount { source } => source.is_auth(),
            _ => false,
        }
    }
}

/// Why a single clean step did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CleanStepError {
    #[error(transparent)]
    Gcloud(#[from] GcloudError),

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error("failed to remove {path}")]
    LocalDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to clone the template repository")]
    Clone { source: bff_core::ExecError },
}
