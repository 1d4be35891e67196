//! External collaborators of the cloud side (`gcloud`, `docker`, `gh`) and
//! the [`Provisioner`] that sequences them.

pub mod docker;
pub mod gcloud;
pub mod github;
pub mod provision;

pub use docker::{DockerClient, DockerError, EngineStatus};
pub use gcloud::{GcloudClient, GcloudError, ServiceDeploy};
pub use github::{GithubClient, GithubError};
pub use provision::{
    DEFAULT_ROLES, ProvisionError, ProvisionReport, ProvisionStep, Provisioner, PushedImage,
};
