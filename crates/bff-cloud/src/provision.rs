//! The provisioning state machine.
//!
//! ```text
//! Unprovisioned ─► AccountCreated ─► BindingsApplied ─► SecretPublished
//!               ─► ImagePushed ─► Provisioned
//! ```
//!
//! Each step checks the remote side before it creates, so re-running after
//! a failure picks up where the previous run stopped. State is saved after
//! every completed step, never before.

use std::fmt;
use std::path::{Path, PathBuf};

use bff_core::{
    CommandExecutor, EngineConfig, OperationKind, ProjectIdentity, ProjectState,
    ProvisioningStage, StateLock, StateStore,
};
use secrecy::SecretBox;

use crate::docker::{DockerClient, DockerError, EngineStatus};
use crate::gcloud::{GcloudClient, GcloudError};
use crate::github::{GithubClient, GithubError};

/// Roles bound to the project service account.
pub const DEFAULT_ROLES: &[&str] = &[
    "roles/run.admin",
    "roles/iam.serviceAccountUser",
    "roles/storage.admin",
    "roles/artifactregistry.admin",
    "roles/run.developer",
];

const KEY_FILE: &str = "sa-key.json";
const KEY_DIR_PREFIX: &str = "key-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Auth,
    ServiceAccount,
    Bindings,
    SecretPublish,
    Engine,
    ImageBuild,
    ImagePush,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auth => "gcloud authentication check",
            Self::ServiceAccount => "service account creation",
            Self::Bindings => "IAM role binding",
            Self::SecretPublish => "CI secret publication",
            Self::Engine => "container engine start",
            Self::ImageBuild => "image build",
            Self::ImagePush => "image push",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedImage {
    pub reference: String,
    pub digest: Option<String>,
}

#[derive(Debug)]
pub struct ProvisionReport {
    pub account_created: bool,
    pub roles_added: Vec<String>,
    pub key_published: bool,
    pub engine: EngineStatus,
    pub image: PushedImage,
}

/// Drives a project from its persisted stage to `Provisioned`.
pub struct Provisioner<'a, E: CommandExecutor> {
    executor: &'a E,
    root: &'a Path,
    engine: &'a EngineConfig,
    store: &'a StateStore,
    lock: &'a StateLock,
}

impl<'a, E: CommandExecutor> Provisioner<'a, E> {
    pub fn new(
        executor: &'a E,
        root: &'a Path,
        engine: &'a EngineConfig,
        store: &'a StateStore,
        lock: &'a StateLock,
    ) -> Self {
        Self {
            executor,
            root,
            engine,
            store,
            lock,
        }
    }

    /// Run every step. The account and bindings are re-checked on each run,
    /// the key is published once per service account, and the image is
    /// rebuilt and pushed every time.
    pub async fn provision(
        &self,
        state: &mut ProjectState,
    ) -> Result<ProvisionReport, ProvisionError> {
        let identity = state.identity()?.clone();
        let gcloud = GcloudClient::with_executor(self.executor);

        self.sweep_stale_keys()?;

        gcloud
            .check_auth()
            .await
            .map_err(gcloud_error(ProvisionStep::Auth))?;

        // ── Service account ──
        let account_created = gcloud
            .ensure_service_account(&identity)
            .await
            .map_err(gcloud_error(ProvisionStep::ServiceAccount))?;
        if account_created {
            tracing::info!(email = %identity.service_account_email(), "service account created");
            state.log_operation(
                OperationKind::AccountCreated,
                [("email", identity.service_account_email())],
            );
        } else {
            let email = identity.service_account_email();
            tracing::info!(email = %email, "service account already exists");
        }
        self.complete(state, ProvisioningStage::AccountCreated)?;

        // ── Bindings ──
        let roles_added = gcloud
            .bind_roles(&identity, DEFAULT_ROLES)
            .await
            .map_err(gcloud_error(ProvisionStep::Bindings))?;
        if !roles_added.is_empty() {
            tracing::info!(roles = %roles_added.join(","), "IAM roles bound");
            state.log_operation(
                OperationKind::BindingsApplied,
                [("roles", roles_added.join(","))],
            );
        }
        self.complete(state, ProvisioningStage::BindingsApplied)?;

        // ── CI secret ──
        // A re-created account has none of the old keys, so the published
        // secret is dead and must be replaced.
        let key_published =
            if account_created || state.stage < ProvisioningStage::SecretPublished {
                self.publish_key(&gcloud, &identity).await?;
                state.log_operation(
                    OperationKind::KeyPublished,
                    [("secret", identity.ci_secret_name())],
                );
                self.complete(state, ProvisioningStage::SecretPublished)?;
                true
            } else {
                tracing::info!(secret = %identity.ci_secret_name(), "CI secret already published");
                false
            };

        // ── Image ──
        let (engine, image) = self.push_image(&identity).await?;
        let mut details = vec![("image", image.reference.clone())];
        if let Some(digest) = &image.digest {
            details.push(("digest", digest.clone()));
        }
        state.log_operation(OperationKind::ImagePushed, details);
        self.complete(state, ProvisioningStage::ImagePushed)?;

        self.complete(state, ProvisioningStage::Provisioned)?;

        Ok(ProvisionReport {
            account_created,
            roles_added,
            key_published,
            engine,
            image,
        })
    }

    /// Remove key directories left behind by a run that was killed while
    /// publishing. Only called with the state lock held.
    fn sweep_stale_keys(&self) -> Result<(), ProvisionError> {
        let dir = self.store.dir();
        if !dir.is_dir() {
            return Ok(());
        }
        let entries = std::fs::read_dir(dir).map_err(|e| ProvisionError::KeyFile {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| ProvisionError::KeyFile {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            let stale = entry
                .file_name()
                .to_string_lossy()
                .starts_with(KEY_DIR_PREFIX)
                && path.is_dir();
            if stale {
                tracing::warn!(path = %path.display(), "removing stale service account key");
                std::fs::remove_dir_all(&path)
                    .map_err(|e| ProvisionError::KeyFile { path, source: e })?;
            }
        }
        Ok(())
    }

    /// Create a fresh key in a scoped directory under `.bff/`, publish it
    /// as the CI secret, and remove it. The directory is removed on every
    /// path out of this function except a killed process, which the next
    /// run sweeps up.
    async fn publish_key(
        &self,
        gcloud: &GcloudClient<&E>,
        identity: &ProjectIdentity,
    ) -> Result<(), ProvisionError> {
        std::fs::create_dir_all(self.store.dir()).map_err(|e| ProvisionError::KeyFile {
            path: self.store.dir().to_path_buf(),
            source: e,
        })?;
        let scratch = tempfile::Builder::new()
            .prefix(KEY_DIR_PREFIX)
            .tempdir_in(self.store.dir())
            .map_err(|e| ProvisionError::KeyFile {
                path: self.store.dir().to_path_buf(),
                source: e,
            })?;
        let key_path = scratch.path().join(KEY_FILE);

        gcloud
            .create_key(identity, &key_path)
            .await
            .map_err(gcloud_error(ProvisionStep::SecretPublish))?;

        let key = std::fs::read(&key_path).map_err(|e| ProvisionError::KeyFile {
            path: key_path.clone(),
            source: e,
        })?;
        let key = SecretBox::new(key.into_boxed_slice());

        let secret_name = identity.ci_secret_name();
        GithubClient::with_executor(self.executor)
            .set_secret(&secret_name, &key)
            .await
            .map_err(|e| ProvisionError::Github { source: e })?;
        tracing::info!(secret = %secret_name, "CI secret published");

        let scratch_path = scratch.path().to_path_buf();
        scratch.close().map_err(|e| ProvisionError::KeyFile {
            path: scratch_path,
            source: e,
        })?;
        Ok(())
    }

    /// Build and push the image. An engine this run had to start is
    /// stopped again afterwards, whether or not the push succeeded.
    async fn push_image(
        &self,
        identity: &ProjectIdentity,
    ) -> Result<(EngineStatus, PushedImage), ProvisionError> {
        let docker = DockerClient::with_executor(self.executor);

        let engine = docker
            .ensure_engine(self.engine)
            .await
            .map_err(docker_error(ProvisionStep::Engine))?;

        let pushed = self.build_and_push(&docker, identity).await;

        if matches!(engine, EngineStatus::Started { .. }) {
            if let Err(e) = docker.stop_engine(self.engine).await {
                tracing::warn!(error = %e, "container engine left running");
            }
        }

        Ok((engine, pushed?))
    }

    async fn build_and_push(
        &self,
        docker: &DockerClient<&E>,
        identity: &ProjectIdentity,
    ) -> Result<PushedImage, ProvisionError> {
        let reference = identity.image_reference();

        tracing::info!(image = %reference, "building image");
        docker
            .build(&reference, self.root)
            .await
            .map_err(docker_error(ProvisionStep::ImageBuild))?;

        tracing::info!(image = %reference, "pushing image");
        docker
            .push(&reference)
            .await
            .map_err(docker_error(ProvisionStep::ImagePush))?;

        let digest = match docker.digest(&reference).await {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(image = %reference, error = %e, "pushed image digest unknown");
                None
            }
        };

        Ok(PushedImage { reference, digest })
    }

    /// Record that `stage` is reached and persist. Stages already passed
    /// stay where they are.
    fn complete(
        &self,
        state: &mut ProjectState,
        stage: ProvisioningStage,
    ) -> Result<(), ProvisionError> {
        if state.stage < stage {
            state.advance(stage)?;
        }
        self.store.save(state, self.lock)?;
        Ok(())
    }
}

fn gcloud_error(step: ProvisionStep) -> impl Fn(GcloudError) -> ProvisionError {
    move |source| {
        if source.is_auth() {
            ProvisionError::CloudAuth { step, source }
        } else {
            ProvisionError::Gcloud { step, source }
        }
    }
}

fn docker_error(step: ProvisionStep) -> impl Fn(DockerError) -> ProvisionError {
    move |source| match source {
        DockerError::EngineStart { .. } | DockerError::EngineUnavailable { .. } => {
            ProvisionError::EngineUnavailable { source }
        }
        source => ProvisionError::Docker { step, source },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{step} failed: gcloud credentials are missing or expired; run `gcloud auth login`")]
    CloudAuth {
        step: ProvisionStep,
        source: GcloudError,
    },

    #[error("{step} failed")]
    Gcloud {
        step: ProvisionStep,
        source: GcloudError,
    },

    #[error("container engine is unavailable")]
    EngineUnavailable { source: DockerError },

    #[error("{step} failed")]
    Docker {
        step: ProvisionStep,
        source: DockerError,
    },

    #[error("CI secret publication failed")]
    Github { source: GithubError },

    #[error("failed to handle service account key at {path}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] bff_core::Error),
}

impl ProvisionError {
    pub fn step(&self) -> Option<ProvisionStep> {
        match self {
            Self::CloudAuth { step, .. }
            | Self::Gcloud { step, .. }
            | Self::Docker { step, .. } => Some(*step),
            Self::EngineUnavailable { .. } => Some(ProvisionStep::Engine),
            Self::Github { .. } | Self::KeyFile { .. } => Some(ProvisionStep::SecretPublish),
            Self::State(_) => None,
        }
    }
}
