use std::fmt;
use std::path::Path;

use bff_cloud::{DockerClient, GcloudClient, GithubClient};
use bff_core::{
    BffConfig, CommandExecutor, Invocation, OperationKind, ProjectState, ProvisioningStage,
    StateStore,
};

use crate::deploy::error_chain;
use crate::error::CleanStepError;
use crate::LifecycleError;

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Keep the local working directory.
    pub skip_local: bool,
    /// Clone the template repository into the emptied directory.
    pub fresh_template: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanStep {
    CloudRunService,
    ServiceAccount,
    GithubRepository,
    Containers,
    LocalImage,
    LocalDirectory,
    FreshTemplate,
}

impl CleanStep {
    fn is_remote(self) -> bool {
        matches!(
            self,
            Self::CloudRunService | Self::ServiceAccount | Self::GithubRepository
        )
    }
}

impl fmt::Display for CleanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CloudRunService => "Cloud Run service",
            Self::ServiceAccount => "service account",
            Self::GithubRepository => "GitHub repository",
            Self::Containers => "local containers",
            Self::LocalImage => "local image",
            Self::LocalDirectory => "local directory",
            Self::FreshTemplate => "fresh template",
        })
    }
}

#[derive(Debug)]
pub enum StepResult {
    Done(String),
    Skipped(&'static str),
    Failed(CleanStepError),
}

#[derive(Debug, Default)]
pub struct CleanReport {
    pub steps: Vec<(CleanStep, StepResult)>,
    /// Provisioning state went back to `Unprovisioned`.
    pub state_reset: bool,
}

impl CleanReport {
    pub fn failures(&self) -> impl Iterator<Item = (CleanStep, &CleanStepError)> {
        self.steps.iter().filter_map(|(step, result)| match result {
            StepResult::Failed(e) => Some((*step, e)),
            _ => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    fn remote_failed(&self) -> bool {
        self.failures().any(|(step, _)| step.is_remote())
    }

    fn record(&mut self, step: CleanStep, result: Result<StepResult, CleanStepError>) {
        let result = result.unwrap_or_else(StepResult::Failed);
        match &result {
            StepResult::Failed(e) => {
                tracing::warn!(%step, error = %error_chain(e), "clean step failed")
            }
            StepResult::Done(detail) => tracing::info!(%step, %detail, "done"),
            StepResult::Skipped(reason) => tracing::debug!(%step, %reason, "skipped"),
        }
        self.steps.push((step, result));
    }
}

/// Tear the project down. Every remote and container step runs even when
/// an earlier one fails; the report lists each outcome. The provisioning
/// state is reset, and the local directory removed, only when all remote
/// deletions succeeded. A fresh template checkout can then take the
/// directory's place.
///
/// Callers confirm with the user before calling this.
pub async fn clean<E: CommandExecutor>(
    executor: &E,
    root: &Path,
    options: CleanOptions,
) -> Result<CleanReport, LifecycleError> {
    let config = BffConfig::load(root)?;
    let store = StateStore::new(root);
    let lock = store.lock()?;
    let mut state = store.load()?;
    let identity = state.identity()?.clone();

    let mut report = CleanReport::default();
    let gcloud = GcloudClient::with_executor(executor);
    let github = GithubClient::with_executor(executor);
    let docker = DockerClient::with_executor(executor);

    // ── Remote ──
    let regions = cloud_run_regions(&state);
    if regions.is_empty() {
        report.record(CleanStep::CloudRunService, Ok(StepResult::Skipped("never deployed")));
    }
    for region in regions {
        let what = format!("{} in {region}", identity.name());
        let result = gcloud
            .delete_service(&identity, &region)
            .await
            .map(|deleted| deleted_or_absent(deleted, &what))
            .map_err(CleanStepError::from);
        report.record(CleanStep::CloudRunService, result);
    }

    let result = if state.stage >= ProvisioningStage::AccountCreated {
        gcloud
            .delete_service_account(&identity)
            .await
            .map(|deleted| deleted_or_absent(deleted, &identity.service_account_email()))
            .map_err(CleanStepError::from)
    } else {
        Ok(StepResult::Skipped("not provisioned"))
    };
    report.record(CleanStep::ServiceAccount, result);

    report.record(CleanStep::GithubRepository, delete_repository(&github).await);

    // ── Local ──
    let image = identity.image_reference();
    let result = docker
        .remove_containers(&image)
        .await
        .map(|n| match n {
            0 => StepResult::Skipped("none present"),
            n => StepResult::Done(format!("{n} removed")),
        })
        .map_err(CleanStepError::from);
    report.record(CleanStep::Containers, result);

    let result = docker
        .remove_image(&image)
        .await
        .map(|removed| {
            if removed {
                StepResult::Done(format!("deleted {image}"))
            } else {
                StepResult::Skipped("not present")
            }
        })
        .map_err(CleanStepError::from);
    report.record(CleanStep::LocalImage, result);

    // ── State ──
    let scope = if options.skip_local { "remote" } else { "full" };
    let mut details = vec![("type", scope.to_owned())];
    if report.remote_failed() {
        let failed: Vec<String> = report
            .failures()
            .map(|(step, _)| step.to_string())
            .collect();
        details.push(("failed", failed.join(",")));
    } else {
        state.reset();
        report.state_reset = true;
    }
    state.log_operation(OperationKind::Clean, details);
    store.save(&state, &lock)?;

    if options.skip_local {
        report.record(
            CleanStep::LocalDirectory,
            Ok(StepResult::Skipped("--skip-local")),
        );
    } else if !report.state_reset {
        // the state file is all that tracks what is left to delete
        report.record(
            CleanStep::LocalDirectory,
            Ok(StepResult::Skipped("remote resources remain")),
        );
    } else {
        let result = std::fs::remove_dir_all(root)
            .map(|()| StepResult::Done(format!("deleted {}", root.display())))
            .map_err(|e| CleanStepError::LocalDir {
                path: root.to_path_buf(),
                source: e,
            });
        let removed = result.is_ok();
        report.record(CleanStep::LocalDirectory, result);

        if removed && options.fresh_template {
            let result = clone_template(executor, &config, root).await;
            report.record(CleanStep::FreshTemplate, result);
        }
    }

    Ok(report)
}

/// Every region a Cloud Run service may exist in, in first-deployed order.
/// Deploy-time `--region` overrides leave services outside the target region.
fn cloud_run_regions(state: &ProjectState) -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();
    for record in &state.deployments {
        if !regions.contains(&record.region) {
            regions.push(record.region.clone());
        }
    }
    if regions.is_empty() && state.stage >= ProvisioningStage::ImagePushed {
        regions.extend(state.target.as_ref().map(|t| t.region.clone()));
    }
    regions
}

async fn clone_template<E: CommandExecutor>(
    executor: &E,
    config: &BffConfig,
    root: &Path,
) -> Result<StepResult, CleanStepError> {
    let Some(repository) = &config.templates.repository else {
        return Ok(StepResult::Skipped("no template repository configured"));
    };
    let target = root.to_string_lossy().into_owned();
    let mut clone = Invocation::new("git").args(["clone", repository.as_str(), target.as_str()]);
    // the process working directory was just removed
    if let Some(parent) = root.parent() {
        clone = clone.current_dir(parent);
    }
    executor
        .exec_streaming(&clone)
        .await
        .map_err(|e| CleanStepError::Clone { source: e })?;
    Ok(StepResult::Done(format!("cloned {repository}")))
}

async fn delete_repository<E: CommandExecutor>(
    github: &GithubClient<E>,
) -> Result<StepResult, CleanStepError> {
    let repo = github.repo_name().await?;
    github.delete_repo(&repo).await?;
    Ok(StepResult::Done(format!("deleted {repo}")))
}

fn deleted_or_absent(deleted: bool, what: &str) -> StepResult {
    if deleted {
        StepResult::Done(format!("deleted {what}"))
    } else {
        StepResult::Skipped("already gone")
    }
}
