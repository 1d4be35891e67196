use std::path::Path;

use bff_cloud::{GcloudClient, ProvisionReport, Provisioner, ServiceDeploy};
use bff_core::{
    BffConfig, CommandExecutor, DeploymentOutcome, DeploymentRecord, OperationKind, ProjectState,
    ProvisioningStage, StateStore,
};
use chrono::Utc;

use crate::LifecycleError;

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Region for this deploy only; the persisted target is unchanged.
    pub region: Option<String>,
    /// Passed through to `gcloud run deploy`.
    pub extra_args: Vec<String>,
}

#[derive(Debug)]
pub struct DeployResult {
    pub url: String,
    pub record: DeploymentRecord,
    pub provision: ProvisionReport,
}

/// Rebuild and push the image, then roll it out to Cloud Run. Every attempt
/// that gets past the preconditions is appended to the deployment log.
pub async fn deploy<E: CommandExecutor>(
    executor: &E,
    root: &Path,
    options: &DeployOptions,
) -> Result<DeployResult, LifecycleError> {
    let config = BffConfig::load(root)?;
    let store = StateStore::new(root);
    let lock = store.lock()?;
    let mut state = store.load()?;

    let identity = state.identity()?.clone();
    let region = match &options.region {
        Some(region) => region.clone(),
        None => state.target()?.region.clone(),
    };
    if state.stage != ProvisioningStage::Provisioned {
        return Err(LifecycleError::NotProvisioned { stage: state.stage });
    }

    let provisioner = Provisioner::new(executor, root, &config.engine, &store, &lock);
    let attempt = roll_out(executor, &provisioner, &config, &mut state, &region, options).await;

    let (outcome, digest) = match &attempt {
        Ok((url, report)) => (
            DeploymentOutcome::Success { url: url.clone() },
            report.image.digest.clone(),
        ),
        Err(e) => (
            DeploymentOutcome::Failure {
                message: error_chain(e),
            },
            None,
        ),
    };
    let record = DeploymentRecord {
        timestamp: Utc::now(),
        image: identity.image_reference(),
        digest,
        region: region.clone(),
        outcome,
    };
    state.record_deployment(record.clone());

    let mut details = vec![("region", region)];
    match &record.outcome {
        DeploymentOutcome::Success { url } => details.push(("url", url.clone())),
        DeploymentOutcome::Failure { message } => details.push(("error", message.clone())),
    }
    state.log_operation(OperationKind::Deploy, details);
    store.save(&state, &lock)?;

    let (url, provision) = attempt?;
    Ok(DeployResult {
        url,
        record,
        provision,
    })
}

async fn roll_out<E: CommandExecutor>(
    executor: &E,
    provisioner: &Provisioner<'_, E>,
    config: &BffConfig,
    state: &mut ProjectState,
    region: &str,
    options: &DeployOptions,
) -> Result<(String, ProvisionReport), LifecycleError> {
    let report = provisioner.provision(state).await?;

    let identity = state.identity()?;
    let url = GcloudClient::with_executor(executor)
        .deploy_service(
            identity,
            &ServiceDeploy {
                image: &report.image.reference,
                region,
                port: config.cloud_run.port,
                allow_unauthenticated: config.cloud_run.allow_unauthenticated,
                extra_args: &options.extra_args,
            },
        )
        .await
        .map_err(|e| LifecycleError::Deploy { source: e })?;

    Ok((url, report))
}

/// `outer: inner: innermost`
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
