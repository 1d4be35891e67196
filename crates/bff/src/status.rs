use std::fmt;
use std::path::Path;

use bff_core::{
    DeploymentOutcome, DeploymentRecord, DeploymentTarget, OperationRecord, ProjectIdentity,
    ProjectState, ProvisioningStage, StateStore,
};

use crate::LifecycleError;

/// Operations shown by `status -v`.
pub const RECENT_OPERATIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub identity: Option<ProjectIdentity>,
    pub target: Option<DeploymentTarget>,
    pub stage: ProvisioningStage,
    pub initialized: bool,
    pub latest: Option<DeploymentRecord>,
    /// Oldest first. Empty unless requested.
    pub recent_operations: Vec<OperationRecord>,
}

/// Snapshot of the persisted state. Takes no lock and writes nothing.
pub fn status(root: &Path, verbose: bool) -> Result<StatusReport, LifecycleError> {
    let state = read_state(root)?;

    let recent_operations = if verbose {
        let skip = state.operations.len().saturating_sub(RECENT_OPERATIONS);
        state.operations[skip..].to_vec()
    } else {
        Vec::new()
    };

    Ok(StatusReport {
        latest: state.latest_deployment().cloned(),
        identity: state.identity,
        target: state.target,
        stage: state.stage,
        initialized: state.initialized,
        recent_operations,
    })
}

/// Load the state file without locking it. Used by the read-only commands.
pub fn read_state(root: &Path) -> Result<ProjectState, LifecycleError> {
    Ok(StateStore::new(root).load()?)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => {
                writeln!(f, "Project:          {identity}")?;
                writeln!(f, "Service account:  {}", identity.service_account_email())?;
                writeln!(f, "Image:            {}", identity.image_reference())?;
                writeln!(f, "CI secret:        {}", identity.ci_secret_name())?;
            }
            None => writeln!(f, "Project:          (not initialized)")?,
        }
        if let Some(target) = &self.target {
            writeln!(f, "GCP project:      {}", target.gcp_project_id)?;
            writeln!(f, "Region:           {}", target.region)?;
            writeln!(f, "Mode:             {}", target.mode)?;
        }
        writeln!(f, "Stage:            {}", self.stage)?;

        match &self.latest {
            Some(record) => {
                let at = record.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
                write!(f, "Last deployment:  {at} ")?;
                match &record.outcome {
                    DeploymentOutcome::Success { url } => writeln!(f, "ok {url}")?,
                    DeploymentOutcome::Failure { message } => writeln!(f, "failed: {message}")?,
                }
            }
            None => writeln!(f, "Last deployment:  none")?,
        }

        if !self.recent_operations.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recent operations:")?;
            for op in &self.recent_operations {
                write!(
                    f,
                    "  {}  {}",
                    op.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    op.operation
                )?;
                for (key, value) in &op.details {
                    write!(f, " {key}={value}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
