//! Persisted project state: provisioning stage, deployment log, and the
//! exclusive lock that guards writers.
//!
//! Everything lives under `.bff/` in the project root:
//!
//! ```text
//! .bff/state.json   ProjectState, rewritten atomically (tmp + rename)
//! .bff/state.lock   present while init/deploy/clean/config --set run
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProjectIdentity;

pub const STATE_DIR: &str = ".bff";
const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";

/// Cloud provisioning progress. Variants are ordered; state only moves
/// forward except through [`ProjectState::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningStage {
    #[default]
    Unprovisioned,
    AccountCreated,
    BindingsApplied,
    SecretPublished,
    ImagePushed,
    Provisioned,
}

impl ProvisioningStage {
    pub const ALL: [ProvisioningStage; 6] = [
        Self::Unprovisioned,
        Self::AccountCreated,
        Self::BindingsApplied,
        Self::SecretPublished,
        Self::ImagePushed,
        Self::Provisioned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unprovisioned => "unprovisioned",
            Self::AccountCreated => "account-created",
            Self::BindingsApplied => "bindings-applied",
            Self::SecretPublished => "secret-published",
            Self::ImagePushed => "image-pushed",
            Self::Provisioned => "provisioned",
        }
    }
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Local,
    Admin,
}

impl DeploymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "admin" | "cloud" => Ok(Self::Admin),
            _ => Err(crate::Error::InvalidMode(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub region: String,
    pub gcp_project_id: String,
    pub mode: DeploymentMode,
}

/// Name and options the templates were rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderMarker {
    pub name: String,
    #[serde(default)]
    pub ci_activated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeploymentOutcome {
    Success { url: String },
    Failure { message: String },
}

impl DeploymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub timestamp: DateTime<Utc>,
    pub image: String,
    #[serde(default)]
    pub digest: Option<String>,
    pub region: String,
    pub outcome: DeploymentOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Init,
    AccountCreated,
    BindingsApplied,
    KeyPublished,
    ImagePushed,
    Deploy,
    Clean,
    ConfigChanged,
    PermissionsAdded,
    PermissionsRemoved,
    AccountDeleted,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::AccountCreated => "account_created",
            Self::BindingsApplied => "bindings_applied",
            Self::KeyPublished => "key_published",
            Self::ImagePushed => "image_pushed",
            Self::Deploy => "deploy",
            Self::Clean => "clean",
            Self::ConfigChanged => "config_changed",
            Self::PermissionsAdded => "permissions_added",
            Self::PermissionsRemoved => "permissions_removed",
            Self::AccountDeleted => "account_deleted",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// Contents of `.bff/state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub identity: Option<ProjectIdentity>,
    #[serde(default)]
    pub target: Option<DeploymentTarget>,
    #[serde(default)]
    pub stage: ProvisioningStage,
    #[serde(default)]
    pub rendered: Option<RenderMarker>,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub deployments: Vec<DeploymentRecord>,
    #[serde(default)]
    pub operations: Vec<OperationRecord>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            identity: None,
            target: None,
            stage: ProvisioningStage::Unprovisioned,
            rendered: None,
            initialized: false,
            deployments: Vec::new(),
            operations: Vec::new(),
        }
    }
}

impl ProjectState {
    /// Move to `to`. Re-entering the current stage is a no-op.
    pub fn advance(&mut self, to: ProvisioningStage) -> crate::Result<()> {
        if to < self.stage {
            return Err(crate::Error::StageRegression {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }

    /// Forget all provisioning progress. Logs are kept, and so is the
    /// render marker: the rendered files stay on disk until the project
    /// directory itself is removed.
    pub fn reset(&mut self) {
        self.stage = ProvisioningStage::Unprovisioned;
        self.initialized = false;
    }

    pub fn identity(&self) -> crate::Result<&ProjectIdentity> {
        self.identity.as_ref().ok_or(crate::Error::NotInitialized)
    }

    pub fn target(&self) -> crate::Result<&DeploymentTarget> {
        self.target.as_ref().ok_or(crate::Error::NotInitialized)
    }

    pub fn log_operation<I, K, V>(&mut self, operation: OperationKind, details: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.operations.push(OperationRecord {
            timestamp: Utc::now(),
            operation,
            details: details
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
    }

    pub fn record_deployment(&mut self, record: DeploymentRecord) {
        self.deployments.push(record);
    }

    pub fn latest_deployment(&self) -> Option<&DeploymentRecord> {
        self.deployments.last()
    }

    pub fn history(&self) -> History<'_> {
        History {
            records: &self.deployments,
        }
    }

    pub fn operations_of(&self, kind: OperationKind) -> impl Iterator<Item = &OperationRecord> {
        self.operations.iter().filter(move |op| op.operation == kind)
    }

    // ── Config keys exposed through `bff config` ──

    pub fn config_value(&self, key: &str) -> crate::Result<Option<String>> {
        let target = self.target.as_ref();
        Ok(match key {
            "name" => self.identity.as_ref().map(|i| i.name().to_owned()),
            "region" => target.map(|t| t.region.clone()),
            "gcp_project_id" => target.map(|t| t.gcp_project_id.clone()),
            "mode" => target.map(|t| t.mode.to_string()),
            other => return Err(crate::Error::UnknownConfigKey(other.to_owned())),
        })
    }

    pub fn config_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(identity) = &self.identity {
            entries.push(("name", identity.name().to_owned()));
        }
        if let Some(target) = &self.target {
            entries.push(("region", target.region.clone()));
            entries.push(("gcp_project_id", target.gcp_project_id.clone()));
            entries.push(("mode", target.mode.to_string()));
        }
        entries
    }

    pub fn set_config_value(&mut self, key: &str, value: &str) -> crate::Result<()> {
        if key == "name" {
            return Err(crate::Error::ReadOnlyConfigKey(key.to_owned()));
        }
        let target = self.target.as_mut().ok_or(crate::Error::NotInitialized)?;
        match key {
            "region" => target.region = value.to_owned(),
            "gcp_project_id" => {
                target.gcp_project_id = value.to_owned();
                self.identity = self
                    .identity
                    .as_ref()
                    .map(|identity| identity.with_gcp_project_id(value));
            }
            "mode" => target.mode = value.parse()?,
            other => return Err(crate::Error::UnknownConfigKey(other.to_owned())),
        }
        Ok(())
    }
}

/// Deployment records, most recent first.
///
/// Iteration borrows the underlying log and can be restarted any number
/// of times.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    records: &'a [DeploymentRecord],
}

impl<'a> History<'a> {
    pub fn iter(&self) -> std::iter::Rev<std::slice::Iter<'a, DeploymentRecord>> {
        self.records.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for History<'a> {
    type Item = &'a DeploymentRecord;
    type IntoIter = std::iter::Rev<std::slice::Iter<'a, DeploymentRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Reads and writes `.bff/state.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            dir: project_root.join(STATE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Load the state file, or a fresh state if none exists yet.
    pub fn load(&self) -> crate::Result<ProjectState> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(ProjectState::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| crate::Error::StateRead {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| crate::Error::StateParse { path, source: e })
    }

    /// Persist `state`. Requires the writer lock; the file is replaced
    /// atomically so readers never observe a partial write.
    pub fn save(&self, state: &ProjectState, _lock: &StateLock) -> crate::Result<()> {
        let path = self.state_path();
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        let write_err = |source| crate::Error::StateWrite {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(state).map_err(|e| crate::Error::StateParse {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &path).map_err(write_err)?;

        tracing::debug!(path = %path.display(), stage = %state.stage, "state saved");
        Ok(())
    }

    /// Take the exclusive writer lock, failing fast when it is held.
    pub fn lock(&self) -> crate::Result<StateLock> {
        let path = self.lock_path();
        std::fs::create_dir_all(&self.dir).map_err(|e| crate::Error::LockIo {
            path: path.clone(),
            source: e,
        })?;

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(crate::Error::ConcurrentOperation { path });
            }
            Err(e) => return Err(crate::Error::LockIo { path, source: e }),
        };

        writeln!(file, "{}", std::process::id()).map_err(|e| crate::Error::LockIo {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), "state lock acquired");
        Ok(StateLock { path })
    }
}

/// Held while a command may write state. Removes the lock file on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "state lock released"),
            // `clean` may have removed the whole project directory.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let path = self.path.display();
                tracing::warn!(path = %path, error = %e, "failed to release state lock")
            }
        }
    }
}
