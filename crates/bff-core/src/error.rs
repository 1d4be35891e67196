use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Project identity ──
    #[error("invalid project name {name:?}: {reason}")]
    InvalidProjectName { name: String, reason: &'static str },

    #[error("cannot derive a project name from {path}")]
    UnnamedProjectDir { path: PathBuf },

    #[error(
        "gcp_project_id is not set; pass --gcp-project-id \
         or set [project].gcp_project_id in bff.toml"
    )]
    MissingGcpProject,

    // ── State store ──
    #[error("failed to read state file {path}")]
    StateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt")]
    StateParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write state file {path}")]
    StateWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("project has not been initialized; run `bff init` first")]
    NotInitialized,

    #[error(
        "another bff operation holds the lock at {path}; wait for it to finish, \
         or remove the file if that process is gone"
    )]
    ConcurrentOperation { path: PathBuf },

    #[error("failed to acquire lock at {path}")]
    LockIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("provisioning state cannot move back from {from} to {to}")]
    StageRegression {
        from: crate::ProvisioningStage,
        to: crate::ProvisioningStage,
    },

    #[error("unknown config key {0:?}, expected one of: name, region, gcp_project_id, mode")]
    UnknownConfigKey(String),

    #[error("config key {0:?} is read-only")]
    ReadOnlyConfigKey(String),

    #[error("invalid deployment mode {0:?}, expected \"local\" or \"admin\"")]
    InvalidMode(String),
}
