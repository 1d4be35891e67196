//! Core types and configuration for bff.
//!
//! This crate defines the `bff.toml` schema ([`BffConfig`]), the project
//! identity derived from its name ([`ProjectIdentity`]), the persisted
//! provisioning state ([`StateStore`]), and the process executor every
//! external tool call goes through ([`CommandExecutor`]).

pub mod config;
pub mod error;
pub mod exec;
pub mod identity;
pub mod state;

pub use config::{
    BackendConfig, BffConfig, CloudRunConfig, EngineConfig, FrontendConfig, ProjectConfig,
    TemplatesConfig,
};
pub use error::{Error, Result};
pub use exec::{CommandExecutor, ExecError, Invocation, RealExecutor};
pub use identity::ProjectIdentity;
pub use state::{
    DeploymentMode, DeploymentOutcome, DeploymentRecord, DeploymentTarget, History,
    OperationKind, OperationRecord, ProjectState, ProvisioningStage, RenderMarker, StateLock,
    StateStore,
};
