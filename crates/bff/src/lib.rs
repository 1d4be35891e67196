//! Scaffold Backend-For-Frontend projects and provision them on Google
//! Cloud Run.
//!
//! This crate holds the lifecycle commands (`init`, `deploy`, `status`,
//! `history`, `clean`, `config`, `service-account`) and re-exports the
//! bff sub-crates they are built from.
//!
//! | Module | Crate | Description |
//! |--------|-------|-------------|
//! | root | `bff-core` | Configuration, project identity, state store, command executor |
//! | [`build`] | `bff-build` | Template rendering, environment bootstrap, Dockerfile |
//! | [`cloud`] | `bff-cloud` | gcloud, docker and gh clients, provisioning state machine |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use bff::{RealExecutor, init::{init, InitOptions}};
//!
//! # async fn run() -> Result<(), bff::LifecycleError> {
//! let options = InitOptions {
//!     name: Some("demo-app".to_owned()),
//!     gcp_project_id: Some("my-gcp".to_owned()),
//!     ..InitOptions::default()
//! };
//! let outcome = init(&RealExecutor, Path::new("."), &options).await?;
//! println!("initialized {}", outcome.identity);
//! # Ok(())
//! # }
//! ```

mod error;

pub mod clean;
pub mod config;
pub mod confirm;
pub mod deploy;
pub mod init;
pub mod service_account;
pub mod status;

pub use error::{CleanStepError, LifecycleError};

// Core types flattened into root namespace for convenience.
pub use bff_core::*;

/// Template rendering, environment bootstrap, and Dockerfile generation.
pub mod build {
    pub use bff_build::*;
}

/// gcloud, docker and gh clients, and the provisioning state machine.
pub mod cloud {
    pub use bff_cloud::*;
}
