//! Local project setup for bff.
//!
//! # `bff init`, local half
//!
//! ```text
//!   1. Templates   ── TemplateRenderer: placeholder tokens → project identifiers
//!   2. .env        ── created with PORT, or PORT appended
//!   3. Frontend    ── mkdir → generator (no package.json) → install → build
//!   4. Backend     ── uv sync
//!   5. Dockerfile  ── DockerfileGenerator, only when the project has none
//! ```
//!
//! # Rendering guarantees
//!
//! - Tokens are matched whole: `bff-template` never matches inside
//!   `bff-template-service-name`.
//! - A token that is no longer present is a warning, not an error, so a
//!   second render pass leaves files byte-identical.
//! - All template files are checked before the first write.

pub mod dockerfile;
pub mod scaffold;
pub mod template;

pub use dockerfile::{DockerfileError, DockerfileGenerator};
pub use scaffold::{
    BootstrapError, BootstrapOptions, BootstrapReport, BootstrapStep, Bootstrapper, StepStatus,
};
pub use template::{
    FileStatus, Placeholder, RenderReport, TemplateError, TemplateRenderer, TemplateSet,
};
