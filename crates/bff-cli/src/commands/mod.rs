mod clean;
mod config;
mod deploy;
mod history;
mod init;
mod service_account;
mod status;

use std::io::Write;
use std::path::PathBuf;

pub use clean::clean;
pub use config::{config_get, config_list, config_set};
pub use deploy::deploy;
pub use history::history;
pub use init::init;
pub use service_account::{
    service_account_add_permissions, service_account_create, service_account_delete,
    service_account_remove_permissions,
};
pub use status::status;

/// Absolute project root. `clean` deletes it, and the default project name
/// comes from its last component, so `.` is not good enough.
pub(crate) fn project_root() -> anyhow::Result<PathBuf> {
    let root = std::env::current_dir()?;
    tracing::debug!(root = %root.display(), "project root");
    Ok(root)
}

/// Attach a retry hint for failures the user can fix by waiting or
/// logging in again.
pub(crate) fn with_hint(err: bff::LifecycleError) -> anyhow::Error {
    if let Some(hint) = retry_hint(&err) {
        eprintln!("hint: {hint}");
    }
    err.into()
}

fn retry_hint(err: &bff::LifecycleError) -> Option<&'static str> {
    if err.is_network_failure() {
        Some("a dependency download failed on the network; check the connection and retry")
    } else if err.is_cloud_auth() {
        Some("run `gcloud auth login` and retry; completed steps are not repeated")
    } else {
        None
    }
}

/// `[y/N]`-style question answered with the literal `yes`.
pub(crate) fn confirm_yes(question: &str) -> anyhow::Result<bool> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let answer = bff::confirm::ask_yes(stdin.lock(), &mut stdout, question)?;
    stdout.flush()?;
    Ok(answer)
}
