//! Manual service account management for admins.
//!
//! Provisioning already creates the account and binds [`DEFAULT_ROLES`];
//! these operations repair or narrow that setup by hand.

use std::path::Path;

use bff_cloud::{DEFAULT_ROLES, GcloudClient, GcloudError};
use bff_core::{CommandExecutor, OperationKind, ProjectIdentity, ProvisioningStage, StateStore};

use crate::LifecycleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountAction {
    Create,
    Delete,
    /// Empty means [`DEFAULT_ROLES`].
    AddPermissions(Vec<String>),
    /// Empty means [`DEFAULT_ROLES`].
    RemovePermissions(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    Created { email: String },
    AlreadyExists { email: String },
    Deleted { email: String },
    AlreadyGone { email: String },
    PermissionsAdded { roles: Vec<String> },
    PermissionsRemoved { roles: Vec<String> },
}

pub async fn service_account<E: CommandExecutor>(
    executor: &E,
    root: &Path,
    action: AccountAction,
) -> Result<AccountOutcome, LifecycleError> {
    let store = StateStore::new(root);
    let lock = store.lock()?;
    let mut state = store.load()?;
    let identity = state.identity()?.clone();
    let email = identity.service_account_email();

    let gcloud = GcloudClient::with_executor(executor);
    gcloud.check_auth().await.map_err(account_error)?;

    let outcome = match action {
        AccountAction::Create => {
            if gcloud
                .ensure_service_account(&identity)
                .await
                .map_err(account_error)?
            {
                state.log_operation(OperationKind::AccountCreated, [("email", email.clone())]);
                if state.stage < ProvisioningStage::AccountCreated {
                    state.advance(ProvisioningStage::AccountCreated)?;
                }
                AccountOutcome::Created { email }
            } else {
                AccountOutcome::AlreadyExists { email }
            }
        }
        AccountAction::Delete => {
            if gcloud
                .delete_service_account(&identity)
                .await
                .map_err(account_error)?
            {
                state.log_operation(OperationKind::AccountDeleted, [("email", email.clone())]);
                AccountOutcome::Deleted { email }
            } else {
                AccountOutcome::AlreadyGone { email }
            }
        }
        AccountAction::AddPermissions(roles) => {
            let roles = role_names(&roles);
            let requested: Vec<&str> = roles.iter().map(String::as_str).collect();
            let added = gcloud
                .bind_roles(&identity, &requested)
                .await
                .map_err(account_error)?;
            if !added.is_empty() {
                state.log_operation(OperationKind::PermissionsAdded, [("roles", added.join(","))]);
            }
            AccountOutcome::PermissionsAdded { roles: added }
        }
        AccountAction::RemovePermissions(roles) => {
            let removed = unbind_roles(&gcloud, &identity, &role_names(&roles)).await?;
            if !removed.is_empty() {
                state.log_operation(
                    OperationKind::PermissionsRemoved,
                    [("roles", removed.join(","))],
                );
            }
            AccountOutcome::PermissionsRemoved { roles: removed }
        }
    };

    tracing::info!(?outcome, "service account updated");
    store.save(&state, &lock)?;
    Ok(outcome)
}

/// Remove the bindings in `roles` that are present. Returns the removed ones.
async fn unbind_roles<E: CommandExecutor>(
    gcloud: &GcloudClient<E>,
    identity: &ProjectIdentity,
    roles: &[String],
) -> Result<Vec<String>, LifecycleError> {
    let bound = gcloud.bound_roles(identity).await.map_err(account_error)?;
    let mut removed = Vec::new();
    for role in roles {
        if !bound.contains(role) {
            tracing::debug!(%role, "role not bound");
            continue;
        }
        gcloud
            .remove_role_binding(identity, role)
            .await
            .map_err(account_error)?;
        removed.push(role.clone());
    }
    Ok(removed)
}

/// Fully qualified role names; `run.admin` becomes `roles/run.admin`.
pub fn role_names(roles: &[String]) -> Vec<String> {
    if roles.is_empty() {
        return DEFAULT_ROLES.iter().map(|r| (*r).to_owned()).collect();
    }
    roles
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(|r| {
            if r.starts_with("roles/") || r.starts_with("projects/") {
                r.to_owned()
            } else {
                format!("roles/{r}")
            }
        })
        .collect()
}

fn account_error(source: GcloudError) -> LifecycleError {
    LifecycleError::ServiceAccount { source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_role_list_means_defaults() {
        assert_eq!(role_names(&[]).len(), DEFAULT_ROLES.len());
    }

    #[test]
    fn short_role_names_are_qualified() {
        let roles = vec![
            "run.admin".to_owned(),
            "roles/storage.admin".to_owned(),
            "projects/acme/roles/custom".to_owned(),
        ];
        assert_eq!(
            role_names(&roles),
            ["roles/run.admin", "roles/storage.admin", "projects/acme/roles/custom"]
        );
    }
}
