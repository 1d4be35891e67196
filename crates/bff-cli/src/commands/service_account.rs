use bff::RealExecutor;
use bff::service_account::{AccountAction, AccountOutcome, role_names};

pub async fn service_account_create() -> anyhow::Result<()> {
    run(AccountAction::Create).await
}

pub async fn service_account_delete(skip_confirm: bool) -> anyhow::Result<()> {
    if !skip_confirm && !super::confirm_yes("Delete the project service account?")? {
        println!("Aborted.");
        return Ok(());
    }
    run(AccountAction::Delete).await
}

pub async fn service_account_add_permissions(roles: Vec<String>) -> anyhow::Result<()> {
    run(AccountAction::AddPermissions(roles)).await
}

pub async fn service_account_remove_permissions(
    roles: Vec<String>,
    skip_confirm: bool,
) -> anyhow::Result<()> {
    if !skip_confirm {
        println!("Roles to remove:");
        for role in role_names(&roles) {
            println!("  - {role}");
        }
        if !super::confirm_yes("Remove these bindings?")? {
            println!("Aborted.");
            return Ok(());
        }
    }
    run(AccountAction::RemovePermissions(roles)).await
}

async fn run(action: AccountAction) -> anyhow::Result<()> {
    let root = super::project_root()?;
    let outcome = bff::service_account::service_account(&RealExecutor, &root, action)
        .await
        .map_err(super::with_hint)?;

    match outcome {
        AccountOutcome::Created { email } => println!("Created service account {email}"),
        AccountOutcome::AlreadyExists { email } => {
            println!("Service account already exists: {email}")
        }
        AccountOutcome::Deleted { email } => println!("Deleted service account {email}"),
        AccountOutcome::AlreadyGone { email } => {
            println!("Service account does not exist: {email}")
        }
        AccountOutcome::PermissionsAdded { roles } if roles.is_empty() => {
            println!("All requested roles were already bound.")
        }
        AccountOutcome::PermissionsAdded { roles } => {
            println!("Bound roles:");
            for role in roles {
                println!("  + {role}");
            }
        }
        AccountOutcome::PermissionsRemoved { roles } if roles.is_empty() => {
            println!("None of the requested roles were bound.")
        }
        AccountOutcome::PermissionsRemoved { roles } => {
            println!("Removed roles:");
            for role in roles {
                println!("  - {role}");
            }
        }
    }
    Ok(())
}
