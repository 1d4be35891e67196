use std::path::Path;

use bff_core::{CommandExecutor, ExecError, Invocation, ProjectIdentity, RealExecutor};

/// stderr fragments gcloud prints when credentials are missing or stale.
const AUTH_HINTS: &[&str] = &[
    "gcloud auth login",
    "gcloud auth application-default login",
    "Reauthentication failed",
    "invalid_grant",
    "UNAUTHENTICATED",
    "You do not currently have an active account selected",
];

/// stderr fragments for a resource that does not exist.
const NOT_FOUND_HINTS: &[&str] = &["NOT_FOUND", "not found", "does not exist"];

/// Options for `gcloud run deploy`.
#[derive(Debug, Clone, Default)]
pub struct ServiceDeploy<'a> {
    pub image: &'a str,
    pub region: &'a str,
    pub port: u16,
    pub allow_unauthenticated: bool,
    /// Passed through verbatim after the managed flags.
    pub extra_args: &'a [String],
}

/// GCP operations client, parameterized over the executor for testability.
pub struct GcloudClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl GcloudClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for GcloudClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> GcloudClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Auth ──

    /// Fails with [`GcloudError::Auth`] unless gcloud can mint an access token.
    pub async fn check_auth(&self) -> Result<(), GcloudError> {
        self.executor
            .exec(&args(["auth", "print-access-token", "--quiet"]))
            .await
            .map_err(|e| GcloudError::Auth { source: e })?;
        Ok(())
    }

    // ── Service account ──

    pub async fn service_account_exists(
        &self,
        identity: &ProjectIdentity,
    ) -> Result<bool, GcloudError> {
        let email = identity.service_account_email();
        match self
            .executor
            .exec(&args([
                "iam",
                "service-accounts",
                "describe",
                &email,
                "--project",
                identity.gcp_project_id(),
            ]))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(classify("describe service account", e)),
        }
    }

    /// Create the project's service account unless it exists.
    /// Returns whether it was created.
    pub async fn ensure_service_account(
        &self,
        identity: &ProjectIdentity,
    ) -> Result<bool, GcloudError> {
        if self.service_account_exists(identity).await? {
            return Ok(false);
        }

        let display_name = format!("{} Service Account", identity.name());
        self.executor
            .exec(&args([
                "iam",
                "service-accounts",
                "create",
                &identity.service_account_id(),
                "--display-name",
                &display_name,
                "--project",
                identity.gcp_project_id(),
            ]))
            .await
            .map_err(|e| classify("create service account", e))?;

        Ok(true)
    }

    /// Delete the service account. Returns `false` when it was already gone.
    pub async fn delete_service_account(
        &self,
        identity: &ProjectIdentity,
    ) -> Result<bool, GcloudError> {
        let email = identity.service_account_email();
        match self
            .executor
            .exec(&args([
                "iam",
                "service-accounts",
                "delete",
                &email,
                "--project",
                identity.gcp_project_id(),
                "--quiet",
            ]))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(classify("delete service account", e)),
        }
    }

    // ── IAM ──

    /// Roles currently bound to the service account in the project policy.
    pub async fn bound_roles(
        &self,
        identity: &ProjectIdentity,
    ) -> Result<Vec<String>, GcloudError> {
        let filter = format!(
            "bindings.members:serviceAccount:{}",
            identity.service_account_email()
        );
        let output = self
            .executor
            .exec(&args([
                "projects",
                "get-iam-policy",
                identity.gcp_project_id(),
                "--flatten",
                "bindings[].members",
                "--filter",
                &filter,
                "--format",
                "value(bindings.role)",
            ]))
            .await
            .map_err(|e| classify("read IAM policy", e))?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    pub async fn add_role_binding(
        &self,
        identity: &ProjectIdentity,
        role: &str,
    ) -> Result<(), GcloudError> {
        self.role_binding("add-iam-policy-binding", identity, role)
            .await
            .map_err(|e| classify("add IAM binding", e))
    }

    pub async fn remove_role_binding(
        &self,
        identity: &ProjectIdentity,
        role: &str,
    ) -> Result<(), GcloudError> {
        self.role_binding("remove-iam-policy-binding", identity, role)
            .await
            .map_err(|e| classify("remove IAM binding", e))
    }

    /// Bind every role in `roles` that is not bound yet.
    /// Returns the roles that were added.
    pub async fn bind_roles(
        &self,
        identity: &ProjectIdentity,
        roles: &[&str],
    ) -> Result<Vec<String>, GcloudError> {
        let bound = self.bound_roles(identity).await?;
        let mut added = Vec::new();
        for role in roles {
            if bound.iter().any(|b| b == role) {
                tracing::debug!(role, "role already bound");
                continue;
            }
            self.add_role_binding(identity, role).await?;
            added.push((*role).to_owned());
        }
        Ok(added)
    }

    async fn role_binding(
        &self,
        verb: &str,
        identity: &ProjectIdentity,
        role: &str,
    ) -> Result<(), ExecError> {
        let member = format!("serviceAccount:{}", identity.service_account_email());
        self.executor
            .exec(&args([
                "projects",
                verb,
                identity.gcp_project_id(),
                "--member",
                &member,
                "--role",
                role,
                "--condition",
                "None",
                "--quiet",
            ]))
            .await?;
        Ok(())
    }

    // ── Keys ──

    /// Create a new JSON key for the service account at `path`.
    pub async fn create_key(
        &self,
        identity: &ProjectIdentity,
        path: &Path,
    ) -> Result<(), GcloudError> {
        let email = identity.service_account_email();
        let path = path.to_string_lossy();
        self.executor
            .exec(&args([
                "iam",
                "service-accounts",
                "keys",
                "create",
                &path,
                "--iam-account",
                &email,
                "--project",
                identity.gcp_project_id(),
            ]))
            .await
            .map_err(|e| classify("create service account key", e))?;
        Ok(())
    }

    // ── Cloud Run ──

    /// Deploy the service and return its URL.
    pub async fn deploy_service(
        &self,
        identity: &ProjectIdentity,
        deploy: &ServiceDeploy<'_>,
    ) -> Result<String, GcloudError> {
        let port = deploy.port.to_string();
        let auth_flag = if deploy.allow_unauthenticated {
            "--allow-unauthenticated"
        } else {
            "--no-allow-unauthenticated"
        };

        let invocation = args([
            "run",
            "deploy",
            identity.name(),
            "--image",
            deploy.image,
            "--region",
            deploy.region,
            "--platform",
            "managed",
            "--project",
            identity.gcp_project_id(),
            "--port",
            &port,
            auth_flag,
            "--quiet",
            "--format",
            "value(status.url)",
        ])
        .args(deploy.extra_args.iter().cloned());

        let output = self
            .executor
            .exec(&invocation)
            .await
            .map_err(|e| classify("deploy Cloud Run service", e))?;

        Ok(output.trim().to_owned())
    }

    /// Delete the Cloud Run service. Returns `false` when it did not exist.
    pub async fn delete_service(
        &self,
        identity: &ProjectIdentity,
        region: &str,
    ) -> Result<bool, GcloudError> {
        match self
            .executor
            .exec(&args([
                "run",
                "services",
                "delete",
                identity.name(),
                "--region",
                region,
                "--project",
                identity.gcp_project_id(),
                "--quiet",
            ]))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(classify("delete Cloud Run service", e)),
        }
    }
}

// ── Helpers ──

fn args<const N: usize>(a: [&str; N]) -> Invocation {
    Invocation::new("gcloud").args(a)
}

fn is_not_found(e: &ExecError) -> bool {
    let stderr = e.stderr();
    NOT_FOUND_HINTS.iter().any(|hint| stderr.contains(hint))
}

/// Credential failures become [`GcloudError::Auth`] whatever the command was.
fn classify(action: &'static str, source: ExecError) -> GcloudError {
    let stderr = source.stderr();
    if AUTH_HINTS.iter().any(|hint| stderr.contains(hint)) {
        GcloudError::Auth { source }
    } else {
        GcloudError::Command { action, source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GcloudError {
    #[error("gcloud is not authenticated; run `gcloud auth login`")]
    Auth { source: ExecError },

    #[error("failed to {action}")]
    Command {
        action: &'static str,
        source: ExecError,
    },
}

impl GcloudError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
