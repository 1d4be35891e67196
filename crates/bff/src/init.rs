use std::io::Write;
use std::path::Path;

use bff_build::{
    BootstrapOptions, BootstrapReport, Bootstrapper, DockerfileGenerator, RenderReport,
    TemplateRenderer, TemplateSet,
};
use bff_cloud::{ProvisionReport, Provisioner};
use bff_core::identity::name_from_dir;
use bff_core::state::STATE_DIR;
use bff_core::{
    BffConfig, CommandExecutor, DeploymentMode, DeploymentTarget, OperationKind, ProjectIdentity,
    ProjectState, RenderMarker, StateStore,
};

use crate::LifecycleError;

const GITIGNORE: &str = ".gitignore";

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Provision cloud resources after the local setup.
    pub admin: bool,
    pub name: Option<String>,
    pub region: Option<String>,
    pub gcp_project_id: Option<String>,
    /// Leave the frontend directory, generator, install and build alone.
    pub skip_frontend: bool,
    pub skip_frontend_build: bool,
    pub skip_backend: bool,
}

#[derive(Debug)]
pub struct InitOutcome {
    pub identity: ProjectIdentity,
    pub target: DeploymentTarget,
    /// `None` when the render marker showed nothing left to render.
    pub render: Option<RenderReport>,
    pub bootstrap: BootstrapReport,
    pub dockerfile_written: bool,
    pub provision: Option<ProvisionReport>,
}

/// Render templates, bootstrap the local environment, and in admin mode
/// provision the cloud side.
pub async fn init<E: CommandExecutor>(
    executor: &E,
    root: &Path,
    options: &InitOptions,
) -> Result<InitOutcome, LifecycleError> {
    let config = BffConfig::load(root)?;
    let store = StateStore::new(root);
    let lock = store.lock()?;
    let mut state = store.load()?;

    let identity = resolve_identity(root, &config, &state, options)?;
    let target = resolve_target(&config, &state, &identity, options);
    check_render_marker(&state, &identity)?;

    state.identity = Some(identity.clone());
    state.target = Some(target.clone());

    // ── Templates ──
    let render = render_templates(root, &config, &mut state, &identity, options.admin)?;
    store.save(&state, &lock)?;

    // ── Local environment ──
    let bootstrap = Bootstrapper::new(executor, root, &config.frontend, &config.backend)
        .run(BootstrapOptions {
            skip_frontend: options.skip_frontend,
            skip_frontend_build: options.skip_frontend_build,
            skip_backend: options.skip_backend,
        })
        .await?;

    let dockerfile_written =
        DockerfileGenerator::new(&config.frontend, config.cloud_run.port).write_if_missing(root)?;
    if dockerfile_written {
        tracing::info!("Dockerfile generated");
    }

    ensure_gitignored(root)?;

    state.initialized = true;
    state.log_operation(
        OperationKind::Init,
        [
            ("type", target.mode.to_string()),
            ("name", identity.name().to_owned()),
        ],
    );
    store.save(&state, &lock)?;

    // ── Cloud ──
    let provision = if target.mode == DeploymentMode::Admin {
        let report = Provisioner::new(executor, root, &config.engine, &store, &lock)
            .provision(&mut state)
            .await?;
        Some(report)
    } else {
        None
    };

    Ok(InitOutcome {
        identity,
        target,
        render,
        bootstrap,
        dockerfile_written,
        provision,
    })
}

/// Name precedence: `--name`, the persisted identity, bff.toml, the
/// directory name.
fn resolve_identity(
    root: &Path,
    config: &BffConfig,
    state: &ProjectState,
    options: &InitOptions,
) -> Result<ProjectIdentity, LifecycleError> {
    let name = match (&options.name, &state.identity, &config.project.name) {
        (Some(name), _, _) => name.clone(),
        (None, Some(identity), _) => identity.name().to_owned(),
        (None, None, Some(name)) => name.clone(),
        (None, None, None) => name_from_dir(root)?,
    };

    let gcp_project_id = options
        .gcp_project_id
        .clone()
        .or_else(|| state.target.as_ref().map(|t| t.gcp_project_id.clone()))
        .or_else(|| config.project.gcp_project_id.clone())
        .ok_or(bff_core::Error::MissingGcpProject)?;

    Ok(ProjectIdentity::new(
        &name,
        &config.project.registry,
        &gcp_project_id,
    )?)
}

fn resolve_target(
    config: &BffConfig,
    state: &ProjectState,
    identity: &ProjectIdentity,
    options: &InitOptions,
) -> DeploymentTarget {
    let previous = state.target.as_ref();
    let region = options
        .region
        .clone()
        .or_else(|| previous.map(|t| t.region.clone()))
        .unwrap_or_else(|| config.project.region.clone());
    let mode = if options.admin {
        DeploymentMode::Admin
    } else {
        previous.map(|t| t.mode).unwrap_or_default()
    };

    DeploymentTarget {
        region,
        gcp_project_id: identity.gcp_project_id().to_owned(),
        mode,
    }
}

fn check_render_marker(
    state: &ProjectState,
    identity: &ProjectIdentity,
) -> Result<(), LifecycleError> {
    match &state.rendered {
        Some(marker) if marker.name != identity.name() => Err(LifecycleError::NameMismatch {
            rendered: marker.name.clone(),
            requested: identity.name().to_owned(),
        }),
        _ => Ok(()),
    }
}

fn render_templates(
    root: &Path,
    config: &BffConfig,
    state: &mut ProjectState,
    identity: &ProjectIdentity,
    activate_ci: bool,
) -> Result<Option<RenderReport>, LifecycleError> {
    let renderer = TemplateRenderer::new(root);

    let set = match &state.rendered {
        None => TemplateSet::for_project(&config.templates, identity, activate_ci),
        Some(marker) if activate_ci && !marker.ci_activated => {
            TemplateSet::ci_activation(&config.templates)
        }
        Some(_) => {
            tracing::info!("templates already rendered");
            return Ok(None);
        }
    };

    let report = renderer.render(&set)?;
    let ci_activated = activate_ci || state.rendered.as_ref().is_some_and(|m| m.ci_activated);
    state.rendered = Some(RenderMarker {
        name: identity.name().to_owned(),
        ci_activated,
    });
    Ok(Some(report))
}

/// Append `.bff/` to `.gitignore` unless an entry for it is present.
fn ensure_gitignored(root: &Path) -> Result<(), LifecycleError> {
    let path = root.join(GITIGNORE);
    let io_err = |e| LifecycleError::Gitignore {
        path: path.clone(),
        source: e,
    };

    let existing = if path.exists() {
        std::fs::read_to_string(&path).map_err(io_err)?
    } else {
        String::new()
    };

    let entry = format!("{STATE_DIR}/");
    let present = existing
        .lines()
        .map(str::trim)
        .any(|l| l == entry || l == STATE_DIR || l == format!("/{entry}"));
    if present {
        return Ok(());
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{separator}{entry}").map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gitignore_created_with_state_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        ensure_gitignored(tmp.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join(GITIGNORE)).unwrap(),
            ".bff/\n"
        );
    }

    #[test]
    fn gitignore_entry_added_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(GITIGNORE), "node_modules").unwrap();

        ensure_gitignored(tmp.path()).unwrap();
        ensure_gitignored(tmp.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join(GITIGNORE)).unwrap(),
            "node_modules\n.bff/\n"
        );
    }

    #[test]
    fn marker_for_other_name_is_refused() {
        let state = ProjectState {
            rendered: Some(RenderMarker {
                name: "old-name".to_owned(),
                ci_activated: false,
            }),
            ..ProjectState::default()
        };
        let identity = ProjectIdentity::new("new-name", "gcr.io", "p").unwrap();
        assert!(matches!(
            check_render_marker(&state, &identity),
            Err(LifecycleError::NameMismatch { .. })
        ));
    }

    #[test]
    fn explicit_name_wins_over_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = BffConfig::default();
        config.project.name = Some("from-config".to_owned());
        let options = InitOptions {
            name: Some("from-flag".to_owned()),
            gcp_project_id: Some("acme".to_owned()),
            ..InitOptions::default()
        };

        let identity =
            resolve_identity(tmp.path(), &config, &ProjectState::default(), &options).unwrap();
        assert_eq!(identity.name(), "from-flag");
    }

    #[test]
    fn missing_gcp_project_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let options = InitOptions {
            name: Some("demo-app".to_owned()),
            ..InitOptions::default()
        };
        let err = resolve_identity(
            tmp.path(),
            &BffConfig::default(),
            &ProjectState::default(),
            &options,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Core(bff_core::Error::MissingGcpProject)
        ));
    }
}
