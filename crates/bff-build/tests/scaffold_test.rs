use bff_build::scaffold::{
    BootstrapError, BootstrapOptions, BootstrapStep, Bootstrapper, StepStatus,
};
use bff_core::exec::{CommandExecutor, ExecError, Invocation};
use bff_core::{BackendConfig, FrontendConfig};
use mockall::mock;
use tempfile::TempDir;

mock! {
    Executor {}

    impl CommandExecutor for Executor {
        async fn exec(&self, invocation: &Invocation) -> Result<String, ExecError>;
        async fn exec_streaming(&self, invocation: &Invocation) -> Result<(), ExecError>;
        async fn exec_with_stdin(
            &self,
            invocation: &Invocation,
            stdin_data: &[u8],
        ) -> Result<String, ExecError>;
    }
}

fn failed(command: &str, stderr: &str) -> ExecError {
    ExecError::CommandFailed {
        command: command.to_owned(),
        stderr: stderr.to_owned(),
    }
}

#[tokio::test]
async fn fresh_project_runs_every_step() {
    let tmp = TempDir::new().unwrap();
    let frontend = FrontendConfig::default();
    let backend = BackendConfig::default();
    let frontend_dir = tmp.path().join("frontend");

    let mut mock = MockExecutor::new();
    let dir = frontend_dir.clone();
    mock.expect_exec_streaming()
        .withf(move |inv| inv.is("npm", "create") && inv.cwd.as_deref() == Some(dir.as_path()))
        .times(1)
        .returning(|_| Ok(()));
    mock.expect_exec_streaming()
        .withf(|inv| inv.is("npm", "install"))
        .times(1)
        .returning(|_| Ok(()));
    mock.expect_exec_streaming()
        .withf(|inv| inv.is("npm", "build"))
        .times(1)
        .returning(|_| Ok(()));
    let root = tmp.path().to_path_buf();
    mock.expect_exec_streaming()
        .withf(move |inv| inv.is("uv", "sync") && inv.cwd.as_deref() == Some(root.as_path()))
        .times(1)
        .returning(|_| Ok(()));

    let report = Bootstrapper::new(&mock, tmp.path(), &frontend, &backend)
        .run(BootstrapOptions::default())
        .await
        .unwrap();

    assert!(frontend_dir.is_dir());
    assert!(tmp.path().join(".env").exists());
    assert_eq!(report.status(BootstrapStep::FrontendDir), Some(&StepStatus::Done));
    assert_eq!(report.status(BootstrapStep::BackendInstall), Some(&StepStatus::Done));
}

#[tokio::test]
async fn existing_frontend_skips_generator_and_install() {
    let tmp = TempDir::new().unwrap();
    let frontend_dir = tmp.path().join("frontend");
    std::fs::create_dir_all(frontend_dir.join("node_modules")).unwrap();
    std::fs::write(frontend_dir.join("package.json"), "{}").unwrap();

    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming()
        .withf(|inv| inv.is("uv", "sync"))
        .times(1)
        .returning(|_| Ok(()));

    let report = Bootstrapper::new(
        &mock,
        tmp.path(),
        &FrontendConfig::default(),
        &BackendConfig::default(),
    )
    .run(BootstrapOptions {
        skip_frontend_build: true,
        ..BootstrapOptions::default()
    })
    .await
    .unwrap();

    assert!(matches!(
        report.status(BootstrapStep::FrontendGenerator),
        Some(StepStatus::Skipped(_))
    ));
    assert!(matches!(
        report.status(BootstrapStep::FrontendInstall),
        Some(StepStatus::Skipped(_))
    ));
    assert!(matches!(
        report.status(BootstrapStep::FrontendBuild),
        Some(StepStatus::Skipped(_))
    ));
}

#[tokio::test]
async fn generator_failure_aborts_before_backend() {
    let tmp = TempDir::new().unwrap();

    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming()
        .withf(|inv| inv.is("npm", "create"))
        .times(1)
        .returning(|_| Err(failed("npm create vite@latest", "template not found")));
    mock.expect_exec_streaming()
        .withf(|inv| inv.is("uv", "sync"))
        .never();

    let err = Bootstrapper::new(
        &mock,
        tmp.path(),
        &FrontendConfig::default(),
        &BackendConfig::default(),
    )
    .run(BootstrapOptions::default())
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        BootstrapError::Scaffold {
            step: BootstrapStep::FrontendGenerator,
            ..
        }
    ));
}

#[tokio::test]
async fn backend_network_failure_is_dependency_install_error() {
    let tmp = TempDir::new().unwrap();

    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming()
        .withf(|inv| inv.is("uv", "sync"))
        .returning(|_| Err(failed("uv sync", "error: Failed to fetch `https://pypi.org/simple/`")));

    let err = Bootstrapper::new(
        &mock,
        tmp.path(),
        &FrontendConfig::default(),
        &BackendConfig::default(),
    )
    .run(BootstrapOptions {
        skip_frontend: true,
        ..BootstrapOptions::default()
    })
    .await
    .unwrap_err();

    assert!(matches!(err, BootstrapError::DependencyInstall { .. }));
    assert!(err.is_network_failure());
    assert_eq!(err.step(), Some(BootstrapStep::BackendInstall));
}
