use bff_core::{
    DeploymentMode, DeploymentOutcome, DeploymentRecord, DeploymentTarget, Error, OperationKind,
    ProjectIdentity, ProjectState, ProvisioningStage, StateStore,
};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn record(minute: u32, ok: bool) -> DeploymentRecord {
    DeploymentRecord {
        timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 12, minute, 0).unwrap(),
        image: "gcr.io/acme/demo-app".to_owned(),
        digest: None,
        region: "europe-west4".to_owned(),
        outcome: if ok {
            DeploymentOutcome::Success {
                url: "https://demo-app.run.app".to_owned(),
            }
        } else {
            DeploymentOutcome::Failure {
                message: "quota".to_owned(),
            }
        },
    }
}

#[test]
fn load_returns_fresh_state_when_missing() {
    let tmp = TempDir::new().unwrap();
    let state = StateStore::new(tmp.path()).load().unwrap();
    assert_eq!(state.stage, ProvisioningStage::Unprovisioned);
    assert!(state.identity.is_none());
    assert!(!state.initialized);
}

#[test]
fn save_and_reload_round_trips() {
    let tmp = TempDir::new().unwrap();
    let store = StateStore::new(tmp.path());
    let lock = store.lock().unwrap();

    let mut state = ProjectState {
        identity: Some(ProjectIdentity::new("demo-app", "gcr.io", "acme").unwrap()),
        target: Some(DeploymentTarget {
            region: "europe-west4".to_owned(),
            gcp_project_id: "acme".to_owned(),
            mode: DeploymentMode::Admin,
        }),
        ..ProjectState::default()
    };
    state.advance(ProvisioningStage::BindingsApplied).unwrap();
    state.record_deployment(record(0, true));
    store.save(&state, &lock).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, state);
    assert!(!store.dir().join("state.json.tmp").exists());
}

#[test]
fn corrupt_state_is_reported() {
    let tmp = TempDir::new().unwrap();
    let store = StateStore::new(tmp.path());
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.state_path(), "{ nope").unwrap();

    assert!(matches!(store.load(), Err(Error::StateParse { .. })));
}

#[test]
fn second_lock_fails_with_concurrent_operation() {
    let tmp = TempDir::new().unwrap();
    let store = StateStore::new(tmp.path());

    let _held = store.lock().unwrap();
    let err = store.lock().unwrap_err();
    assert!(matches!(err, Error::ConcurrentOperation { .. }));
    assert!(!store.state_path().exists());
}

#[test]
fn lock_is_released_on_drop() {
    let tmp = TempDir::new().unwrap();
    let store = StateStore::new(tmp.path());

    {
        let lock = store.lock().unwrap();
        assert!(lock.path().exists());
    }
    assert!(!store.lock_path().exists());
    assert!(store.lock().is_ok());
}

#[test]
fn lock_drop_tolerates_removed_directory() {
    let tmp = TempDir::new().unwrap();
    let store = StateStore::new(tmp.path());
    let lock = store.lock().unwrap();
    std::fs::remove_dir_all(store.dir()).unwrap();
    drop(lock);
}

#[test]
fn history_is_most_recent_first_and_restartable() {
    let mut state = ProjectState::default();
    state.record_deployment(record(0, true));
    state.record_deployment(record(1, false));
    state.record_deployment(record(2, true));

    let history = state.history();
    let minutes: Vec<_> = history
        .iter()
        .map(|r| r.timestamp.format("%M").to_string())
        .collect();
    assert_eq!(minutes, vec!["02", "01", "00"]);

    // a second pass starts over
    assert_eq!(history.iter().count(), 3);
    assert!(!history.iter().nth(1).unwrap().outcome.is_success());
    assert_eq!(state.latest_deployment().unwrap().timestamp.format("%M").to_string(), "02");
}

#[test]
fn history_is_lazy() {
    let mut state = ProjectState::default();
    for minute in 0..50 {
        state.record_deployment(record(minute, true));
    }
    let first = state.history().into_iter().next().unwrap();
    assert_eq!(first.timestamp.format("%M").to_string(), "49");
}

#[test]
fn config_values_round_trip() {
    let mut state = ProjectState {
        identity: Some(ProjectIdentity::new("demo-app", "gcr.io", "acme").unwrap()),
        target: Some(DeploymentTarget {
            region: "europe-west4".to_owned(),
            gcp_project_id: "acme".to_owned(),
            mode: DeploymentMode::Local,
        }),
        ..ProjectState::default()
    };

    state.set_config_value("region", "us-east1").unwrap();
    state.set_config_value("mode", "admin").unwrap();

    assert_eq!(state.config_value("region").unwrap().as_deref(), Some("us-east1"));
    assert_eq!(state.config_value("mode").unwrap().as_deref(), Some("admin"));
    assert_eq!(state.config_value("name").unwrap().as_deref(), Some("demo-app"));
    assert!(matches!(
        state.set_config_value("name", "other"),
        Err(Error::ReadOnlyConfigKey(_))
    ));
    assert!(matches!(
        state.config_value("colour"),
        Err(Error::UnknownConfigKey(_))
    ));
    assert_eq!(state.config_entries().len(), 4);
}

#[test]
fn moving_gcp_project_moves_the_image() {
    let mut state = ProjectState {
        identity: Some(ProjectIdentity::new("demo-app", "gcr.io", "acme").unwrap()),
        target: Some(DeploymentTarget {
            region: "europe-west4".to_owned(),
            gcp_project_id: "acme".to_owned(),
            mode: DeploymentMode::Admin,
        }),
        ..ProjectState::default()
    };

    state.set_config_value("gcp_project_id", "acme-prod").unwrap();

    let identity = state.identity().unwrap();
    assert_eq!(identity.image_reference(), "gcr.io/acme-prod/demo-app");
    assert_eq!(
        identity.service_account_email(),
        "demo-app-sa@acme-prod.iam.gserviceaccount.com"
    );
}

#[test]
fn set_config_requires_init() {
    let mut state = ProjectState::default();
    assert!(matches!(
        state.set_config_value("region", "us-east1"),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn operations_filter_by_kind() {
    let mut state = ProjectState::default();
    state.log_operation(OperationKind::Init, [("type", "local")]);
    state.log_operation(OperationKind::KeyPublished, [("secret", "DEMO_APP")]);
    state.log_operation(OperationKind::Init, [("type", "admin")]);

    assert_eq!(state.operations_of(OperationKind::Init).count(), 2);
    assert_eq!(state.operations_of(OperationKind::KeyPublished).count(), 1);
}
