use std::path::Path;

use bff_core::{OperationKind, StateStore};

use crate::LifecycleError;
use crate::status::read_state;

/// Persisted value of `key`, `None` when not yet initialized.
pub fn get(root: &Path, key: &str) -> Result<Option<String>, LifecycleError> {
    Ok(read_state(root)?.config_value(key)?)
}

pub fn list(root: &Path) -> Result<Vec<(&'static str, String)>, LifecycleError> {
    Ok(read_state(root)?.config_entries())
}

/// Change one deployment target field under the state lock.
pub fn set(root: &Path, key: &str, value: &str) -> Result<(), LifecycleError> {
    let store = StateStore::new(root);
    let lock = store.lock()?;
    let mut state = store.load()?;

    let previous = state.config_value(key)?;
    state.set_config_value(key, value)?;
    tracing::info!(key, value, "config updated");

    state.log_operation(
        OperationKind::ConfigChanged,
        [
            ("key", key.to_owned()),
            ("old", previous.unwrap_or_default()),
            ("new", value.to_owned()),
        ],
    );
    store.save(&state, &lock)?;
    Ok(())
}

/// Split `KEY=VALUE`.
pub fn parse_assignment(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bff_core::{DeploymentMode, DeploymentTarget, ProjectIdentity, ProjectState};

    fn initialized(root: &Path) {
        let store = StateStore::new(root);
        let lock = store.lock().unwrap();
        let state = ProjectState {
            identity: Some(ProjectIdentity::new("demo-app", "gcr.io", "acme").unwrap()),
            target: Some(DeploymentTarget {
                region: "europe-west4".to_owned(),
                gcp_project_id: "acme".to_owned(),
                mode: DeploymentMode::Local,
            }),
            ..ProjectState::default()
        };
        store.save(&state, &lock).unwrap();
    }

    #[test]
    fn assignment_parsing() {
        assert_eq!(parse_assignment("region=us-east1"), Some(("region", "us-east1")));
        assert_eq!(parse_assignment(" mode = admin "), Some(("mode", "admin")));
        assert_eq!(parse_assignment("region"), None);
        assert_eq!(parse_assignment("=x"), None);
    }

    #[test]
    fn set_persists_and_logs_change() {
        let tmp = tempfile::TempDir::new().unwrap();
        initialized(tmp.path());

        set(tmp.path(), "region", "us-east1").unwrap();

        assert_eq!(get(tmp.path(), "region").unwrap().as_deref(), Some("us-east1"));
        let state = read_state(tmp.path()).unwrap();
        let change = state
            .operations_of(OperationKind::ConfigChanged)
            .next()
            .unwrap();
        assert_eq!(change.details["old"], "europe-west4");
        assert_eq!(change.details["new"], "us-east1");
        assert!(!StateStore::new(tmp.path()).lock_path().exists());
    }

    #[test]
    fn name_cannot_be_set() {
        let tmp = tempfile::TempDir::new().unwrap();
        initialized(tmp.path());

        let err = set(tmp.path(), "name", "other").unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Core(bff_core::Error::ReadOnlyConfigKey(_))
        ));
        assert_eq!(list(tmp.path()).unwrap()[0], ("name", "demo-app".to_owned()));
    }
}
