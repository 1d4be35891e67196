use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Longest accepted name; keeps `<name>-sa` inside the 30 character
/// service account limit.
pub const MAX_NAME_LEN: usize = 26;

/// Identifiers derived from a single project name.
///
/// Every derived field is a pure function of `name` (and, for the image,
/// of the registry and GCP project it is pushed to).
///
/// # Examples
///
/// ```
/// use bff_core::ProjectIdentity;
///
/// let id = ProjectIdentity::new("demo-app", "gcr.io", "my-gcp").unwrap();
/// assert_eq!(id.service_account_id(), "demo-app-sa");
/// assert_eq!(id.ci_secret_name(), "DEMO_APP");
/// assert_eq!(id.image_reference(), "gcr.io/my-gcp/demo-app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    name: String,
    registry: String,
    gcp_project_id: String,
}

impl ProjectIdentity {
    pub fn new(name: &str, registry: &str, gcp_project_id: &str) -> crate::Result<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_owned(),
            registry: registry.trim_end_matches('/').to_owned(),
            gcp_project_id: gcp_project_id.to_owned(),
        })
    }

    /// Same name and registry, pushed to another GCP project.
    pub fn with_gcp_project_id(&self, gcp_project_id: &str) -> Self {
        Self {
            gcp_project_id: gcp_project_id.to_owned(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gcp_project_id(&self) -> &str {
        &self.gcp_project_id
    }

    pub fn service_account_id(&self) -> String {
        service_account_id(&self.name)
    }

    pub fn service_account_email(&self) -> String {
        format!(
            "{}@{}.iam.gserviceaccount.com",
            self.service_account_id(),
            self.gcp_project_id
        )
    }

    pub fn ci_secret_name(&self) -> String {
        ci_secret_name(&self.name)
    }

    pub fn image_reference(&self) -> String {
        format!("{}/{}/{}", self.registry, self.gcp_project_id, self.name)
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub fn service_account_id(name: &str) -> String {
    format!("{name}-sa")
}

pub fn ci_secret_name(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

/// Check that `name` is a slug usable as a service and account name.
pub fn validate_name(name: &str) -> crate::Result<()> {
    let invalid = |reason| crate::Error::InvalidProjectName {
        name: name.to_owned(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 26 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("name must start with a lowercase letter"));
    }
    if name.ends_with('-') {
        return Err(invalid("name must not end with '-'"));
    }
    if name.contains("--") {
        return Err(invalid("name must not contain consecutive '-'"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits and '-' are allowed"));
    }
    Ok(())
}

/// Turn arbitrary text (usually a directory name) into a valid slug.
///
/// Returns `None` when nothing usable remains.
pub fn slugify(raw: &str) -> Option<String> {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let start = slug.find(|c: char| c.is_ascii_lowercase())?;
    let mut slug = slug[start..].to_owned();
    slug.truncate(MAX_NAME_LEN);
    let slug = slug.trim_end_matches('-').to_owned();

    validate_name(&slug).is_ok().then_some(slug)
}

/// Project name from the final component of `dir`.
pub fn name_from_dir(dir: &Path) -> crate::Result<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .and_then(slugify)
        .ok_or_else(|| crate::Error::UnnamedProjectDir {
            path: dir.to_path_buf(),
        })
}
