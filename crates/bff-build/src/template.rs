use std::path::{Path, PathBuf};

use bff_core::{ProjectIdentity, TemplatesConfig};

/// Project name in build files (`name = "bff-template"`).
pub const PROJECT_NAME_TOKEN: &str = "bff-template";
/// CI secret holding the service account key.
pub const SERVICE_ACCOUNT_TOKEN: &str = "BFF_TEMPLATE_SA";
/// Cloud Run service name in the pipeline.
pub const SERVICE_NAME_TOKEN: &str = "bff-template-service-name";
/// Container image in the pipeline.
pub const IMAGE_URL_TOKEN: &str = "bff-template-image-url";
/// Gate that keeps the deploy job disabled until the project is provisioned.
pub const ACTIVATE_CI_TOKEN: &str = "if: false";
const CI_ACTIVATED: &str = "if: true";

/// A token and the text it is replaced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub token: &'static str,
    pub value: String,
}

impl Placeholder {
    pub fn new(token: &'static str, value: impl Into<String>) -> Self {
        Self {
            token,
            value: value.into(),
        }
    }
}

/// A template file (relative to the project root) and its placeholders.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub path: PathBuf,
    pub placeholders: Vec<Placeholder>,
}

/// The files rendered by `bff init`.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub files: Vec<TemplateFile>,
}

impl TemplateSet {
    /// Project files plus the CI pipeline. The activation gate is only
    /// rendered when `activate_ci` is set.
    pub fn for_project(
        config: &TemplatesConfig,
        identity: &ProjectIdentity,
        activate_ci: bool,
    ) -> Self {
        let mut files: Vec<TemplateFile> = config
            .project_files
            .iter()
            .map(|path| TemplateFile {
                path: PathBuf::from(path),
                placeholders: vec![Placeholder::new(PROJECT_NAME_TOKEN, identity.name())],
            })
            .collect();

        let mut pipeline = vec![
            Placeholder::new(SERVICE_ACCOUNT_TOKEN, identity.ci_secret_name()),
            Placeholder::new(SERVICE_NAME_TOKEN, identity.name()),
            Placeholder::new(IMAGE_URL_TOKEN, identity.image_reference()),
        ];
        if activate_ci {
            pipeline.push(Placeholder::new(ACTIVATE_CI_TOKEN, CI_ACTIVATED));
        }
        files.push(TemplateFile {
            path: PathBuf::from(&config.cicd_file),
            placeholders: pipeline,
        });

        Self { files }
    }

    /// Only the CI activation gate, for projects switched to admin mode
    /// after a local init.
    pub fn ci_activation(config: &TemplatesConfig) -> Self {
        Self {
            files: vec![TemplateFile {
                path: PathBuf::from(&config.cicd_file),
                placeholders: vec![Placeholder::new(ACTIVATE_CI_TOKEN, CI_ACTIVATED)],
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Rendered { replacements: usize },
    AlreadyRendered,
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Outcome of a render pass. `warnings` only holds
/// [`TemplateError::PlaceholderNotFound`].
#[derive(Debug, Default)]
pub struct RenderReport {
    pub files: Vec<FileReport>,
    pub warnings: Vec<TemplateError>,
}

impl RenderReport {
    pub fn rendered_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Rendered { .. }))
            .count()
    }
}

/// Substitutes placeholders in template files under a project root.
pub struct TemplateRenderer<'a> {
    root: &'a Path,
}

impl<'a> TemplateRenderer<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Render every file in `set`.
    ///
    /// All files are checked for existence before any is written, so a
    /// missing template leaves the tree untouched. A placeholder that is no
    /// longer present is reported as a warning and the file is left as is.
    pub fn render(&self, set: &TemplateSet) -> Result<RenderReport, TemplateError> {
        for file in &set.files {
            let path = self.root.join(&file.path);
            if !path.is_file() {
                return Err(TemplateError::NotFound { path });
            }
        }

        let mut report = RenderReport::default();
        for file in &set.files {
            let path = self.root.join(&file.path);
            let original = std::fs::read_to_string(&path).map_err(|e| TemplateError::Read {
                path: path.clone(),
                source: e,
            })?;

            let mut content = original.clone();
            let mut replacements = 0;
            for placeholder in &file.placeholders {
                let (rendered, count) =
                    replace_token(&content, placeholder.token, &placeholder.value);
                if count == 0 {
                    let warning = TemplateError::PlaceholderNotFound {
                        path: path.clone(),
                        token: placeholder.token,
                    };
                    tracing::warn!("{warning}");
                    report.warnings.push(warning);
                    continue;
                }
                content = rendered;
                replacements += count;
            }

            let status = if replacements > 0 && content != original {
                std::fs::write(&path, &content).map_err(|e| TemplateError::Write {
                    path: path.clone(),
                    source: e,
                })?;
                tracing::debug!(path = %path.display(), replacements, "template rendered");
                FileStatus::Rendered { replacements }
            } else {
                FileStatus::AlreadyRendered
            };

            report.files.push(FileReport {
                path: file.path.clone(),
                status,
            });
        }

        Ok(report)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Replace whole-token occurrences of `token`. An occurrence counts only if
/// it is not glued to further word characters on an edge where the token
/// itself starts or ends with one. Returns the new text and the number of
/// replacements.
pub fn replace_token(content: &str, token: &str, value: &str) -> (String, usize) {
    if token.is_empty() {
        return (content.to_owned(), 0);
    }

    let check_before = token.starts_with(is_word_char);
    let check_after = token.ends_with(is_word_char);

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    let mut count = 0;

    for (idx, _) in content.match_indices(token) {
        let end = idx + token.len();
        let glued_before = check_before && content[..idx].ends_with(is_word_char);
        let glued_after = check_after && content[end..].starts_with(is_word_char);
        if glued_before || glued_after {
            continue;
        }
        out.push_str(&content[last..idx]);
        out.push_str(value);
        last = end;
        count += 1;
    }
    out.push_str(&content[last..]);

    (out, count)
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {path} not found")]
    NotFound { path: PathBuf },

    #[error("placeholder {token:?} not found in {path}, already rendered?")]
    PlaceholderNotFound { path: PathBuf, token: &'static str },

    #[error("failed to read template {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write template {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_quoted_name() {
        let (out, n) = replace_token(r#"name = "bff-template""#, PROJECT_NAME_TOKEN, "demo-app");
        assert_eq!(out, r#"name = "demo-app""#);
        assert_eq!(n, 1);
    }

    #[test]
    fn does_not_match_inside_longer_token() {
        let text = "service: bff-template-service-name";
        let (out, n) = replace_token(text, PROJECT_NAME_TOKEN, "demo-app");
        assert_eq!(out, text);
        assert_eq!(n, 0);
    }

    #[test]
    fn does_not_match_with_prefix() {
        let (_, n) = replace_token("my-bff-template", PROJECT_NAME_TOKEN, "x");
        assert_eq!(n, 0);
    }

    #[test]
    fn replaces_all_occurrences() {
        let (out, n) = replace_token(
            "a BFF_TEMPLATE_SA b BFF_TEMPLATE_SA",
            SERVICE_ACCOUNT_TOKEN,
            "DEMO",
        );
        assert_eq!(out, "a DEMO b DEMO");
        assert_eq!(n, 2);
    }

    #[test]
    fn activation_gate_matches_in_yaml() {
        let yaml = "  deploy:\n    if: false\n    runs-on: ubuntu-latest\n";
        let (out, n) = replace_token(yaml, ACTIVATE_CI_TOKEN, CI_ACTIVATED);
        assert_eq!(n, 1);
        assert!(out.contains("    if: true\n"));
    }

    #[test]
    fn activation_gate_ignores_longer_expression() {
        let (_, n) = replace_token("if: false_alarm", ACTIVATE_CI_TOKEN, CI_ACTIVATED);
        assert_eq!(n, 0);
    }

    #[test]
    fn empty_token_is_noop() {
        assert_eq!(replace_token("abc", "", "x"), ("abc".to_owned(), 0));
    }
}
