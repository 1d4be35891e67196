use bff_build::template::{FileStatus, TemplateError, TemplateRenderer, TemplateSet};
use bff_core::{ProjectIdentity, TemplatesConfig};
use std::path::Path;
use tempfile::TempDir;

const PYPROJECT: &str = r#"[project]
name = "bff-template"
version = "0.1.0"
dependencies = ["fastapi", "uvicorn"]
"#;

const MAKEFILE: &str = r#"name = "bff-template"

local:
	uv run uvicorn backend.main:app --reload --port $${PORT:-8000}
"#;

const CICD: &str = r#"name: deploy
env:
  SERVICE_NAME: bff-template-service-name
  IMAGE_URL: bff-template-image-url
jobs:
  deploy:
    if: false
    runs-on: ubuntu-latest
    steps:
      - uses: google-github-actions/auth@v2
        with:
          credentials_json: ${{ secrets.BFF_TEMPLATE_SA }}
"#;

fn write_template(root: &Path) {
    std::fs::write(root.join("pyproject.toml"), PYPROJECT).unwrap();
    std::fs::write(root.join("makefile"), MAKEFILE).unwrap();
    std::fs::create_dir_all(root.join(".github/workflows")).unwrap();
    std::fs::write(root.join(".github/workflows/cicd.yaml"), CICD).unwrap();
}

fn identity() -> ProjectIdentity {
    ProjectIdentity::new("demo-app", "gcr.io", "acme").unwrap()
}

fn read(root: &Path, path: &str) -> String {
    std::fs::read_to_string(root.join(path)).unwrap()
}

#[test]
fn renders_all_placeholders() {
    let tmp = TempDir::new().unwrap();
    write_template(tmp.path());

    let set = TemplateSet::for_project(&TemplatesConfig::default(), &identity(), true);
    let report = TemplateRenderer::new(tmp.path()).render(&set).unwrap();

    assert_eq!(report.rendered_count(), 3);
    assert!(report.warnings.is_empty());

    assert!(read(tmp.path(), "pyproject.toml").contains(r#"name = "demo-app""#));
    assert!(read(tmp.path(), "makefile").contains(r#"name = "demo-app""#));

    let cicd = read(tmp.path(), ".github/workflows/cicd.yaml");
    assert!(cicd.contains("SERVICE_NAME: demo-app\n"));
    assert!(cicd.contains("IMAGE_URL: gcr.io/acme/demo-app\n"));
    assert!(cicd.contains("secrets.DEMO_APP }}"));
    assert!(cicd.contains("    if: true\n"));
    assert!(!cicd.contains("bff-template"));
}

#[test]
fn local_mode_keeps_ci_gate_closed() {
    let tmp = TempDir::new().unwrap();
    write_template(tmp.path());

    let set = TemplateSet::for_project(&TemplatesConfig::default(), &identity(), false);
    TemplateRenderer::new(tmp.path()).render(&set).unwrap();

    let cicd = read(tmp.path(), ".github/workflows/cicd.yaml");
    assert!(cicd.contains("    if: false\n"));
    assert!(cicd.contains("SERVICE_NAME: demo-app\n"));
}

#[test]
fn second_render_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    write_template(tmp.path());
    let set = TemplateSet::for_project(&TemplatesConfig::default(), &identity(), true);
    let renderer = TemplateRenderer::new(tmp.path());

    renderer.render(&set).unwrap();
    let once = [
        read(tmp.path(), "pyproject.toml"),
        read(tmp.path(), "makefile"),
        read(tmp.path(), ".github/workflows/cicd.yaml"),
    ];

    let report = renderer.render(&set).unwrap();
    let twice = [
        read(tmp.path(), "pyproject.toml"),
        read(tmp.path(), "makefile"),
        read(tmp.path(), ".github/workflows/cicd.yaml"),
    ];

    assert_eq!(once, twice);
    assert_eq!(report.rendered_count(), 0);
    assert!(
        report
            .files
            .iter()
            .all(|f| f.status == FileStatus::AlreadyRendered)
    );
    // one warning per placeholder: 2 project files + 4 pipeline tokens
    assert_eq!(report.warnings.len(), 6);
    assert!(
        report
            .warnings
            .iter()
            .all(|w| matches!(w, TemplateError::PlaceholderNotFound { .. }))
    );
}

#[test]
fn activation_can_be_rendered_later() {
    let tmp = TempDir::new().unwrap();
    write_template(tmp.path());
    let config = TemplatesConfig::default();
    let renderer = TemplateRenderer::new(tmp.path());

    renderer
        .render(&TemplateSet::for_project(&config, &identity(), false))
        .unwrap();
    let report = renderer.render(&TemplateSet::ci_activation(&config)).unwrap();

    assert_eq!(report.rendered_count(), 1);
    assert!(read(tmp.path(), ".github/workflows/cicd.yaml").contains("    if: true\n"));
}

#[test]
fn missing_template_fails_without_writing() {
    let tmp = TempDir::new().unwrap();
    write_template(tmp.path());
    std::fs::remove_file(tmp.path().join("makefile")).unwrap();

    let set = TemplateSet::for_project(&TemplatesConfig::default(), &identity(), true);
    let err = TemplateRenderer::new(tmp.path()).render(&set).unwrap_err();

    assert!(matches!(err, TemplateError::NotFound { ref path } if path.ends_with("makefile")));
    assert_eq!(read(tmp.path(), "pyproject.toml"), PYPROJECT);
}

#[test]
fn partially_rendered_file_only_warns_for_missing_tokens() {
    let tmp = TempDir::new().unwrap();
    write_template(tmp.path());
    let cicd = CICD.replace("bff-template-image-url", "gcr.io/acme/demo-app");
    std::fs::write(tmp.path().join(".github/workflows/cicd.yaml"), cicd).unwrap();

    let set = TemplateSet::for_project(&TemplatesConfig::default(), &identity(), false);
    let report = TemplateRenderer::new(tmp.path()).render(&set).unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        report.warnings[0],
        TemplateError::PlaceholderNotFound { token, .. } if token == "bff-template-image-url"
    ));
    assert_eq!(report.rendered_count(), 3);
}
