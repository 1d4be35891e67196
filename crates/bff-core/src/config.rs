use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "bff.toml";

/// bff.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BffConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cloud_run: CloudRunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (defaults to the project directory name)
    pub name: Option<String>,
    /// GCP project ID
    pub gcp_project_id: Option<String>,
    /// GCP region (defaults to europe-west4)
    #[serde(default = "default_region")]
    pub region: String,
    /// Container registry host the image is pushed to
    #[serde(default = "default_registry")]
    pub registry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Files whose project-name placeholder is rendered
    #[serde(default = "default_project_files")]
    pub project_files: Vec<String>,
    /// CI pipeline definition
    #[serde(default = "default_cicd_file")]
    pub cicd_file: String,
    /// Git URL cloned into the project directory after a full `bff clean`
    #[serde(default = "default_template_repository")]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    #[serde(default = "default_frontend_dir")]
    pub dir: String,
    /// Project generator, run inside `dir` when it has no package.json
    #[serde(default = "default_generator")]
    pub generator: Vec<String>,
    #[serde(default = "default_frontend_install")]
    pub install: Vec<String>,
    #[serde(default = "default_frontend_build")]
    pub build: Vec<String>,
    /// Directory (inside `dir`) the build writes to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_install")]
    pub install: Vec<String>,
    /// Port written to `.env` for local runs
    #[serde(default = "default_local_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Command that starts the container engine's virtualization layer.
    /// `None` means the engine is expected to run natively.
    #[serde(default = "default_engine_start")]
    pub start: Option<Vec<String>>,
    /// Run after the image is pushed, only when bff started the engine.
    #[serde(default = "default_engine_stop")]
    pub stop: Option<Vec<String>>,
    /// Readiness checks after starting the engine
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudRunConfig {
    /// Port the packaged image listens on
    #[serde(default = "default_image_port")]
    pub port: u16,
    #[serde(default)]
    pub allow_unauthenticated: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            gcp_project_id: None,
            region: default_region(),
            registry: default_registry(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            project_files: default_project_files(),
            cicd_file: default_cicd_file(),
            repository: default_template_repository(),
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            dir: default_frontend_dir(),
            generator: default_generator(),
            install: default_frontend_install(),
            build: default_frontend_build(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            install: default_backend_install(),
            port: default_local_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start: default_engine_start(),
            stop: default_engine_stop(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for CloudRunConfig {
    fn default() -> Self {
        Self {
            port: default_image_port(),
            allow_unauthenticated: false,
        }
    }
}

impl BffConfig {
    /// Load from bff.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

fn default_region() -> String {
    "europe-west4".to_owned()
}

fn default_registry() -> String {
    "gcr.io".to_owned()
}

fn default_project_files() -> Vec<String> {
    vec!["pyproject.toml".to_owned(), "makefile".to_owned()]
}

fn default_cicd_file() -> String {
    ".github/workflows/cicd.yaml".to_owned()
}

fn default_template_repository() -> Option<String> {
    Some("https://github.com/achsaf6/bff-template.git".to_owned())
}

fn default_frontend_dir() -> String {
    "frontend".to_owned()
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

fn default_generator() -> Vec<String> {
    command(&[
        "npm",
        "create",
        "vite@latest",
        ".",
        "--yes",
        "--",
        "--template",
        "react",
    ])
}

fn default_frontend_install() -> Vec<String> {
    command(&["npm", "install"])
}

fn default_frontend_build() -> Vec<String> {
    command(&["npm", "run", "build"])
}

fn default_output_dir() -> String {
    "dist".to_owned()
}

fn default_backend_install() -> Vec<String> {
    command(&["uv", "sync"])
}

fn default_local_port() -> u16 {
    8000
}

fn default_engine_start() -> Option<Vec<String>> {
    cfg!(target_os = "macos").then(|| command(&["colima", "start"]))
}

fn default_engine_stop() -> Option<Vec<String>> {
    cfg!(target_os = "macos").then(|| command(&["colima", "stop"]))
}

fn default_max_attempts() -> u32 {
    6
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    16_000
}

fn default_image_port() -> u16 {
    3000
}
