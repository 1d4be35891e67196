use std::path::Path;

use bff_core::FrontendConfig;

pub const DOCKERFILE: &str = "Dockerfile";

/// Generates a two-stage Dockerfile: Node builds the frontend, a slim
/// Python image runs the backend through uv and serves the built assets.
pub struct DockerfileGenerator<'a> {
    frontend: &'a FrontendConfig,
    port: u16,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(frontend: &'a FrontendConfig, port: u16) -> Self {
        Self { frontend, port }
    }

    pub fn render(&self) -> String {
        format!(
            r#"# === Stage 1: Frontend build ===
FROM node:20-slim AS frontend
WORKDIR /app/{dir}
COPY {dir}/package*.json ./
RUN npm ci
COPY {dir}/ ./
RUN npm run build

# === Stage 2: Runtime ===
FROM python:3.12-slim
COPY --from=ghcr.io/astral-sh/uv:latest /uv /usr/local/bin/uv
WORKDIR /app
COPY pyproject.toml uv.lock* ./
RUN uv sync --no-dev
COPY backend/ backend/
COPY --from=frontend /app/{dir}/{output} {dir}/build
ENV PORT={port}
EXPOSE {port}
CMD ["sh", "-c", "uv run uvicorn backend.main:app --host 0.0.0.0 --port ${{PORT}}"]
"#,
            dir = self.frontend.dir,
            output = self.frontend.output_dir,
            port = self.port,
        )
    }

    /// Write the Dockerfile unless the project already has one.
    /// Returns whether a file was written.
    pub fn write_if_missing(&self, project_dir: &Path) -> Result<bool, DockerfileError> {
        let path = project_dir.join(DOCKERFILE);
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(&path, self.render())
            .map_err(|e| DockerfileError::Write { path, source: e })?;
        Ok(true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DockerfileError {
    #[error("failed to write {path}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_uses_image_port() {
        let frontend = FrontendConfig::default();
        let out = DockerfileGenerator::new(&frontend, 3000).render();
        assert!(out.contains("ENV PORT=3000"));
        assert!(out.contains("EXPOSE 3000"));
        assert!(out.contains("--port ${PORT}"));
    }

    #[test]
    fn render_copies_build_output_where_backend_serves_it() {
        let frontend = FrontendConfig::default();
        let out = DockerfileGenerator::new(&frontend, 3000).render();
        assert!(out.contains("COPY --from=frontend /app/frontend/dist frontend/build"));
    }

    #[test]
    fn write_if_missing_keeps_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(DOCKERFILE), "FROM scratch\n").unwrap();

        let frontend = FrontendConfig::default();
        let written = DockerfileGenerator::new(&frontend, 3000)
            .write_if_missing(tmp.path())
            .unwrap();

        assert!(!written);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join(DOCKERFILE)).unwrap(),
            "FROM scratch\n"
        );
    }
}
