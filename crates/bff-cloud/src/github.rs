use bff_core::{CommandExecutor, ExecError, Invocation, RealExecutor};
use secrecy::{ExposeSecret, SecretBox};

/// GitHub operations through the `gh` CLI.
pub struct GithubClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl GithubClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for GithubClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> GithubClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// Set a GitHub Actions secret via stdin to avoid exposing the value in process args.
    pub async fn set_secret(&self, name: &str, value: &SecretBox<[u8]>) -> Result<(), GithubError> {
        self.executor
            .exec_with_stdin(&gh(["secret", "set", name]), value.expose_secret())
            .await
            .map_err(|e| GithubError::SetSecret {
                name: name.to_owned(),
                source: e,
            })?;
        Ok(())
    }

    /// `owner/repo` of the repository the working directory belongs to.
    pub async fn repo_name(&self) -> Result<String, GithubError> {
        let output = self
            .executor
            .exec(&gh([
                "repo",
                "view",
                "--json",
                "nameWithOwner",
                "-q",
                ".nameWithOwner",
            ]))
            .await
            .map_err(|e| GithubError::RepoView { source: e })?;

        let repo = output.trim();
        if repo.is_empty() {
            return Err(GithubError::NoRepository);
        }
        Ok(repo.to_owned())
    }

    pub async fn delete_repo(&self, repo: &str) -> Result<(), GithubError> {
        self.executor
            .exec(&gh(["repo", "delete", repo, "--yes"]))
            .await
            .map_err(|e| GithubError::DeleteRepo {
                repo: repo.to_owned(),
                source: e,
            })?;
        Ok(())
    }
}

fn gh<const N: usize>(a: [&str; N]) -> Invocation {
    Invocation::new("gh").args(a)
}

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("failed to set GitHub secret {name}")]
    SetSecret { name: String, source: ExecError },

    #[error("failed to read the GitHub repository; is `gh auth login` done?")]
    RepoView { source: ExecError },

    #[error("the working directory is not a GitHub repository")]
    NoRepository,

    #[error("failed to delete GitHub repository {repo}")]
    DeleteRepo { repo: String, source: ExecError },
}
