use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// How much of a streamed command's stderr is kept for the error.
const STDERR_TAIL: usize = 16 * 1024;

/// An external program invocation: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Build from a `[program, args...]` command line as stored in bff.toml.
    pub fn from_command_line(parts: &[String]) -> Result<Self, ExecError> {
        let (program, args) = parts.split_first().ok_or(ExecError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: None,
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// True when the program matches and `needle` is one of the args.
    pub fn is(&self, program: &str, needle: &str) -> bool {
        self.program == program && self.args.iter().any(|a| a == needle)
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("`{program}` not found: is it installed and on PATH?")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("`{program}` output was not valid UTF-8")]
    InvalidUtf8 {
        program: String,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to relay `{program}` output")]
    Relay {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to write to `{program}` stdin")]
    StdinWrite {
        program: String,
        source: std::io::Error,
    },

    #[error("empty command line in bff.toml")]
    EmptyCommand,
}

impl ExecError {
    /// stderr of a failed command, empty for other errors.
    pub fn stderr(&self) -> &str {
        match self {
            Self::CommandFailed { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// Abstraction over external CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Run a command and capture stdout.
    async fn exec(&self, invocation: &Invocation) -> Result<String, ExecError>;

    /// Run a command, streaming output to the terminal.
    async fn exec_streaming(&self, invocation: &Invocation) -> Result<(), ExecError>;

    /// Run a command with data piped to stdin.
    async fn exec_with_stdin(
        &self,
        invocation: &Invocation,
        stdin_data: &[u8],
    ) -> Result<String, ExecError>;
}

impl<T: CommandExecutor> CommandExecutor for &T {
    async fn exec(&self, invocation: &Invocation) -> Result<String, ExecError> {
        (**self).exec(invocation).await
    }

    async fn exec_streaming(&self, invocation: &Invocation) -> Result<(), ExecError> {
        (**self).exec_streaming(invocation).await
    }

    async fn exec_with_stdin(
        &self,
        invocation: &Invocation,
        stdin_data: &[u8],
    ) -> Result<String, ExecError> {
        (**self).exec_with_stdin(invocation, stdin_data).await
    }
}

/// Spawns real processes.
pub struct RealExecutor;

impl CommandExecutor for RealExecutor {
    async fn exec(&self, invocation: &Invocation) -> Result<String, ExecError> {
        tracing::debug!(command = %invocation, "exec");

        let output = invocation
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| not_found(invocation, e))?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ExecError::InvalidUtf8 {
                program: invocation.program.clone(),
                source: e,
            })
        } else {
            Err(failed(
                invocation,
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    /// stdout goes straight to the terminal. stderr is relayed as it
    /// arrives and its tail is kept, so a failure can be classified.
    async fn exec_streaming(&self, invocation: &Invocation) -> Result<(), ExecError> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        tracing::debug!(command = %invocation, "exec (streaming)");

        let mut child = invocation
            .command()
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| not_found(invocation, e))?;

        let relay_err = |e| ExecError::Relay {
            program: invocation.program.clone(),
            source: e,
        };
        let mut tail = Vec::new();
        if let Some(mut stderr) = child.stderr.take() {
            let mut terminal = tokio::io::stderr();
            let mut buf = [0u8; 4096];
            loop {
                let n = stderr.read(&mut buf).await.map_err(relay_err)?;
                if n == 0 {
                    break;
                }
                terminal.write_all(&buf[..n]).await.map_err(relay_err)?;
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL {
                    let excess = tail.len() - STDERR_TAIL;
                    tail.drain(..excess);
                }
            }
            terminal.flush().await.map_err(relay_err)?;
        }

        let status = child.wait().await.map_err(|e| not_found(invocation, e))?;

        if status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&tail);
            Err(failed(
                invocation,
                format!("{}\nexit code: {status}", stderr.trim_end()),
            ))
        }
    }

    async fn exec_with_stdin(
        &self,
        invocation: &Invocation,
        stdin_data: &[u8],
    ) -> Result<String, ExecError> {
        use tokio::io::AsyncWriteExt;

        tracing::debug!(command = %invocation, bytes = stdin_data.len(), "exec (stdin)");

        let mut child = invocation
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| not_found(invocation, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let stdin_err = |e| ExecError::StdinWrite {
                program: invocation.program.clone(),
                source: e,
            };
            stdin.write_all(stdin_data).await.map_err(stdin_err)?;
            stdin.shutdown().await.map_err(stdin_err)?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| not_found(invocation, e))?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ExecError::InvalidUtf8 {
                program: invocation.program.clone(),
                source: e,
            })
        } else {
            Err(failed(
                invocation,
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }
}

fn not_found(invocation: &Invocation, source: std::io::Error) -> ExecError {
    ExecError::NotFound {
        program: invocation.program.clone(),
        source,
    }
}

fn failed(invocation: &Invocation, stderr: String) -> ExecError {
    ExecError::CommandFailed {
        command: invocation.to_string(),
        stderr,
    }
}
