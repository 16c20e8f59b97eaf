//! External command execution.
//!
//! Commands are described by [`ShellCommand`] and executed by a [`CommandRunner`]. The
//! runner reports the raw exit code of the child; a non-zero exit is data, not an error.

use std::{
    fmt::{self, Display},
    process::{ExitStatus, Stdio},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    task::JoinHandle,
};

use crate::{UtilsError, UtilsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A program invocation: the program, its arguments and extra environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

/// The exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// The exit code, `None` when the process was terminated by a signal.
    code: Option<i32>,
}

/// Runs external commands on the host using `tokio::process`.
///
/// Output lines of the child are forwarded to `tracing` as they arrive.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    /// Value of `PATH` handed to every child process.
    path: Option<String>,
}

/// Which stream of the child process a line came from.
#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Executes [`ShellCommand`]s.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion and returns its exit status.
    ///
    /// Only a failure to start the process is an error.
    async fn run(&self, command: &ShellCommand) -> UtilsResult<CommandStatus>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShellCommand {
    /// Creates a command for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The program to execute.
    pub fn get_program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// The extra environment variables of the child process.
    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }
}

impl CommandStatus {
    /// Creates a status from a raw exit code.
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Creates the status of a process killed by a signal.
    pub fn signaled() -> Self {
        Self { code: None }
    }

    /// The exit code, `None` when the process was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl SystemCommandRunner {
    /// Creates a runner that inherits the parent's `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that sets `PATH` on every child process.
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &ShellCommand) -> UtilsResult<CommandStatus> {
        let mut cmd = Command::new(command.get_program());
        cmd.args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(path) = &self.path {
            cmd.env("PATH", path);
        }

        for (key, value) in command.get_envs() {
            cmd.env(key, value);
        }

        tracing::debug!(command = %command, "spawning command");
        let mut child = cmd.spawn().map_err(|source| UtilsError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let program = command.get_program().to_string();
        let stdout_handle = child
            .stdout
            .take()
            .map(|out| forward_lines(out, program.clone(), OutputStream::Stdout));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| forward_lines(err, program.clone(), OutputStream::Stderr));

        let status = child.wait().await?;

        for handle in [stdout_handle, stderr_handle].into_iter().flatten() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "output forwarding task failed");
            }
        }

        let status = CommandStatus::from(status);
        tracing::debug!(command = %command, exit_code = ?status.code(), "command finished");

        Ok(status)
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn forward_lines<R>(reader: R, program: String, stream: OutputStream) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match stream {
                OutputStream::Stdout => tracing::info!("[{}] {}", program, line),
                OutputStream::Stderr => tracing::warn!("[{}] {}", program, line),
            }
        }
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
