use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use crate::process::error::ProcessError;
use crate::repro::codec::Payload;

/// What to do with a child's stdout or stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redirect {
    /// Collect the stream into the result (and the recording)
    #[default]
    Capture,
    /// Share the parent's stream; nothing is recorded
    Inherit,
    /// Discard; nothing is recorded
    Null,
}

impl Redirect {
    pub fn is_captured(&self) -> bool {
        matches!(self, Redirect::Capture)
    }

    fn stdio(&self) -> Stdio {
        match self {
            Redirect::Capture => Stdio::piped(),
            Redirect::Inherit => Stdio::inherit(),
            Redirect::Null => Stdio::null(),
        }
    }
}

/// Everything besides the command line that shapes one execution.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Data fed to the child's stdin. Without it the child reads from null.
    pub stdin: Option<Payload>,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables on top of the inherited environment
    pub env: Vec<(OsString, OsString)>,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdin(mut self, stdin: impl Into<Payload>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = redirect;
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = redirect;
        self
    }
}

/// Result of a finished (or replayed) process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedProcess {
    pub args: Vec<String>,
    /// `None` when the child was terminated by a signal
    pub returncode: Option<i32>,
    pub stdout: Option<Payload>,
    pub stderr: Option<Payload>,
}

impl CompletedProcess {
    pub fn success(&self) -> bool {
        self.returncode == Some(0)
    }

    pub fn stdout_bytes(&self) -> &[u8] {
        self.stdout.as_ref().map(Payload::as_bytes).unwrap_or_default()
    }

    pub fn stderr_bytes(&self) -> &[u8] {
        self.stderr.as_ref().map(Payload::as_bytes).unwrap_or_default()
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.stdout_bytes())
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.stderr_bytes())
    }
}

/// Seam for process execution.
///
/// Code under test takes a `ProcessRunner` (or calls [`crate::process::run`])
/// instead of spawning directly, so tests can swap in the intercepting runner.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, args: &[OsString], options: &RunOptions) -> Result<CompletedProcess, ProcessError>;
}

/// Spawns the real program with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealProcessRunner;

impl RealProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for RealProcessRunner {
    fn run(&self, args: &[OsString], options: &RunOptions) -> Result<CompletedProcess, ProcessError> {
        let Some((program, rest)) = args.split_first() else {
            return Err(ProcessError::EmptyCommand);
        };

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .envs(options.env.iter().map(|(k, v)| (k, v)))
            .stdin(if options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(options.stdout.stdio())
            .stderr(options.stderr.stdio());
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;

        // Feed stdin from another thread so a chatty child cannot deadlock us.
        let feeder = match (child.stdin.take(), &options.stdin) {
            (Some(mut pipe), Some(payload)) => {
                let bytes = payload.as_bytes().to_vec();
                Some(thread::spawn(move || pipe.write_all(&bytes)))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(feeder) = feeder {
            match feeder.join() {
                Ok(Ok(())) => {}
                // The child is allowed to exit without reading all its input.
                Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(io::Error::other("stdin writer panicked").into()),
            }
        }

        Ok(CompletedProcess {
            args: display_args(args),
            returncode: output.status.code(),
            stdout: options
                .stdout
                .is_captured()
                .then(|| Payload::from_output(output.stdout)),
            stderr: options
                .stderr
                .is_captured()
                .then(|| Payload::from_output(output.stderr)),
        })
    }
}

/// Lossy string form of a command line, for results and error messages.
pub fn display_args<S: AsRef<OsStr>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.as_ref().to_string_lossy().into_owned())
        .collect()
}
