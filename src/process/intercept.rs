use std::ffi::OsString;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::process::error::ProcessError;
use crate::process::runner::{
    display_args, CompletedProcess, ProcessRunner, RealProcessRunner, RunOptions,
};
use crate::repro::store::Recordings;

/// Routes every execution through a [`Recordings`] store.
///
/// Recorded invocations are replayed without running anything; unrecorded
/// ones are either blocked or executed by the inner runner and persisted.
#[derive(Clone)]
pub struct InterceptingRunner {
    recordings: Arc<Mutex<Recordings>>,
    inner: Arc<dyn ProcessRunner>,
    block_all: bool,
    wait: bool,
}

impl InterceptingRunner {
    pub fn new(recordings: Arc<Mutex<Recordings>>) -> Self {
        Self::with_inner(recordings, Arc::new(RealProcessRunner))
    }

    pub fn with_inner(recordings: Arc<Mutex<Recordings>>, inner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            recordings,
            inner,
            block_all: false,
            wait: true,
        }
    }

    /// Block every unrecorded invocation regardless of the record mode.
    pub fn block_all(mut self, block_all: bool) -> Self {
        self.block_all = block_all;
        self
    }

    /// Sleep for the recorded duration when replaying.
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn recordings(&self) -> &Arc<Mutex<Recordings>> {
        &self.recordings
    }

    pub fn is_blocking_all(&self) -> bool {
        self.block_all
    }

    pub fn is_waiting(&self) -> bool {
        self.wait
    }
}

impl std::fmt::Debug for InterceptingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptingRunner")
            .field(
                "recordings",
                &self.recordings.try_lock().map(|r| r.path().to_path_buf()),
            )
            .field("block_all", &self.block_all)
            .field("wait", &self.wait)
            .finish()
    }
}

impl ProcessRunner for InterceptingRunner {
    fn run(&self, args: &[OsString], options: &RunOptions) -> Result<CompletedProcess, ProcessError> {
        if args.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        let (mut recording, block_unrecorded) = {
            let mut recordings = self.recordings.lock();
            let recording = recordings.append(args, options.stdin.clone())?;
            (recording, recordings.block_unrecorded())
        };

        if recording.saved {
            tracing::debug!(args = ?recording.args, "Replaying recorded command");
            if self.wait {
                if let Some(us) = recording.duration {
                    thread::sleep(Duration::from_micros(us));
                }
            }
            return Ok(CompletedProcess {
                args: recording.args,
                returncode: recording.rc,
                stdout: recording.stdout,
                stderr: recording.stderr,
            });
        }

        if self.block_all || block_unrecorded {
            let args = display_args(args);
            tracing::warn!(args = ?args, "Blocked unrecorded command");
            return Err(ProcessError::Blocked { args });
        }

        tracing::debug!(args = ?recording.args, "Executing and recording command");
        let started = Instant::now();
        let completed = self.inner.run(args, options)?;
        let elapsed = started.elapsed();

        recording.stdout = completed.stdout.clone();
        recording.stderr = completed.stderr.clone();
        recording.rc = completed.returncode;
        recording.duration = Some(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));

        self.recordings.lock().write(&mut recording)?;

        Ok(completed)
    }
}
