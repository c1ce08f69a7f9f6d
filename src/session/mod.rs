//! Per-test record/replay sessions
//!
//! A session ties one test to its recordings file: it resolves the file path,
//! assembles the fuzzy matchers, and owns the intercepting runner. Use
//! [`SessionBuilder::build`] to inject the runner explicitly, or
//! [`SessionBuilder::install`] to route [`crate::process::run`] through it
//! until the returned guard is dropped.

use std::ffi::OsStr;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use crate::config::{Settings, SettingsError};
use crate::process::{
    CompletedProcess, InterceptingRunner, ProcessError, ProcessRunner, RunOptions,
};
use crate::repro::runtime;
use crate::repro::store::{RecordMode, Recordings, RecordingsError};
use crate::util::paths;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Recordings(#[from] RecordingsError),
}

/// Build a [`SessionBuilder`] for the calling test file.
///
/// ```ignore
/// let session = pvcr::session!("echo_hello").install()?;
/// ```
#[macro_export]
macro_rules! session {
    ($name:expr) => {
        $crate::session::Session::builder(
            ::std::path::Path::new(::std::env!("CARGO_MANIFEST_DIR")).join(::std::file!()),
            $name,
        )
    };
}

pub struct SessionBuilder {
    test_file: PathBuf,
    test_name: String,
    settings: Option<Settings>,
    record_mode: Option<RecordMode>,
    fuzzy_matchers: Vec<String>,
    wait: Option<bool>,
    recordings_file: Option<PathBuf>,
    inner: Option<Arc<dyn ProcessRunner>>,
}

impl SessionBuilder {
    fn new(test_file: PathBuf, test_name: String) -> Self {
        Self {
            test_file,
            test_name,
            settings: None,
            record_mode: None,
            fuzzy_matchers: Vec::new(),
            wait: None,
            recordings_file: None,
            inner: None,
        }
    }

    /// Use these settings instead of [`Settings::load`].
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn record_mode(mut self, mode: RecordMode) -> Self {
        self.record_mode = Some(mode);
        self
    }

    /// Add a fuzzy matcher for this test only.
    pub fn fuzzy_matcher(mut self, pattern: impl Into<String>) -> Self {
        self.fuzzy_matchers.push(pattern.into());
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Override the conventional recordings file location.
    pub fn recordings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.recordings_file = Some(path.into());
        self
    }

    /// Runner used for invocations that are executed for real.
    pub fn inner_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.inner = Some(runner);
        self
    }

    fn resolve_fuzzy_matchers(&self, settings: &Settings) -> Vec<String> {
        let mut matchers = Vec::new();
        if settings.auto_fuzzy_match {
            if let Some(root) = paths::auto_fuzzy_root(&self.test_file) {
                matchers.push(regex::escape(&root.to_string_lossy()));
            }
        }
        matchers.extend(settings.fuzzy_matchers.iter().cloned());
        matchers.extend(self.fuzzy_matchers.iter().cloned());
        matchers
    }

    /// Create the session without touching process-wide state.
    pub fn build(self) -> Result<Session, SessionError> {
        let settings = match &self.settings {
            Some(settings) => settings.clone(),
            None => Settings::load()?,
        };
        let mode = self.record_mode.unwrap_or(settings.record_mode);
        let wait = self.wait.unwrap_or(settings.wait);
        let fuzzy_matchers = self.resolve_fuzzy_matchers(&settings);
        let file = self
            .recordings_file
            .unwrap_or_else(|| paths::recordings_file(&self.test_file, &self.test_name));

        let recordings = Arc::new(Mutex::new(Recordings::new(&file, mode, &fuzzy_matchers)?));
        let runner = match self.inner {
            Some(inner) => InterceptingRunner::with_inner(recordings.clone(), inner),
            None => InterceptingRunner::new(recordings.clone()),
        }
        .block_all(settings.block_run)
        .wait(wait);

        tracing::debug!(
            test = %self.test_name,
            path = %file.display(),
            mode = %mode,
            block_run = settings.block_run,
            fuzzy_matchers = fuzzy_matchers.len(),
            "Started recordings session"
        );

        Ok(Session {
            recordings,
            runner: Arc::new(runner),
        })
    }

    /// Create the session and make it the target of [`crate::process::run`].
    ///
    /// Waits for any other installed session to end first.
    pub fn install(self) -> Result<SessionGuard, SessionError> {
        let lock = runtime::lock_sessions();
        let session = self.build()?;
        runtime::install();
        runtime::activate(session.runner.clone());
        Ok(SessionGuard {
            session,
            _lock: lock,
        })
    }
}

/// Recordings store and intercepting runner of one test.
pub struct Session {
    recordings: Arc<Mutex<Recordings>>,
    runner: Arc<InterceptingRunner>,
}

impl Session {
    pub fn builder(test_file: impl Into<PathBuf>, test_name: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(test_file.into(), test_name.into())
    }

    /// The intercepting runner, for code that takes a [`ProcessRunner`].
    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        self.runner.clone()
    }

    pub fn run<I, S>(&self, args: I, options: &RunOptions) -> Result<CompletedProcess, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        self.runner.run(&args, options)
    }

    pub fn recordings(&self) -> MutexGuard<'_, Recordings> {
        self.recordings.lock()
    }

    pub fn recordings_path(&self) -> PathBuf {
        self.recordings.lock().path().to_path_buf()
    }

    pub fn record_mode(&self) -> RecordMode {
        self.recordings.lock().mode()
    }
}

/// An installed session. Dropping it deactivates the session and lets the
/// next one install.
pub struct SessionGuard {
    session: Session,
    _lock: MutexGuard<'static, ()>,
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        runtime::deactivate();
        tracing::debug!(
            path = %self.session.recordings_path().display(),
            "Ended recordings session"
        );
    }
}
