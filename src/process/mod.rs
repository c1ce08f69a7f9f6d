//! Process execution seam.
//!
//! [`ProcessRunner`] is the one call surface code under test uses to run
//! programs. [`RealProcessRunner`] spawns them; [`InterceptingRunner`]
//! replays, blocks, or executes-and-records through a recordings store.

pub mod error;
pub mod intercept;
pub mod runner;

use std::ffi::{OsStr, OsString};

pub use error::ProcessError;
pub use intercept::InterceptingRunner;
pub use runner::{CompletedProcess, ProcessRunner, RealProcessRunner, Redirect, RunOptions};

use crate::repro::runtime;

/// Run a command through the process-wide entry point.
///
/// With the layer installed and a session active this goes through the
/// session's interceptor; otherwise the program is spawned for real.
pub fn run<I, S>(args: I, options: &RunOptions) -> Result<CompletedProcess, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect();
    runtime::current_runner().run(&args, options)
}
