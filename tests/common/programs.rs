//! Fake programs for exercising the interception layer without spawning

use std::ffi::OsString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pvcr::{CompletedProcess, Payload, ProcessError, ProcessRunner, RunOptions};

/// Answers every call with `"<args> #<call number>"` on stdout, so a replayed
/// result can be told apart from a fresh one.
pub struct NumberedProgram {
    calls: AtomicUsize,
    rc: i32,
}

impl NumberedProgram {
    pub fn new() -> Arc<Self> {
        Self::with_rc(0)
    }

    pub fn with_rc(rc: i32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            rc,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessRunner for NumberedProgram {
    fn run(&self, args: &[OsString], options: &RunOptions) -> Result<CompletedProcess, ProcessError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let stderr = options
            .stdin
            .as_ref()
            .map(|stdin| format!("read {} bytes", stdin.as_bytes().len()))
            .unwrap_or_default();

        Ok(CompletedProcess {
            stdout: Some(Payload::from(format!("{} #{call}", args.join(" ")))),
            stderr: Some(Payload::from(stderr)),
            args,
            returncode: Some(self.rc),
        })
    }
}

pub fn argv(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}
