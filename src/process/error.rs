use std::io;

use thiserror::Error;

use crate::repro::store::RecordingsError;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// No recording exists and blocking is active. This is a test failure
    /// signal and must never be retried.
    #[error("Blocked unrecorded command: {args:?}")]
    Blocked { args: Vec<String> },
    #[error("Empty command line")]
    EmptyCommand,
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Recordings(#[from] RecordingsError),
}

impl ProcessError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ProcessError::Blocked { .. })
    }
}
