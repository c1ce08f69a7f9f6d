//! File-backed recordings for one test.
//!
//! Each test owns one YAML document with a single `recordings` sequence. The
//! document is read lazily on every lookup and rewritten in full on every
//! persisted invocation; there is no separate flush step.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::repro::codec::Payload;
use crate::repro::fuzzy::FuzzyMatchers;
use crate::repro::recording::{Recording, RecordingError};

/// Top-level key of the recordings document.
pub const RECORDINGS_KEY: &str = "recordings";

#[derive(Debug, Error)]
pub enum RecordingsError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse recordings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Failed to serialize recordings file {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Malformed recordings file {}: {reason}", .path.display())]
    InvalidDocument { path: PathBuf, reason: String },
    #[error("Malformed recording #{index} in {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        index: usize,
        #[source]
        source: RecordingError,
    },
    #[error("Invalid fuzzy matcher: {0}")]
    FuzzyMatcher(#[from] regex::Error),
}

/// Persistence policy for a recordings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    /// Replay matches, record everything else.
    #[default]
    New,
    /// Replay matches, never persist anything.
    None,
    /// Re-execute everything and overwrite matching entries in place.
    All,
    /// Record while the file does not exist yet, then block anything new.
    Once,
}

impl RecordMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordMode::New => "new",
            RecordMode::None => "none",
            RecordMode::All => "all",
            RecordMode::Once => "once",
        }
    }

    pub fn all() -> &'static [RecordMode] {
        &[
            RecordMode::New,
            RecordMode::None,
            RecordMode::All,
            RecordMode::Once,
        ]
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid record mode `{0}` (expected one of: new, none, all, once)")]
pub struct ParseRecordModeError(pub String);

impl FromStr for RecordMode {
    type Err = ParseRecordModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(RecordMode::New),
            "none" => Ok(RecordMode::None),
            "all" => Ok(RecordMode::All),
            "once" => Ok(RecordMode::Once),
            _ => Err(ParseRecordModeError(value.to_string())),
        }
    }
}

impl std::fmt::Display for RecordMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recordings of one test: the session history plus the backing file.
#[derive(Debug)]
pub struct Recordings {
    file: PathBuf,
    mode: RecordMode,
    fuzzy: FuzzyMatchers,
    /// Invocations made so far in this session, in call order.
    history: Vec<Recording>,
    /// Whether the backing file existed when the store was created.
    file_existed: bool,
}

impl Recordings {
    pub fn new<I, S>(
        file: impl Into<PathBuf>,
        mode: RecordMode,
        fuzzy_matchers: I,
    ) -> Result<Self, RecordingsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fuzzy = FuzzyMatchers::new(fuzzy_matchers)?;
        Ok(Self::with_matchers(file, mode, fuzzy))
    }

    pub fn with_matchers(file: impl Into<PathBuf>, mode: RecordMode, fuzzy: FuzzyMatchers) -> Self {
        let file = file.into();
        let file_existed = file.exists();
        Self {
            file,
            mode,
            fuzzy,
            history: Vec::new(),
            file_existed,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    pub fn fuzzy_matchers(&self) -> &FuzzyMatchers {
        &self.fuzzy
    }

    pub fn history(&self) -> &[Recording] {
        &self.history
    }

    /// `once` mode against a file that already existed: nothing new may run.
    pub fn block_unrecorded(&self) -> bool {
        self.mode == RecordMode::Once && self.file_existed
    }

    /// Every history entry with these args and stdin, whatever the iteration.
    pub fn find_all(&self, args: &[String], stdin: Option<&Payload>) -> Vec<&Recording> {
        self.history
            .iter()
            .filter(|recording| recording.matches(args, stdin, None))
            .collect()
    }

    /// Register a new invocation and fill it from the recordings file when a
    /// matching entry exists.
    ///
    /// The returned recording has `saved == true` when it can be replayed.
    pub fn append<S: AsRef<OsStr>>(
        &mut self,
        args: &[S],
        stdin: Option<Payload>,
    ) -> Result<Recording, RecordingsError> {
        let normalized = self.fuzzy.compile(args);
        let iteration = self.find_all(&normalized, stdin.as_ref()).len() as u32 + 1;

        let mut recording = Recording::new(normalized, stdin).with_iteration(iteration);
        self.load(&mut recording)?;

        if self.mode == RecordMode::All {
            recording.saved = false;
        }

        tracing::debug!(
            args = ?recording.args,
            iteration = recording.iteration,
            saved = recording.saved,
            "Appended invocation to recordings"
        );

        self.history.push(recording.clone());
        Ok(recording)
    }

    /// Fill `recording` from the first persisted entry with the same identity.
    ///
    /// A missing file, or a document without recordings, leaves it untouched.
    pub fn load(&self, recording: &mut Recording) -> Result<(), RecordingsError> {
        let Some(document) = self.read_document()? else {
            return Ok(());
        };
        let Some(entries) = self.entries(&document)? else {
            return Ok(());
        };

        for (index, entry) in entries.iter().enumerate() {
            let persisted = self.decode_entry(index, entry)?;
            if *recording == persisted {
                recording.copy_from(&persisted);
                recording.saved = true;
                break;
            }
        }

        Ok(())
    }

    /// Persist `recording` according to the record mode.
    ///
    /// In `all` mode the first matching entry is replaced in place; otherwise
    /// the entry is appended. The whole document is rewritten.
    pub fn write(&mut self, recording: &mut Recording) -> Result<(), RecordingsError> {
        if self.mode == RecordMode::None || self.block_unrecorded() {
            tracing::debug!(
                mode = %self.mode,
                args = ?recording.args,
                "Record mode does not persist new invocations"
            );
            return Ok(());
        }

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut document = match self.read_document()? {
            Some(Value::Mapping(mapping)) if mapping.contains_key(RECORDINGS_KEY) => {
                Value::Mapping(mapping)
            }
            _ => empty_document(),
        };

        let encoded = Value::Mapping(recording.to_encoded_dict());
        let entries = self.entries_mut(&mut document)?;

        let mut position = None;
        for (index, entry) in entries.iter().enumerate() {
            let persisted = self.decode_entry(index, entry)?;
            if *recording == persisted && self.mode == RecordMode::All {
                position = Some(index);
                break;
            }
        }

        match position {
            Some(index) => entries[index] = encoded,
            None => entries.push(encoded),
        }

        self.write_document(&document)?;
        recording.saved = true;

        if let Some(entry) = self.history.iter_mut().rev().find(|h| **h == *recording) {
            entry.copy_from(recording);
            entry.saved = true;
        }

        tracing::debug!(
            path = %self.file.display(),
            args = ?recording.args,
            iteration = recording.iteration,
            replaced = position.is_some(),
            "Persisted recording"
        );

        Ok(())
    }

    /// Forget the session history, and optionally empty the recordings file.
    pub fn clean(&mut self, write: bool) -> Result<(), RecordingsError> {
        self.history.clear();

        if !write {
            return Ok(());
        }

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        self.write_document(&empty_document())
    }

    /// All recordings currently in the backing file, in file order.
    pub fn persisted(&self) -> Result<Vec<Recording>, RecordingsError> {
        let Some(document) = self.read_document()? else {
            return Ok(Vec::new());
        };
        let Some(entries) = self.entries(&document)? else {
            return Ok(Vec::new());
        };

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let mut recording = self.decode_entry(index, entry)?;
                recording.saved = true;
                Ok(recording)
            })
            .collect()
    }

    fn read_document(&self) -> Result<Option<Value>, RecordingsError> {
        let contents = match fs::read_to_string(&self.file) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };

        let document: Value =
            serde_yaml::from_str(&contents).map_err(|source| RecordingsError::Parse {
                path: self.file.clone(),
                source,
            })?;
        Ok(Some(document))
    }

    fn write_document(&self, document: &Value) -> Result<(), RecordingsError> {
        let contents =
            serde_yaml::to_string(document).map_err(|source| RecordingsError::Serialize {
                path: self.file.clone(),
                source,
            })?;
        fs::write(&self.file, contents).map_err(|source| self.io_error(source))
    }

    fn entries<'a>(&self, document: &'a Value) -> Result<Option<&'a Vec<Value>>, RecordingsError> {
        match document.get(RECORDINGS_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Sequence(entries)) => Ok(Some(entries)),
            Some(_) => Err(self.invalid_document("`recordings` is not a sequence")),
        }
    }

    fn entries_mut<'a>(
        &self,
        document: &'a mut Value,
    ) -> Result<&'a mut Vec<Value>, RecordingsError> {
        let Some(slot) = document.get_mut(RECORDINGS_KEY) else {
            return Err(self.invalid_document("missing `recordings` key"));
        };
        if slot.is_null() {
            *slot = Value::Sequence(Vec::new());
        }
        match slot {
            Value::Sequence(entries) => Ok(entries),
            _ => Err(self.invalid_document("`recordings` is not a sequence")),
        }
    }

    fn decode_entry(&self, index: usize, entry: &Value) -> Result<Recording, RecordingsError> {
        Recording::from_encoded_value(entry).map_err(|source| RecordingsError::Malformed {
            path: self.file.clone(),
            index,
            source,
        })
    }

    fn io_error(&self, source: io::Error) -> RecordingsError {
        RecordingsError::Io {
            path: self.file.clone(),
            source,
        }
    }

    fn invalid_document(&self, reason: &str) -> RecordingsError {
        RecordingsError::InvalidDocument {
            path: self.file.clone(),
            reason: reason.to_string(),
        }
    }
}

fn empty_document() -> Value {
    let mut mapping = Mapping::new();
    mapping.insert(RECORDINGS_KEY.into(), Value::Sequence(Vec::new()));
    Value::Mapping(mapping)
}
