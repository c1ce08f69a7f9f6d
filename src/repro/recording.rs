use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::repro::codec::{decode_value, encode_value, CodecError, Payload};

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Recording entry is not a mapping: {0:?}")]
    NotAMapping(Value),
    #[error("Field `{field}` has an unexpected value: {value:?}")]
    InvalidField { field: &'static str, value: Value },
    #[error("Field `{field}`: {source}")]
    Payload {
        field: &'static str,
        #[source]
        source: CodecError,
    },
}

/// One captured process invocation.
///
/// Identity is `args`, `stdin` and `iteration`; everything else is payload
/// and never takes part in comparisons.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Normalized command line
    pub args: Vec<String>,
    pub stdin: Option<Payload>,
    pub stdout: Option<Payload>,
    pub stderr: Option<Payload>,
    /// Exit code of the original execution
    pub rc: Option<i32>,
    /// Wall-clock duration of the original execution, in microseconds
    pub duration: Option<u64>,
    /// 1-based ordinal among identical invocations within one test
    pub iteration: u32,
    /// Whether the data came from, or was written to, the recordings file
    pub saved: bool,
}

impl Recording {
    pub fn new(args: Vec<String>, stdin: Option<Payload>) -> Self {
        Self {
            args,
            stdin,
            stdout: None,
            stderr: None,
            rc: None,
            duration: None,
            iteration: 1,
            saved: false,
        }
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    /// Encode into the persisted mapping.
    ///
    /// `args`, `rc`, `duration` and `iteration` are always present; `stdin`,
    /// `stdout` and `stderr` only when set.
    pub fn to_encoded_dict(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert(
            "args".into(),
            Value::Sequence(self.args.iter().cloned().map(Value::String).collect()),
        );
        map.insert(
            "rc".into(),
            self.rc.map(|rc| Value::Number(rc.into())).unwrap_or(Value::Null),
        );
        map.insert(
            "duration".into(),
            self.duration
                .map(|us| Value::Number(us.into()))
                .unwrap_or(Value::Null),
        );
        map.insert("iteration".into(), Value::Number(self.iteration.into()));

        for (key, value) in [
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ] {
            if let Some(payload) = value {
                map.insert(key.into(), encode_value(Some(payload)));
            }
        }

        map
    }

    /// Build a recording from a persisted mapping. Missing keys keep their
    /// defaults: no args, iteration 1, everything else absent.
    pub fn from_encoded_dict(data: &Mapping) -> Result<Self, RecordingError> {
        let mut recording = Recording::new(Vec::new(), None);

        if let Some(args) = data.get("args") {
            recording.args = decode_args(args)?;
        }
        if let Some(iteration) = data.get("iteration") {
            recording.iteration = match iteration {
                Value::Null => 1,
                other => other
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| invalid("iteration", other))?,
            };
        }
        if let Some(rc) = data.get("rc") {
            recording.rc = match rc {
                Value::Null => None,
                other => Some(
                    other
                        .as_i64()
                        .and_then(|n| i32::try_from(n).ok())
                        .ok_or_else(|| invalid("rc", other))?,
                ),
            };
        }
        if let Some(duration) = data.get("duration") {
            recording.duration = decode_duration(duration)?;
        }
        if let Some(stdin) = data.get("stdin") {
            recording.stdin = decode_payload("stdin", stdin)?;
        }
        if let Some(stdout) = data.get("stdout") {
            recording.stdout = decode_payload("stdout", stdout)?;
        }
        if let Some(stderr) = data.get("stderr") {
            recording.stderr = decode_payload("stderr", stderr)?;
        }

        Ok(recording)
    }

    /// Parse one entry of the `recordings` sequence.
    pub fn from_encoded_value(value: &Value) -> Result<Self, RecordingError> {
        match value.as_mapping() {
            Some(mapping) => Self::from_encoded_dict(mapping),
            None => Err(RecordingError::NotAMapping(value.clone())),
        }
    }

    /// Overwrite identity and payload from `other`. `saved` is left alone.
    pub fn copy_from(&mut self, other: &Recording) {
        self.args = other.args.clone();
        self.stdin = other.stdin.clone();
        self.stdout = other.stdout.clone();
        self.stderr = other.stderr.clone();
        self.rc = other.rc;
        self.iteration = other.iteration;
        self.duration = other.duration;
    }

    /// `iteration: None` matches any iteration.
    pub fn matches(&self, args: &[String], stdin: Option<&Payload>, iteration: Option<u32>) -> bool {
        self.args == args
            && self.stdin.as_ref() == stdin
            && iteration.map_or(true, |n| self.iteration == n)
    }
}

impl PartialEq for Recording {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.args, other.stdin.as_ref(), Some(other.iteration))
    }
}

fn invalid(field: &'static str, value: &Value) -> RecordingError {
    RecordingError::InvalidField {
        field,
        value: value.clone(),
    }
}

fn decode_args(value: &Value) -> Result<Vec<String>, RecordingError> {
    let Some(items) = value.as_sequence() else {
        return Err(invalid("args", value));
    };
    items
        .iter()
        .map(|item| match decode_payload("args", item)? {
            Some(payload) => Ok(payload.to_string_lossy().into_owned()),
            None => Err(invalid("args", item)),
        })
        .collect()
}

fn decode_duration(value: &Value) -> Result<Option<u64>, RecordingError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(us) = n.as_u64() {
                return Ok(Some(us));
            }
            // Older files stored fractional microseconds.
            match n.as_f64() {
                Some(us) if us.is_finite() && us >= 0.0 => Ok(Some(us.round() as u64)),
                _ => Err(invalid("duration", value)),
            }
        }
        other => Err(invalid("duration", other)),
    }
}

fn decode_payload(field: &'static str, value: &Value) -> Result<Option<Payload>, RecordingError> {
    decode_value(value.clone()).map_err(|source| RecordingError::Payload { field, source })
}
