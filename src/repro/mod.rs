//! Deterministic record/replay of process invocations.
//!
//! - `codec`: text-safe encoding of stdin/stdout/stderr payloads
//! - `recording`: one captured invocation and its identity
//! - `fuzzy`: normalization of volatile arguments
//! - `store`: the per-test recordings file and record modes
//! - `runtime`: process-wide active session state

pub mod codec;
pub mod fuzzy;
pub mod recording;
pub mod runtime;
pub mod store;

pub use codec::{decode_value, encode_value, CodecError, Payload, BINARY_MARKER};
pub use fuzzy::{FuzzyMatchers, FUZZY_PLACEHOLDER};
pub use recording::{Recording, RecordingError};
pub use store::{ParseRecordModeError, RecordMode, Recordings, RecordingsError, RECORDINGS_KEY};
