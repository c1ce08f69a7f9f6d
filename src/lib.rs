pub mod config;
pub mod process;
pub mod repro;
pub mod session;
pub mod util;

pub use config::{Settings, SettingsError};
pub use process::{
    CompletedProcess, InterceptingRunner, ProcessError, ProcessRunner, RealProcessRunner, Redirect,
    RunOptions,
};
pub use repro::{
    FuzzyMatchers, Payload, RecordMode, Recording, Recordings, RecordingsError, FUZZY_PLACEHOLDER,
};
pub use session::{Session, SessionBuilder, SessionError, SessionGuard};
