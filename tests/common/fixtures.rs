//! Scratch project fixtures
//!
//! A `TestProject` is a temporary directory shaped like a crate, with a test
//! source file under `tests/`, so recordings paths and auto fuzzy matching
//! behave the way they do for a real test suite.

use std::path::{Path, PathBuf};

use pvcr::{RecordMode, Settings};
use tempfile::TempDir;

pub struct TestProject {
    /// TempDir handle (keeps directory alive until dropped)
    _dir: TempDir,
    /// Project root, the directory holding `tests/`
    pub root: PathBuf,
    /// Path of the (never compiled) test source file
    pub test_file: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().to_path_buf();
        let tests_dir = root.join("tests");
        std::fs::create_dir_all(&tests_dir).expect("Failed to create tests dir");
        let test_file = tests_dir.join("sample.rs");
        std::fs::write(&test_file, "// test source\n").expect("Failed to write test file");

        Self {
            _dir: dir,
            root,
            test_file,
        }
    }

    /// A scratch recordings file outside the conventional layout
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings isolated from the environment, without replay delays
pub fn quiet_settings() -> Settings {
    Settings {
        wait: false,
        ..Settings::default()
    }
}

pub fn settings_with_mode(mode: RecordMode) -> Settings {
    Settings {
        record_mode: mode,
        ..quiet_settings()
    }
}

/// Parse a recordings file as plain YAML
pub fn read_yaml(path: &Path) -> serde_yaml::Value {
    let contents = std::fs::read_to_string(path).expect("Failed to read recordings file");
    serde_yaml::from_str(&contents).expect("Recordings file is not YAML")
}

/// Number of entries under `recordings` in a file
pub fn entry_count(path: &Path) -> usize {
    read_yaml(path)
        .get("recordings")
        .and_then(|v| v.as_sequence())
        .map(|seq| seq.len())
        .unwrap_or(0)
}
