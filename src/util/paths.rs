//! Path conventions for recordings files and configuration

use std::path::{Path, PathBuf};

/// Directory, next to the test file, that holds its recordings
pub const RECORDINGS_DIRNAME: &str = "recordings";

pub const RECORDINGS_EXTENSION: &str = "yaml";

/// Config file looked up in the current directory when `PVCR_CONFIG` is unset
pub const CONFIG_FILENAME: &str = "pvcr.toml";

pub const ENV_CONFIG: &str = "PVCR_CONFIG";

/// Get the recordings directory of a test file (`<dir>/recordings/<stem>`)
pub fn recordings_dir(test_file: &Path) -> PathBuf {
    let dir = test_file.parent().unwrap_or_else(|| Path::new(""));
    let stem = test_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(RECORDINGS_DIRNAME).join(stem)
}

/// Get the recordings file of one test (`<dir>/recordings/<stem>/<test>.yaml`)
pub fn recordings_file(test_file: &Path, test_name: &str) -> PathBuf {
    recordings_dir(test_file).join(format!(
        "{}.{}",
        sanitize_test_name(test_name),
        RECORDINGS_EXTENSION
    ))
}

/// Make a test name usable as a file name: `::` becomes `__` and path
/// separators become `_`.
pub fn sanitize_test_name(test_name: &str) -> String {
    test_name.replace("::", "__").replace(['/', '\\'], "_")
}

/// Directory above the test file's directory, scrubbed from arguments when
/// automatic fuzzy matching is enabled.
pub fn auto_fuzzy_root(test_file: &Path) -> Option<&Path> {
    test_file
        .parent()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
}

/// Get the config file path (`$PVCR_CONFIG`, else `./pvcr.toml`)
pub fn config_path() -> PathBuf {
    std::env::var_os(ENV_CONFIG)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME))
}
