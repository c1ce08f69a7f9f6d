//! Utility modules

pub mod paths;

pub use paths::{
    auto_fuzzy_root, config_path, recordings_dir, recordings_file, sanitize_test_name,
};
