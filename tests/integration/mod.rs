//! Integration tests for pvcr
//!
//! These tests drive the recordings store, the intercepting runner and the
//! CLI together against real files (and real programs on unix).

#[path = "../common/mod.rs"]
pub mod common;

pub mod record_modes;
pub mod record_replay;
