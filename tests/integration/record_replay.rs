//! End-to-end record/replay against real programs
//!
//! These spawn `echo`, `sh` and friends, so they only run on unix.

#![cfg(unix)]

use super::common::fixtures::{quiet_settings, read_yaml, TestProject};
use pvcr::{Payload, RecordMode, RunOptions, Session, Settings, FUZZY_PLACEHOLDER};

/// Settings for a replay run: anything unrecorded is a failure
fn replay_settings() -> Settings {
    Settings {
        block_run: true,
        ..quiet_settings()
    }
}

/// Shell snippet that bumps a counter file in the working directory and
/// prints the new value, so every real execution is observable.
const COUNTER: &str = "n=$(cat counter 2>/dev/null || echo 0); n=$((n+1)); echo $n > counter; echo $n";

#[test]
fn test_echo_is_recorded_in_conventional_file() {
    let project = TestProject::new();
    let session = Session::builder(&project.test_file, "tests::echo_hello")
        .settings(quiet_settings())
        .build()
        .unwrap();

    let out = session.run(["echo", "hello"], &RunOptions::default()).unwrap();
    assert_eq!(out.stdout_lossy(), "hello\n");
    assert!(out.success());

    let path = project
        .root
        .join("tests")
        .join("recordings")
        .join("sample")
        .join("tests__echo_hello.yaml");
    assert_eq!(session.recordings_path(), path);

    let doc = read_yaml(&path);
    let entry = &doc["recordings"][0];
    assert_eq!(entry["args"][0].as_str(), Some("echo"));
    assert_eq!(entry["args"][1].as_str(), Some("hello"));
    assert_eq!(entry["rc"].as_i64(), Some(0));
    assert_eq!(entry["iteration"].as_u64(), Some(1));
    assert_eq!(entry["stdout"].as_str(), Some("hello\n"));
    assert!(entry["duration"].as_u64().is_some());
}

#[test]
fn test_replay_does_not_execute_again() {
    let project = TestProject::new();
    let options = RunOptions::new().cwd(&project.root);

    let first = Session::builder(&project.test_file, "counter")
        .settings(quiet_settings())
        .build()
        .unwrap();
    let a = first.run(["sh", "-c", COUNTER], &options).unwrap();
    let b = first.run(["sh", "-c", COUNTER], &options).unwrap();
    assert_eq!(a.stdout_lossy(), "1\n");
    assert_eq!(b.stdout_lossy(), "2\n");

    let second = Session::builder(&project.test_file, "counter")
        .settings(replay_settings())
        .build()
        .unwrap();
    let a = second.run(["sh", "-c", COUNTER], &options).unwrap();
    let b = second.run(["sh", "-c", COUNTER], &options).unwrap();
    assert_eq!(a.stdout_lossy(), "1\n");
    assert_eq!(b.stdout_lossy(), "2\n");

    let counter = std::fs::read_to_string(project.root.join("counter")).unwrap();
    assert_eq!(counter.trim(), "2");
}

#[test]
fn test_exit_code_and_stderr_are_replayed() {
    let project = TestProject::new();
    let script = "echo broken >&2; exit 7";

    let first = Session::builder(&project.test_file, "failing")
        .settings(quiet_settings())
        .build()
        .unwrap();
    let real = first.run(["sh", "-c", script], &RunOptions::default()).unwrap();

    let second = Session::builder(&project.test_file, "failing")
        .settings(replay_settings())
        .build()
        .unwrap();
    let replayed = second.run(["sh", "-c", script], &RunOptions::default()).unwrap();

    assert_eq!(replayed, real);
    assert_eq!(replayed.returncode, Some(7));
    assert_eq!(replayed.stderr_lossy(), "broken\n");
}

#[test]
fn test_binary_output_round_trips() {
    let project = TestProject::new();
    let script = r"printf '\377\376\000\001'";

    let first = Session::builder(&project.test_file, "binary")
        .settings(quiet_settings())
        .build()
        .unwrap();
    let real = first.run(["sh", "-c", script], &RunOptions::default()).unwrap();
    assert_eq!(real.stdout_bytes(), b"\xff\xfe\x00\x01");

    let doc = read_yaml(&first.recordings_path());
    assert_eq!(
        doc["recordings"][0]["stdout"]["__base64__"].as_str(),
        Some("//4AAQ==")
    );

    let second = Session::builder(&project.test_file, "binary")
        .settings(replay_settings())
        .build()
        .unwrap();
    let replayed = second.run(["sh", "-c", script], &RunOptions::default()).unwrap();
    assert_eq!(replayed.stdout, Some(Payload::Bytes(vec![0xff, 0xfe, 0x00, 0x01])));
}

#[test]
fn test_stdin_is_fed_and_recorded() {
    let project = TestProject::new();
    let session = Session::builder(&project.test_file, "stdin")
        .settings(quiet_settings())
        .build()
        .unwrap();

    let out = session
        .run(["cat"], &RunOptions::new().stdin("line one\nline two\n"))
        .unwrap();
    assert_eq!(out.stdout_lossy(), "line one\nline two\n");

    let doc = read_yaml(&session.recordings_path());
    assert_eq!(
        doc["recordings"][0]["stdin"].as_str(),
        Some("line one\nline two\n")
    );
}

#[test]
fn test_fuzzy_matcher_replays_across_temp_paths() {
    let project = TestProject::new();
    let recordings = project.file("fuzzy.yaml");

    let run_in = |settings: Settings| {
        let scratch = tempfile::tempdir().unwrap();
        let target = scratch.path().join("out.txt");
        let session = Session::builder(&project.test_file, "fuzzy")
            .settings(settings)
            .recordings_file(&recordings)
            .fuzzy_matcher(r"^.+/(out\.txt)$")
            .build()
            .unwrap();
        session
            .run(["touch", target.to_str().unwrap()], &RunOptions::default())
            .unwrap();
        target.exists()
    };

    assert!(run_in(quiet_settings()));
    // Different temp dir, same normalized args: replayed, so nothing is touched.
    assert!(!run_in(replay_settings()));

    let doc = read_yaml(&recordings);
    assert_eq!(
        doc["recordings"][0]["args"][1].as_str(),
        Some(format!("{FUZZY_PLACEHOLDER}out.txt").as_str())
    );
}

#[test]
fn test_auto_fuzzy_match_scrubs_project_root() {
    let project = TestProject::new();
    let settings = Settings {
        auto_fuzzy_match: true,
        ..quiet_settings()
    };
    let data = project.root.join("data.txt");
    std::fs::write(&data, "payload\n").unwrap();

    let session = Session::builder(&project.test_file, "auto")
        .settings(settings)
        .build()
        .unwrap();
    let out = session
        .run(["cat", data.to_str().unwrap()], &RunOptions::default())
        .unwrap();
    assert_eq!(out.stdout_lossy(), "payload\n");

    let doc = read_yaml(&session.recordings_path());
    assert_eq!(
        doc["recordings"][0]["args"][1].as_str(),
        Some(format!("{FUZZY_PLACEHOLDER}/data.txt").as_str())
    );
}

#[test]
fn test_replay_waits_for_recorded_duration() {
    let project = TestProject::new();
    let first = Session::builder(&project.test_file, "slow")
        .settings(quiet_settings())
        .build()
        .unwrap();
    first.run(["sleep", "0.2"], &RunOptions::default()).unwrap();

    let second = Session::builder(&project.test_file, "slow")
        .settings(Settings {
            record_mode: RecordMode::None,
            ..replay_settings()
        })
        .wait(true)
        .build()
        .unwrap();
    let started = std::time::Instant::now();
    second.run(["sleep", "0.2"], &RunOptions::default()).unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_millis(150));

    let quick = Session::builder(&project.test_file, "slow")
        .settings(replay_settings())
        .build()
        .unwrap();
    let started = std::time::Instant::now();
    quick.run(["sleep", "0.2"], &RunOptions::default()).unwrap();
    assert!(started.elapsed() < std::time::Duration::from_millis(150));
}
