//! Record mode semantics across sessions sharing one recordings file
//!
//! Each test plays two sessions against the same file, the way a test suite
//! is run once to record and again to replay.

use super::common::fixtures::{entry_count, quiet_settings, settings_with_mode, TestProject};
use super::common::programs::NumberedProgram;
use pvcr::{ProcessError, RecordMode, RunOptions, Session, Settings};
use std::sync::Arc;

fn session(project: &TestProject, settings: Settings, program: &Arc<NumberedProgram>) -> Session {
    Session::builder(&project.test_file, "modes")
        .settings(settings)
        .inner_runner(program.clone())
        .build()
        .expect("Failed to build session")
}

#[test]
fn test_new_mode_records_then_replays() {
    let project = TestProject::new();

    let recorder = NumberedProgram::new();
    let first = session(&project, settings_with_mode(RecordMode::New), &recorder);
    let out = first.run(["deploy", "--dry-run"], &RunOptions::default()).unwrap();
    assert_eq!(out.stdout_lossy(), "deploy --dry-run #1");
    assert_eq!(recorder.calls(), 1);

    let replayer = NumberedProgram::new();
    let second = session(&project, settings_with_mode(RecordMode::New), &replayer);
    let out = second.run(["deploy", "--dry-run"], &RunOptions::default()).unwrap();
    assert_eq!(out.stdout_lossy(), "deploy --dry-run #1");
    assert_eq!(replayer.calls(), 0);

    // Unrecorded commands still run and are appended.
    second.run(["status"], &RunOptions::default()).unwrap();
    assert_eq!(replayer.calls(), 1);
    assert_eq!(entry_count(&second.recordings_path()), 2);
}

#[test]
fn test_none_mode_never_writes() {
    let project = TestProject::new();
    let program = NumberedProgram::new();
    let session = session(&project, settings_with_mode(RecordMode::None), &program);

    session.run(["ls"], &RunOptions::default()).unwrap();
    session.run(["ls"], &RunOptions::default()).unwrap();

    assert_eq!(program.calls(), 2);
    assert!(!session.recordings_path().exists());
}

#[test]
fn test_none_mode_replays_existing_recordings() {
    let project = TestProject::new();
    let recorder = NumberedProgram::new();
    session(&project, quiet_settings(), &recorder)
        .run(["ls"], &RunOptions::default())
        .unwrap();

    let program = NumberedProgram::new();
    let replay = session(&project, settings_with_mode(RecordMode::None), &program);
    let out = replay.run(["ls"], &RunOptions::default()).unwrap();
    assert_eq!(out.stdout_lossy(), "ls #1");
    assert_eq!(program.calls(), 0);
}

#[test]
fn test_all_mode_reruns_and_overwrites() {
    let project = TestProject::new();
    let recorder = NumberedProgram::new();
    session(&project, quiet_settings(), &recorder)
        .run(["date"], &RunOptions::default())
        .unwrap();

    let rerun = NumberedProgram::with_rc(4);
    let session = session(&project, settings_with_mode(RecordMode::All), &rerun);
    let out = session.run(["date"], &RunOptions::default()).unwrap();
    assert_eq!(rerun.calls(), 1);
    assert_eq!(out.returncode, Some(4));

    let persisted = session.recordings().persisted().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].rc, Some(4));
}

#[test]
fn test_once_mode_records_only_without_file() {
    let project = TestProject::new();

    let recorder = NumberedProgram::new();
    let first = session(&project, settings_with_mode(RecordMode::Once), &recorder);
    first.run(["echo", "hello"], &RunOptions::default()).unwrap();
    first.run(["echo", "world"], &RunOptions::default()).unwrap();
    assert_eq!(entry_count(&first.recordings_path()), 2);

    let program = NumberedProgram::new();
    let second = session(&project, settings_with_mode(RecordMode::Once), &program);
    let out = second.run(["echo", "hello"], &RunOptions::default()).unwrap();
    assert_eq!(out.stdout_lossy(), "echo hello #1");

    let err = second
        .run(["echo", "new_command"], &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, ProcessError::Blocked { ref args } if args == &["echo", "new_command"]));
    assert_eq!(program.calls(), 0);
    assert_eq!(entry_count(&second.recordings_path()), 2);
}

#[test]
fn test_block_run_blocks_unrecorded_in_every_mode() {
    for mode in RecordMode::all() {
        let project = TestProject::new();
        let program = NumberedProgram::new();
        let settings = Settings {
            block_run: true,
            ..settings_with_mode(*mode)
        };
        let session = session(&project, settings, &program);

        let err = session.run(["curl", "example.com"], &RunOptions::default()).unwrap_err();
        assert!(err.is_blocked(), "mode {mode} did not block");
        assert_eq!(program.calls(), 0);
    }
}

#[test]
fn test_repeated_commands_replay_in_call_order() {
    let project = TestProject::new();
    let recorder = NumberedProgram::new();
    let first = session(&project, quiet_settings(), &recorder);
    first.run(["next"], &RunOptions::default()).unwrap();
    first.run(["next"], &RunOptions::default()).unwrap();

    let iterations: Vec<u32> = first
        .recordings()
        .persisted()
        .unwrap()
        .iter()
        .map(|r| r.iteration)
        .collect();
    assert_eq!(iterations, vec![1, 2]);

    let program = NumberedProgram::new();
    let second = session(&project, quiet_settings(), &program);
    assert_eq!(
        second.run(["next"], &RunOptions::default()).unwrap().stdout_lossy(),
        "next #1"
    );
    assert_eq!(
        second.run(["next"], &RunOptions::default()).unwrap().stdout_lossy(),
        "next #2"
    );
    assert_eq!(program.calls(), 0);

    // A third call has no recording left and runs for real.
    assert_eq!(
        second.run(["next"], &RunOptions::default()).unwrap().stdout_lossy(),
        "next #1"
    );
    assert_eq!(program.calls(), 1);
    assert_eq!(entry_count(&second.recordings_path()), 3);
}

#[test]
fn test_stdin_is_part_of_the_identity() {
    let project = TestProject::new();
    let recorder = NumberedProgram::new();
    let first = session(&project, quiet_settings(), &recorder);
    first
        .run(["cat"], &RunOptions::new().stdin("first input"))
        .unwrap();
    first
        .run(["cat"], &RunOptions::new().stdin("second"))
        .unwrap();

    let program = NumberedProgram::new();
    let settings = Settings {
        block_run: true,
        ..quiet_settings()
    };
    let second = session(&project, settings, &program);
    let out = second
        .run(["cat"], &RunOptions::new().stdin("second"))
        .unwrap();
    assert_eq!(out.stdout_lossy(), "cat #2");
    assert_eq!(out.stderr_lossy(), "read 6 bytes");

    let err = second.run(["cat"], &RunOptions::default()).unwrap_err();
    assert!(err.is_blocked());
}

#[test]
fn test_clean_resets_history_and_file() {
    let project = TestProject::new();
    let program = NumberedProgram::new();
    let session = session(&project, quiet_settings(), &program);
    session.run(["a"], &RunOptions::default()).unwrap();
    session.run(["b"], &RunOptions::default()).unwrap();
    assert_eq!(session.recordings().history().len(), 2);

    session.recordings().clean(true).unwrap();
    assert!(session.recordings().history().is_empty());
    assert_eq!(entry_count(&session.recordings_path()), 0);

    session.run(["a"], &RunOptions::default()).unwrap();
    assert_eq!(program.calls(), 3);
}
