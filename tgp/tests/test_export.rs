use std::path::PathBuf;
use std::process::Command;

use tgp::correlator::CallingContextCorrelator;
use tgp::export::{drain_into, CsvOptions, CsvSink, DrainSummary, JsonLinesSink, ProfileSink};
use tgp::profile::CallingContextProfile;
use tgp::replay::{replay_file, ReplaySummary};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/events.jsonl")
}

const CC_HEADER: &str = "ID,Class,Execution N.,Calling Context (init),Calling Context (submit),Calling Context (exec)";

fn expected_rows() -> [&'static str; 4] {
    [
        "1001,app.Download,1,main!App.start!,main!App.start!Pool.submit!,Worker.run!Download.run!",
        "1001,app.Download,2,main!App.start!,null,Worker.run!Download.run!",
        "1002,app.Parse,1,main!App.start!,main!App.start!Pool.submit!,Worker.run!Parse.call!",
        "1003,app.Retry,1,null,null,Timer.fire!Retry.run!",
    ]
}

#[test]
fn test_replay_fixture_into_csv() {
    let correlator = CallingContextCorrelator::default();
    let summary = replay_file(&fixture(), &correlator).unwrap();
    assert_eq!(summary, ReplaySummary { events: 9, recorded: 8, dropped: 1 });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles").join("tasks.csv");
    let mut sink = CsvSink::create(&path, CsvOptions::default()).unwrap();
    let written = drain_into(&correlator, &mut sink).unwrap();
    assert_eq!(written, DrainSummary { written: 4, failed: 0 });

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], CC_HEADER);
    assert_eq!(&lines[1..], expected_rows());
}

#[test]
fn test_csv_prefix_columns_for_concatenated_runs() {
    let correlator = CallingContextCorrelator::default();
    replay_file(&fixture(), &correlator).unwrap();

    let options = CsvOptions {
        print_header: false,
        prefix: Some("bench-a".to_string()),
        suffix: Some("3".to_string()),
        ..CsvOptions::default()
    };
    let mut buffer = Vec::new();
    {
        let mut sink = CsvSink::new(&mut buffer, options);
        drain_into(&correlator, &mut sink).unwrap();
    }
    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[3],
        "bench-a,1003,app.Retry,1,null,null,Timer.fire!Retry.run!,3"
    );
    assert!(lines.iter().all(|l| l.starts_with("bench-a,") && l.ends_with(",3")));
}

#[test]
fn test_replay_fixture_into_json_lines() {
    let correlator = CallingContextCorrelator::default();
    replay_file(&fixture(), &correlator).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.jsonl");
    let mut sink = JsonLinesSink::create(&path).unwrap();
    ProfileSink::<CallingContextProfile>::write_header(&mut sink).unwrap();
    for record in correlator.drain_all_profiles() {
        sink.write_record(&record).unwrap();
    }
    ProfileSink::<CallingContextProfile>::finish(&mut sink).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let values: Vec<serde_json::Value> =
        text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(values.len(), 4);
    assert_eq!(values[1]["exec_number"], 2);
    assert_eq!(values[1]["cc_init"], "main!App.start!");
    assert!(values[1]["cc_submit"].is_null());
}

#[test]
fn test_cli_replay_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out").join("cc.csv");

    let status = Command::new(env!("CARGO_BIN_EXE_tgp"))
        .env_clear()
        .args(["replay", "--mode", "calling-context", "--quiet", "--output"])
        .arg(&output)
        .arg(fixture())
        .status()
        .expect("Failed to run tgp");
    assert!(status.success(), "tgp exited with {status}");

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], CC_HEADER);
    assert_eq!(&lines[1..], expected_rows());
}

#[test]
fn test_cli_mode_mismatch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("g.csv");

    let status = Command::new(env!("CARGO_BIN_EXE_tgp"))
        .env_clear()
        .args(["replay", "--mode", "granularity", "-q", "-o"])
        .arg(&output)
        .arg(fixture())
        .status()
        .expect("Failed to run tgp");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_cli_invalid_environment_is_usage_error() {
    let status = Command::new(env!("CARGO_BIN_EXE_tgp"))
        .env_clear()
        .env("TGP_CSV_APPEND", "sometimes")
        .args(["demo", "-q", "--tasks", "1"])
        .status()
        .expect("Failed to run tgp");
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_cli_unopenable_output_falls_back_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("taken");
    std::fs::write(&blocker, "not a directory").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_tgp"))
        .env_clear()
        .args(["replay", "--mode", "calling-context", "-q", "-o"])
        .arg(blocker.join("cc.csv"))
        .arg(fixture())
        .output()
        .expect("Failed to run tgp");
    assert!(output.status.success(), "tgp exited with {}", output.status);

    let stderr = String::from_utf8(output.stderr).unwrap();
    let lines: Vec<&str> = stderr.lines().collect();
    assert!(lines.contains(&CC_HEADER));
    for row in expected_rows() {
        assert!(lines.contains(&row), "missing {row}");
    }
}
