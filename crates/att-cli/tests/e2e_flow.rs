//! End-to-end tests for the complete attendance flow.
//!
//! Tests the full pipeline: directory load → sync from an export file →
//! reconcile → query, running the real binary against a temp config.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn att_binary() -> String {
    env!("CARGO_BIN_EXE_att").to_string()
}

const DIRECTORY: &str = r#"{
  "calendars": [
    {"name": "office", "slots": [
      {"weekday": 0, "hour_from": 9, "hour_to": 13},
      {"weekday": 0, "hour_from": 14, "hour_to": 18}
    ]},
    {"name": "night", "slots": [
      {"weekday": 0, "hour_from": "20:45", "hour_to": "05:00"},
      {"weekday": 1, "hour_from": "20:45", "hour_to": "05:00"}
    ]}
  ],
  "employees": [
    {"employee_number": "100", "name": "Aye Aye", "calendars": ["office"]},
    {"employee_number": "200", "name": "Ko Ko", "calendars": ["night"]}
  ]
}"#;

const ATTLOG: &str = "\
  100\t2025-03-03 09:05:00\t0\t1\t0\t0
  999\t2025-03-03 09:06:00\t0\t1\t0\t0
  100\t2025-03-03 18:10:00\t1\t1\t0\t0
  200\t2025-03-03 21:00:00\t0\t1\t0\t0
  200\t2025-03-04 05:10:00\t1\t1\t0\t0
";

/// A workspace with a config pointing at a temp database and one
/// export-file terminal.
struct Site {
    temp: TempDir,
    config: PathBuf,
}

impl Site {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(root.join("directory.json"), DIRECTORY).unwrap();
        std::fs::write(root.join("1_attlog.dat"), ATTLOG).unwrap();

        let config = root.join("config.toml");
        std::fs::write(
            &config,
            format!(
                r#"
database_path = "{db}"
state_dir = "{state}"
timezone = "Asia/Yangon"

[[devices]]
name = "gate"
export_path = "{attlog}"
"#,
                db = root.join("data/att.db").display(),
                state = root.join("state").display(),
                attlog = root.join("1_attlog.dat").display(),
            ),
        )
        .unwrap();
        Self { temp, config }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn att(&self, args: &[&str]) -> Output {
        Command::new(att_binary())
            .env("HOME", self.path())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run att")
    }

    fn att_ok(&self, args: &[&str]) -> String {
        let output = self.att(args);
        assert!(
            output.status.success(),
            "att {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

#[test]
fn test_sync_reconciles_day_and_night_shifts() {
    let site = Site::new();
    let directory = site.path().join("directory.json");

    let loaded = site.att_ok(&["directory", "load", directory.to_str().unwrap()]);
    assert_eq!(
        loaded,
        "Loaded 2 calendars and 2 employees (0 earlier punches linked)\n"
    );

    let synced = site.att_ok(&["sync"]);
    assert!(
        synced.contains("gate: fetched 5, staged 5 new (0 duplicates, 1 unlinked, 0 before lookback)"),
        "unexpected sync output: {synced}"
    );
    assert!(synced.contains("Reconciled 4 punches: 2 opened, 2 closed"));

    let sessions = site.att_ok(&["sessions", "--json"]);
    let sessions: serde_json::Value = serde_json::from_str(&sessions).unwrap();
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    for session in sessions {
        assert_eq!(session["state"], "closed", "session: {session}");
    }

    // The night session spans midnight and is stored in UTC (+06:30).
    let night = sessions
        .iter()
        .find(|s| s["employee_number"] == "200")
        .unwrap();
    assert_eq!(night["check_in"], "2025-03-03T14:30:00Z");
    assert_eq!(night["check_out"], "2025-03-03T22:40:00Z");

    let unlinked = site.att_ok(&["punches", "--unlinked", "--json"]);
    let unlinked: serde_json::Value = serde_json::from_str(&unlinked).unwrap();
    assert_eq!(unlinked.as_array().unwrap().len(), 1);
}

#[test]
fn test_second_sync_is_idempotent() {
    let site = Site::new();
    let directory = site.path().join("directory.json");
    site.att_ok(&["directory", "load", directory.to_str().unwrap()]);
    site.att_ok(&["sync"]);

    let again = site.att_ok(&["sync", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&again).unwrap();
    assert_eq!(report["synced"][0]["staged"]["inserted"], 0);
    assert_eq!(report["synced"][0]["staged"]["duplicates"], 5);
    assert_eq!(report["reconciled"]["processed"], 0);

    let sessions = site.att_ok(&["sessions", "--json"]);
    let sessions: serde_json::Value = serde_json::from_str(&sessions).unwrap();
    assert_eq!(sessions.as_array().unwrap().len(), 2);
}

#[test]
fn test_late_directory_links_waiting_punches() {
    let site = Site::new();
    site.att_ok(&["sync"]);

    let pending = site.att_ok(&["status", "--json"]);
    let status: serde_json::Value = serde_json::from_str(&pending).unwrap();
    assert_eq!(status["punches"]["unlinked"], 5);

    let directory = site.path().join("directory.json");
    let loaded = site.att_ok(&["directory", "load", directory.to_str().unwrap()]);
    assert!(loaded.contains("(4 earlier punches linked)"), "{loaded}");

    let reconciled = site.att_ok(&["reconcile"]);
    assert!(reconciled.starts_with("Reconciled 4 punches"), "{reconciled}");
}

#[test]
fn test_missing_export_fails_sync() {
    let site = Site::new();
    std::fs::remove_file(site.path().join("1_attlog.dat")).unwrap();

    let output = site.att(&["sync"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 1 devices failed"), "{stderr}");

    let status = site.att_ok(&["status"]);
    assert!(status.contains("last error"), "{status}");
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(att_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8(output.stdout).unwrap();
    for command in ["sync", "stage", "reconcile", "status", "sessions", "punches", "directory", "device", "explain"] {
        assert!(help.contains(command), "help should list {command}");
    }
}
