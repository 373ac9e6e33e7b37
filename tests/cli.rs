use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const CHASE: &str = "Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #\n\
DEBIT,01/05/2024,COFFEE SHOP,-42.50,DEBIT_CARD,957.50,\n\
DEBIT,01/06/2024,RENT,-100.00,ACH_DEBIT,857.50,\n";

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        std::fs::create_dir_all(ws.uploads()).unwrap();
        let settings = serde_json::json!({
            "uploads_dir": ws.uploads(),
            "sheet": {"backend": "local", "path": ws.ledger(), "date_format": "%m/%d/%Y"},
            "rules": [{"pattern": "coffee", "category": "Dining"}],
            "logging": {"dir": ws.dir.path().join("logs")}
        });
        std::fs::write(ws.config(), serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        ws
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn uploads(&self) -> PathBuf {
        self.path().join("uploads")
    }

    fn ledger(&self) -> PathBuf {
        self.path().join("ledger.csv")
    }

    fn config(&self) -> PathBuf {
        self.path().join("settings.json")
    }

    fn upload(&self, name: &str, body: &str) {
        std::fs::write(self.uploads().join(name), body).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("budgetsync").unwrap();
        cmd.env_remove("RUST_LOG").env("NO_COLOR", "1").arg("--config").arg(self.config());
        cmd
    }

    fn ledger_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.ledger())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[test]
fn sync_appends_new_rows_once() {
    let ws = Workspace::new();
    ws.upload("chase.csv", CHASE);

    ws.cmd()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 new transaction(s) appended"));

    let lines = ws.ledger_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "01/05/2024,-42.50,COFFEE SHOP,chase_checking,Dining");
    assert_eq!(lines[1], "01/06/2024,-100.00,RENT,chase_checking,");

    ws.cmd().arg("sync").assert().success();
    assert_eq!(ws.ledger_lines().len(), 2);
}

#[test]
fn sync_skips_rows_already_in_ledger() {
    let ws = Workspace::new();
    std::fs::write(ws.ledger(), "01/06/2024,-$100.00,RENT,chase_checking,Housing\n").unwrap();
    ws.upload("chase.csv", CHASE);

    ws.cmd().arg("sync").assert().success();

    let lines = ws.ledger_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("COFFEE SHOP"));
}

#[test]
fn sync_dry_run_leaves_ledger_untouched() {
    let ws = Workspace::new();
    ws.upload("chase.csv", CHASE);

    ws.cmd()
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would append"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!ws.ledger().exists());
}

#[test]
fn unrecognized_file_fails_run_but_others_are_synced() {
    let ws = Workspace::new();
    ws.upload("a_chase.csv", CHASE);
    ws.upload("b_mystery.csv", "Foo,Bar\n1,2\n");

    ws.cmd()
        .arg("sync")
        .assert()
        .failure()
        .stdout(predicate::str::contains("b_mystery.csv"))
        .stderr(predicate::str::contains("1 file(s) were not recognized"));

    assert_eq!(ws.ledger_lines().len(), 2);
}

#[test]
fn empty_uploads_directory_is_an_error() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no CSV files found"));
}

#[test]
fn sync_writes_timestamped_log_file() {
    let ws = Workspace::new();
    ws.upload("chase.csv", CHASE);
    ws.cmd().arg("sync").assert().success();

    let logs: Vec<_> = std::fs::read_dir(ws.path().join("logs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].ends_with("_budgetsync.log"), "{logs:?}");
}

#[test]
fn check_prints_records_and_warnings() {
    let ws = Workspace::new();
    let file = ws.path().join("chase.csv");
    std::fs::write(&file, format!("{CHASE}DEBIT,bad-date,BROKEN,-1.00,DEBIT_CARD,0,\n")).unwrap();

    ws.cmd()
        .arg("check")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Chase Checking"))
        .stdout(predicate::str::contains("Dining"))
        .stdout(predicate::str::contains("1 row(s) skipped"));

    assert!(!ws.ledger().exists());
}

#[test]
fn check_unknown_format_fails() {
    let ws = Workspace::new();
    let file = ws.path().join("mystery.csv");
    std::fs::write(&file, "Foo,Bar\n1,2\n").unwrap();

    ws.cmd()
        .arg("check")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unrecognized format in mystery.csv"));
}

#[test]
fn formats_lists_builtins() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("chase_checking"))
        .stdout(predicate::str::contains("capital_one"));
}

#[test]
fn rules_test_reports_match() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["rules", "test", "COFFEE SHOP DOWNTOWN"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dining"));
    ws.cmd()
        .args(["rules", "test", "RENT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("uncategorized"));
}

#[test]
fn init_writes_settings_and_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("conf").join("settings.json");
    let uploads = dir.path().join("incoming");

    Command::cargo_bin("budgetsync")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("init")
        .arg("--uploads-dir")
        .arg(&uploads)
        .arg("--local-sheet")
        .arg(dir.path().join("ledger.csv"))
        .assert()
        .success();
    assert!(config.exists());
    assert!(uploads.is_dir());

    Command::cargo_bin("budgetsync")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
