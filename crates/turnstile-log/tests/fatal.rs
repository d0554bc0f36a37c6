//! `fatal` ends the process, so it is exercised in a child copy of this
//! test binary.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use turnstile_log::{DiagnosticLog, LogConfig, NullSink};

/// Set in the child: the file its shutdown hooks write to.
const CHILD_MARKER: &str = "TURNSTILE_LOG_FATAL_MARKER";

/// Child side: two hooks, the second reading back the last record.
fn die(marker: &Path) -> ! {
    let log = Arc::new(DiagnosticLog::with_sink(LogConfig::default(), NullSink).unwrap());

    let first = marker.to_path_buf();
    log.register_shutdown_hook(move || std::fs::write(&first, "first\n").unwrap());

    let second = marker.to_path_buf();
    let seen = Arc::clone(&log);
    log.register_shutdown_hook(move || {
        let last = &seen.recent(1)[0];
        let mut file = OpenOptions::new().append(true).open(&second).unwrap();
        writeln!(file, "second {} {}", last.level.label(), last.message).unwrap();
    });

    log.info("about to give up");
    log.fatal("giving up");
}

#[test]
fn test_fatal_records_runs_hooks_and_exits_with_status_1() {
    if let Some(marker) = std::env::var_os(CHILD_MARKER) {
        die(Path::new(&marker));
    }

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("hooks");

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "test_fatal_records_runs_hooks_and_exits_with_status_1"])
        .env(CHILD_MARKER, &marker)
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
    assert_eq!(
        std::fs::read_to_string(&marker).unwrap(),
        "first\nsecond FATAL giving up\n"
    );
}
