use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file_and_ignores_second_init() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    franz::logging::init(true, Some(path.clone()));
    // A second call must neither panic nor replace the installed subscriber.
    franz::logging::init(false, None);
    tracing::info!(step = 1, "test line");

    sleep(Duration::from_millis(200));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("test line"));
    assert!(!contents.contains("\u{1b}["), "file output must be plain text");
}
