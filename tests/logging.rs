use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file_and_keeps_first_subscriber() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("logs").join("studio.log");

    layer_studio::logging::init(true, Some(&path)).expect("init with file");
    tracing::info!("layer studio test event");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(&path).expect("read log");
    assert!(contents.contains("layer studio test event"));

    // A second init is harmless and does not redirect output.
    let other = dir.path().join("other.log");
    layer_studio::logging::init(false, Some(&other)).expect("second init");
    layer_studio::logging::init(false, None).expect("third init");
    tracing::info!("after reinit");
    sleep(Duration::from_millis(100));
    assert!(fs::read_to_string(&path)
        .expect("read log")
        .contains("after reinit"));
}
