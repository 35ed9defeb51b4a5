// Config fallback as seen by the binaries: the load error is logged once the
// logger is installed instead of being dropped.

mod common;

use log::Level;
use std::path::PathBuf;

use square_compute::logging::init_from_config_file;

use common::{capture_logs, take_logs};

fn temp_config(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "square-compute-{}-{}.toml",
        name,
        std::process::id()
    ));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn malformed_config_is_reported_after_logger_init() {
    let path = temp_config("malformed", "[kernel]\nelement_count = \"many\"");

    capture_logs();
    let config = init_from_config_file(&path, "warn");
    let records = take_logs();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.kernel.element_count, 32);
    let warnings: Vec<&String> = records
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, message)| message)
        .collect();
    assert_eq!(warnings.len(), 1, "records: {records:?}");
    assert!(warnings[0].starts_with("Failed to load"));
    assert!(warnings[0].contains("Failed to parse config file"));
    assert!(warnings[0].ends_with("Using defaults."));
}

#[test]
fn valid_config_is_applied_without_warnings() {
    let path = temp_config("valid", "[kernel]\nelement_count = 64\n");

    capture_logs();
    let config = init_from_config_file(&path, "warn");
    let records = take_logs();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.kernel.element_count, 64);
    assert!(records.iter().all(|(level, _)| *level != Level::Warn));
}
