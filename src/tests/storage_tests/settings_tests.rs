// Settings Tests - Testing Settings defaults, persistence and validation

use crate::storage::settings::MAX_ATTACHMENTS;
use crate::storage::Settings;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    assert_eq!(settings.max_content_chars, 5000);
    assert_eq!(settings.max_attachments, 5);
    assert_eq!(settings.search_debounce_ms, 300);
    assert_eq!(settings.recipient_search_limit, 20);
    assert_eq!(settings.message_page_limit, 500);
    assert_eq!(settings.conversation_page_limit, 200);
    assert_eq!(settings.preview_chars, 100);
    assert_eq!(settings.fetch_timeout_ms, 15_000);
    assert_eq!(settings.database_path, "./app_data/propchat.db");
}

#[test]
fn test_settings_durations() {
    let settings = Settings::default();
    assert_eq!(settings.search_debounce(), Duration::from_millis(300));
    assert_eq!(settings.fetch_timeout(), Duration::from_secs(15));
}

#[test]
fn test_settings_load_missing_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings =
        Settings::load(temp_dir.path().join("absent.json")).expect("Failed to load settings");
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_settings_load_empty_file() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let settings = Settings::load(temp_file.path()).expect("Failed to load settings");
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_settings_save_and_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config").join("propchat.json");

    let mut settings = Settings::default();
    settings.search_debounce_ms = 150;
    settings.preview_chars = 40;
    settings.database_path = "/tmp/other.db".to_string();
    settings.save(&path).expect("Failed to save settings");

    let loaded = Settings::load(&path).expect("Failed to load settings");
    assert_eq!(loaded, settings);
}

#[test]
fn test_settings_partial_file_uses_defaults() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), r#"{ "search_debounce_ms": 500 }"#)
        .expect("Failed to write settings");

    let settings = Settings::load(temp_file.path()).expect("Failed to load settings");
    assert_eq!(settings.search_debounce_ms, 500);
    assert_eq!(settings.max_content_chars, 5000);
    assert_eq!(settings.fetch_timeout_ms, 15_000);
}

#[test]
fn test_settings_load_clamps_values() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(
        temp_file.path(),
        r#"{ "max_attachments": 12, "fetch_timeout_ms": 0, "preview_chars": 0 }"#,
    )
    .expect("Failed to write settings");

    let settings = Settings::load(temp_file.path()).expect("Failed to load settings");
    assert_eq!(settings.max_attachments, MAX_ATTACHMENTS);
    assert_eq!(settings.fetch_timeout_ms, 15_000);
    assert_eq!(settings.preview_chars, 100);
}

#[test]
fn test_settings_load_malformed_file() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), "{ not json").expect("Failed to write settings");

    assert!(Settings::load(temp_file.path()).is_err());
}
