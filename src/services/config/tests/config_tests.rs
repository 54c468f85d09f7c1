use super::*;
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let tmp = TempDir::new().unwrap();
    let service = ConfigService::load(&tmp.path().join("settings.json"));
    let config = service.get_config();

    assert_eq!(config.removal_attempts, 5);
    assert_eq!(config.removal_base_delay_ms, 200);
    assert_eq!(config.archive_engine, ArchiveEngineKind::Builtin);
    assert_eq!(config.free_space_margin_bytes, 50 * 1024 * 1024);
    assert_eq!(config.provenance_comment, "// Exported by BeePEE");
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{ "removalAttempts": 2, "archiveEngine": "sevenZip", "sevenZipPath": "C:/7z/7z.exe" }"#,
    )
    .unwrap();

    let config = ConfigService::load(&path).get_config();

    assert_eq!(config.removal_attempts, 2);
    assert_eq!(config.archive_engine, ArchiveEngineKind::SevenZip);
    assert_eq!(config.seven_zip_path, PathBuf::from("C:/7z/7z.exe"));
    assert_eq!(config.removal_base_delay_ms, 200);
}

#[test]
fn test_malformed_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert_eq!(ConfigService::load(&path).get_config(), PipelineConfig::default());
}

#[test]
fn test_reload_picks_up_changes() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("settings.json");
    let service = ConfigService::load(&path);
    assert_eq!(service.get_config().removal_attempts, 5);

    std::fs::write(&path, r#"{ "removalAttempts": 9 }"#).unwrap();
    assert_eq!(service.reload().removal_attempts, 9);
    assert_eq!(service.get_config().removal_attempts, 9);
}

#[test]
fn test_with_config_reload_is_noop() {
    let config = PipelineConfig {
        removal_attempts: 1,
        ..PipelineConfig::default()
    };
    let service = ConfigService::with_config(config.clone());
    assert_eq!(service.reload(), config);
}
