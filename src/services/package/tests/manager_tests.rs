use super::manager::{package_id, HandleReleaser, PackageManager};
use super::model::PackageInfoUpdate;
use super::session::{PackageSession, PackageState};
use crate::services::archive::{ArchiveEngine, ExtractionResult, ZipEngine};
use crate::services::config::models::PipelineConfig;
use crate::services::reconciler::DELETION_MARKER;
use crate::services::vdf::{decode, DecodeContext};
use crate::test_utils::{create_zip, demo_package_files, init_logger, DEMO_MANIFEST};
use crate::types::errors::{ErrorKind, PipelineError};
use crate::types::progress::{ProgressEvent, ProgressSink};
use futures_util::future::{BoxFuture, FutureExt};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        packages_dir: root.join("packages"),
        removal_attempts: 2,
        removal_base_delay_ms: 1,
        free_space_margin_bytes: 0,
        ..Default::default()
    }
}

fn demo_archive(root: &Path) -> PathBuf {
    create_zip(&root.join("demo.bpee"), &demo_package_files())
}

#[derive(Default)]
struct CountingReleaser {
    calls: AtomicUsize,
}

impl HandleReleaser for CountingReleaser {
    fn release_all(&self) -> BoxFuture<'_, Result<(), String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }.boxed()
    }
}

/// Delegates to the zip engine after a delay, keeping the operation lock held.
struct SlowEngine;

impl ArchiveEngine for SlowEngine {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn extract<'a>(
        &'a self,
        archive: &'a Path,
        dest: &'a Path,
        progress: &'a ProgressSink,
    ) -> BoxFuture<'a, crate::types::errors::PipelineResult<ExtractionResult>> {
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let engine = ZipEngine::new(0);
            engine.extract(archive, dest, progress).await
        }
        .boxed()
    }

    fn archive<'a>(
        &'a self,
        _source_dir: &'a Path,
        output: &'a Path,
        _progress: &'a ProgressSink,
    ) -> BoxFuture<'a, crate::types::errors::PipelineResult<()>> {
        async move {
            Err(PipelineError::ArchiveWrite {
                path: output.to_path_buf(),
                message: "not supported".to_string(),
            })
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_load_archive() {
    init_logger();
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let releaser = Arc::new(CountingReleaser::default());
    let manager = PackageManager::new(test_config(tmp.path())).with_releaser(releaser.clone());
    let mut session = PackageSession::new();
    let (sink, mut rx) = ProgressSink::channel();

    let package = manager.load_package(&mut session, &archive, &sink).await.unwrap();
    assert_eq!(package.display_name, "Demo Package");
    assert_eq!(package.items.len(), 2);
    assert_eq!(package.working_dir, tmp.path().join("packages").join("demo"));

    let door = package.get_item_by_id("DEMO_DOOR").unwrap();
    assert_eq!(door.name, "Demo Door");
    assert!(door.paths.as_ref().unwrap().vbsp_config.is_some());
    assert!(!door.is_degraded(), "{:?}", door.problems);
    let button = package.get_item_by_name("Demo Button").unwrap();
    assert_eq!(button.item_folder.as_deref(), Some("demo_button"));

    assert_eq!(session.state(), PackageState::Ready);
    assert!(session.is_loaded());
    assert_eq!(releaser.calls.load(Ordering::SeqCst), 1);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::File { .. })));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Progress {
            percent: 100,
            message: "Package loaded".to_string()
        })
    );
}

#[tokio::test]
async fn test_reload_replaces_previous_contents() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();
    let sink = ProgressSink::disabled();

    let working_dir = manager
        .load_package(&mut session, &archive, &sink)
        .await
        .unwrap()
        .working_dir
        .clone();
    let stray = working_dir.join("stray.txt");
    fs::write(&stray, "left over").unwrap();

    manager.load_package(&mut session, &archive, &sink).await.unwrap();
    assert!(!stray.exists());
    assert_eq!(session.current().unwrap().items.len(), 2);
}

#[tokio::test]
async fn test_load_extracted_directory() {
    let tmp = TempDir::new().unwrap();
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();
    let sink = ProgressSink::disabled();

    let archive = demo_archive(tmp.path());
    let working_dir = manager
        .load_package(&mut session, &archive, &sink)
        .await
        .unwrap()
        .working_dir
        .clone();

    // Reopening through the converted manifest skips extraction.
    let mut other = PackageSession::new();
    let package = manager
        .load_package(&mut other, &working_dir.join("info.json"), &sink)
        .await
        .unwrap();
    assert_eq!(package.working_dir, working_dir);
    assert_eq!(package.items.len(), 2);
}

#[tokio::test]
async fn test_load_missing_manifest() {
    let tmp = TempDir::new().unwrap();
    let archive = create_zip(
        &tmp.path().join("empty.zip"),
        &[("readme.txt".to_string(), b"nothing here".to_vec())],
    );
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();

    let err = manager
        .load_package(&mut session, &archive, &ProgressSink::disabled())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ManifestMissing { .. }));
    assert_eq!(session.state(), PackageState::Failed);
    assert!(session.current().is_none());
}

#[tokio::test]
async fn test_archive_without_manifest_keeps_existing_dir() {
    let tmp = TempDir::new().unwrap();
    let archive = create_zip(
        &tmp.path().join("loose.zip"),
        &[("items/x/editoritems.txt".to_string(), b"\"Item\"\n{\n}\n".to_vec())],
    );
    let releaser = Arc::new(CountingReleaser::default());
    let manager = PackageManager::new(test_config(tmp.path())).with_releaser(releaser.clone());
    let working_dir = manager.working_dir_for(&archive);
    fs::create_dir_all(&working_dir).unwrap();
    fs::write(working_dir.join("keep.txt"), "mine").unwrap();
    let mut session = PackageSession::new();
    let (sink, mut rx) = ProgressSink::channel();

    let err = manager
        .load_package(&mut session, &archive, &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ManifestMissing { .. }), "{err}");
    assert_eq!(session.state(), PackageState::Failed);
    assert_eq!(fs::read_to_string(working_dir.join("keep.txt")).unwrap(), "mine");
    assert!(!working_dir.join("items").exists());
    assert_eq!(releaser.calls.load(Ordering::SeqCst), 0);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Failed { kind, .. } = event {
            kinds.push(kind);
        }
    }
    assert_eq!(kinds, vec![ErrorKind::Load]);
}

#[tokio::test]
async fn test_corrupt_archive_discards_working_dir() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("broken.zip");
    fs::write(&archive, b"this is not a zip").unwrap();
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();
    let (sink, mut rx) = ProgressSink::channel();

    let err = manager
        .load_package(&mut session, &archive, &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Extraction { .. }), "{err}");
    assert!(!manager.working_dir_for(&archive).exists());

    let mut failed = false;
    while let Ok(event) = rx.try_recv() {
        failed |= matches!(event, ProgressEvent::Failed { .. });
    }
    assert!(failed);
}

#[tokio::test]
async fn test_broken_document_fails_conversion() {
    let tmp = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = demo_package_files()
        .into_iter()
        .map(|(name, content)| {
            if name == "items/demo_door/properties.txt" {
                // Block never closed.
                (name, b"\"Properties\"\n{\n\t\"Authors\" \"x\"\n".to_vec())
            } else {
                (name, content)
            }
        })
        .collect();
    let archive = create_zip(&tmp.path().join("broken_doc.zip"), &files);
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();

    let err = manager
        .load_package(&mut session, &archive, &ProgressSink::disabled())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Codec { .. }), "{err}");
    assert!(err.to_string().contains("properties.txt"));
    assert!(!manager.working_dir_for(&archive).exists());
}

#[tokio::test]
async fn test_export_round_trip() {
    init_logger();
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();
    let sink = ProgressSink::disabled();
    manager.load_package(&mut session, &archive, &sink).await.unwrap();

    let output = tmp.path().join("out").join("export.bpee");
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    let written = manager.export_to(&mut session, &output, &sink).await.unwrap();
    assert_eq!(written, output);
    assert_eq!(session.last_export_path(), Some(output.as_path()));

    let mut zip = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();
    assert!(names.iter().any(|n| n == "info.txt"));
    assert!(names.iter().any(|n| n == "items/demo_door/vbsp_config.cfg"));
    assert!(names.iter().any(|n| n == "resources/BEE2/items/demo/door.png"));
    assert!(!names.iter().any(|n| n.ends_with(".json")));
    assert!(!names.iter().any(|n| n.ends_with("Thumbs.db")));

    let mut manifest = String::new();
    zip.by_name("info.txt")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    let ctx = DecodeContext::new("info.txt");
    assert_eq!(
        decode(&manifest, &ctx).unwrap(),
        decode(DEMO_MANIFEST, &ctx).unwrap()
    );

    // The working directory keeps its tree documents.
    let working_dir = &session.current().unwrap().working_dir;
    assert!(working_dir.join("info.json").is_file());
    assert!(!working_dir.join("info.txt").exists());

    // Save reuses the last export location.
    fs::remove_file(&output).unwrap();
    assert_eq!(manager.save(&mut session, &sink).await.unwrap(), output);
    assert!(output.is_file());
}

#[tokio::test]
async fn test_save_requires_prior_export() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();
    let sink = ProgressSink::disabled();

    assert!(matches!(
        manager.save(&mut session, &sink).await,
        Err(PipelineError::NoPackage)
    ));

    manager.load_package(&mut session, &archive, &sink).await.unwrap();
    let err = manager.save(&mut session, &sink).await.unwrap_err();
    assert!(matches!(err, PipelineError::ArchiveWrite { .. }));
    assert!(err.to_string().contains("has not been exported"));
}

#[tokio::test]
async fn test_create_package() {
    let tmp = TempDir::new().unwrap();
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();
    let sink = ProgressSink::disabled();

    let package = manager
        .create_package(&mut session, "My Pack!", "Some items", "  ", &sink)
        .await
        .unwrap();
    assert_eq!(package.display_name, "My Pack!");
    assert!(package.items.is_empty());
    assert!(package.working_dir.join("items").is_dir());
    assert!(package.working_dir.join("resources").is_dir());

    let info = manager.package_info(&session).unwrap();
    assert!(info.id.starts_with("MYPACK_"));
    assert_eq!(info.description, "Some items");
    assert_eq!(info.author, "Unknown");

    let err = manager
        .create_package(&mut session, "   ", "", "", &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ManifestInvalid(_)));
}

#[tokio::test]
async fn test_update_package_info() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();

    assert!(matches!(
        manager
            .update_package_info(&mut session, PackageInfoUpdate::default())
            .await,
        Err(PipelineError::NoPackage)
    ));

    manager
        .load_package(&mut session, &archive, &ProgressSink::disabled())
        .await
        .unwrap();
    let info = manager
        .update_package_info(
            &mut session,
            PackageInfoUpdate {
                description: Some("Updated".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(info.id, "DEMO_PKG");
    assert_eq!(info.name, "Demo Package");
    assert_eq!(info.description, "Updated");
    assert_eq!(manager.package_info(&session).unwrap(), info);
}

#[tokio::test]
async fn test_close_with_remove() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();

    assert!(matches!(
        manager.close(&mut session, false).await,
        Err(PipelineError::NoPackage)
    ));

    let working_dir = manager
        .load_package(&mut session, &archive, &ProgressSink::disabled())
        .await
        .unwrap()
        .working_dir
        .clone();

    manager.close(&mut session, true).await.unwrap();
    assert_eq!(session.state(), PackageState::Idle);
    assert!(session.current().is_none());
    assert!(!working_dir.exists());
}

#[tokio::test]
async fn test_close_keeps_files_by_default() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path()));
    let mut session = PackageSession::new();

    let working_dir = manager
        .load_package(&mut session, &archive, &ProgressSink::disabled())
        .await
        .unwrap()
        .working_dir
        .clone();

    manager.close(&mut session, false).await.unwrap();
    assert!(working_dir.join("info.json").is_file());
    assert!(!session.is_loaded());
}

#[tokio::test]
async fn test_concurrent_operation_is_busy() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path())).with_engine(Arc::new(SlowEngine));
    let mut first = PackageSession::new();
    let mut second = PackageSession::new();
    let sink = ProgressSink::disabled();

    let (loaded, closed) = tokio::join!(
        manager.load_package(&mut first, &archive, &sink),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            manager.close(&mut second, false).await
        }
    );

    assert!(loaded.is_ok());
    assert!(matches!(closed, Err(PipelineError::Busy)));
}

#[tokio::test]
async fn test_create_while_busy_leaves_no_directory() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path())).with_engine(Arc::new(SlowEngine));
    let mut first = PackageSession::new();
    let mut second = PackageSession::new();
    let sink = ProgressSink::disabled();

    let (loaded, created) = tokio::join!(
        manager.load_package(&mut first, &archive, &sink),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            manager
                .create_package(&mut second, "Orphan", "", "", &sink)
                .await
                .map(|p| p.working_dir.clone())
        }
    );

    assert!(loaded.is_ok());
    assert!(matches!(created, Err(PipelineError::Busy)));
    let leftovers: Vec<String> = fs::read_dir(tmp.path().join("packages"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("ORPHAN_"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn test_export_failure_reports_export_kind() {
    let tmp = TempDir::new().unwrap();
    let archive = demo_archive(tmp.path());
    let manager = PackageManager::new(test_config(tmp.path())).with_engine(Arc::new(SlowEngine));
    let mut session = PackageSession::new();
    manager
        .load_package(&mut session, &archive, &ProgressSink::disabled())
        .await
        .unwrap();
    let (sink, mut rx) = ProgressSink::channel();

    let err = manager
        .export_to(&mut session, &tmp.path().join("out.bpee"), &sink)
        .await
        .unwrap_err();
    assert_eq!(err.kind_in(ErrorKind::Export), ErrorKind::Export);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Failed { kind, .. } = event {
            kinds.push(kind);
        }
    }
    assert_eq!(kinds, vec![ErrorKind::Export]);
    assert!(session.is_loaded());
}

#[test]
fn test_new_sweeps_stale_markers() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let stale = config
        .packages_dir
        .join(format!("demo{DELETION_MARKER}20240101-000000-abcd"));
    fs::create_dir_all(stale.join("items")).unwrap();
    fs::create_dir_all(config.packages_dir.join("kept")).unwrap();

    let _manager = PackageManager::new(config.clone());
    assert!(!stale.exists());
    assert!(config.packages_dir.join("kept").is_dir());
}

#[test]
fn test_working_dir_for() {
    let tmp = TempDir::new().unwrap();
    let manager = PackageManager::new(test_config(tmp.path()));
    assert_eq!(
        manager.working_dir_for(Path::new("/downloads/My Pack.bpee")),
        tmp.path().join("packages").join("My Pack")
    );
    assert_eq!(
        manager.working_dir_for(Path::new("/")),
        tmp.path().join("packages").join("package")
    );
}

#[test]
fn test_package_id() {
    let id = package_id("Cool Items 2!");
    let (base, suffix) = id.rsplit_once('_').unwrap();
    assert_eq!(base, "COOLITEMS2");
    assert_eq!(suffix.len(), 4);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}
