use beepee_lib::services::config::PipelineConfig;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

static INIT: Once = Once::new();

pub struct TestContext {
    pub tmp: TempDir,
    pub config: PipelineConfig,
}

impl TestContext {
    pub fn path(&self) -> &Path {
        self.tmp.path()
    }
}

pub fn init_test_context() -> TestContext {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let settings = tmp.path().join("settings.json");
    fs::write(
        &settings,
        serde_json::json!({
            "packagesDir": tmp.path().join("packages"),
            "removalAttempts": 2,
            "removalBaseDelayMs": 1,
            "freeSpaceMarginBytes": 0
        })
        .to_string(),
    )
    .expect("Failed to write settings");

    let config = beepee_lib::services::config::ConfigService::load(&settings).get_config();
    TestContext { tmp, config }
}

pub fn write_zip(path: &Path, files: &[(&str, &str)]) -> PathBuf {
    let file = fs::File::create(path).expect("Failed to create archive");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in files {
        writer.start_file(*name, options).expect("start_file");
        writer.write_all(content.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish archive");
    path.to_path_buf()
}
