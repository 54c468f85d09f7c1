use super::convert::{convert_to_tree, convert_to_vdf, ProgressBand};
use crate::services::vdf::{decode, DecodeContext};
use crate::test_utils::{init_logger, write_demo_tree, DEMO_MANIFEST};
use crate::types::errors::{CodecError, PipelineError};
use crate::types::progress::{ProgressEvent, ProgressSink};
use std::fs;
use tempfile::TempDir;

const BAND: ProgressBand = ProgressBand { from: 10, to: 50 };

#[test]
fn test_convert_to_tree_rewrites_documents() {
    init_logger();
    let tmp = TempDir::new().unwrap();
    write_demo_tree(tmp.path());
    let (sink, mut rx) = ProgressSink::channel();

    let report = convert_to_tree(tmp.path(), &sink, BAND).unwrap();
    assert_eq!(report.converted, 6);
    assert_eq!(report.removed, 1);

    let door = tmp.path().join("items/demo_door");
    assert!(door.join("editoritems.json").is_file());
    assert!(door.join("vbsp_config.json").is_file());
    assert!(!door.join("editoritems.txt").exists());
    assert!(!door.join("vbsp_config.cfg").exists());
    assert!(!tmp.path().join("items/demo_button/Thumbs.db").exists());
    assert!(tmp.path().join("resources/BEE2/items/demo/door.png").is_file());

    let editor: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(door.join("editoritems.json")).unwrap()).unwrap();
    assert_eq!(
        editor["Item"]["Description"]["desc_0"],
        "Demo Door does things."
    );
    assert_eq!(editor["Item"]["Exporting"]["Condition"].as_array().unwrap().len(), 2);

    let conditions: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(door.join("vbsp_config.json")).unwrap()).unwrap();
    let keys: Vec<&String> = conditions["Conditions"].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.starts_with("Condition_")));

    let mut last = 0;
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Progress { percent, .. } = event {
            assert!((BAND.from..=BAND.to).contains(&percent));
            assert!(percent >= last);
            last = percent;
        }
    }
    assert!(last > BAND.from);
}

#[test]
fn test_round_trip_restores_vdf() {
    let tmp = TempDir::new().unwrap();
    write_demo_tree(tmp.path());
    let sink = ProgressSink::disabled();

    convert_to_tree(tmp.path(), &sink, BAND).unwrap();
    let report = convert_to_vdf(tmp.path(), "// test export", &sink, BAND).unwrap();
    assert_eq!(report.converted, 6);
    assert!(!tmp.path().join("info.json").exists());

    let exported = fs::read_to_string(tmp.path().join("info.txt")).unwrap();
    assert!(exported.starts_with("// test export\n"));
    let ctx = DecodeContext::new("info.txt");
    assert_eq!(
        decode(&exported, &ctx).unwrap(),
        decode(DEMO_MANIFEST, &ctx).unwrap()
    );

    let conditions =
        fs::read_to_string(tmp.path().join("items/demo_door/vbsp_config.cfg")).unwrap();
    assert_eq!(conditions.matches("\"Condition\"").count(), 2);
    assert!(!conditions.contains("Condition_"));

    let editor = fs::read_to_string(tmp.path().join("items/demo_door/editoritems.txt")).unwrap();
    assert!(editor.contains("\"\" \"Demo Door does things.\""));
    assert!(!editor.contains("desc_0"));
}

#[test]
fn test_convert_to_tree_reports_broken_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("info.txt"), "\"ID\" \"X\"\n").unwrap();
    let broken = tmp.path().join("items/bad/editoritems.txt");
    fs::create_dir_all(broken.parent().unwrap()).unwrap();
    fs::write(&broken, "\"Item\"\n{\n\t\"Type\" \"A\"\n").unwrap();

    let err = convert_to_tree(tmp.path(), &ProgressSink::disabled(), BAND).unwrap_err();
    match err {
        PipelineError::Codec {
            path,
            source: CodecError::Parse { file, .. },
        } => {
            assert_eq!(path, broken);
            assert_eq!(file, "items/bad/editoritems.txt");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_convert_to_vdf_reports_invalid_json() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("info.json"), "{\n  \"ID\": \n}").unwrap();

    let err = convert_to_vdf(tmp.path(), "", &ProgressSink::disabled(), BAND).unwrap_err();
    match err {
        PipelineError::Codec {
            source: CodecError::Parse { file, line, .. },
            ..
        } => {
            assert_eq!(file, "info.json");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Nothing is deleted on failure.
    assert!(tmp.path().join("info.json").is_file());
}

#[test]
fn test_convert_ignores_passthrough_json() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.json"), "{}").unwrap();
    fs::write(tmp.path().join("readme.txt"), "hello").unwrap();
    let sink = ProgressSink::disabled();

    assert_eq!(convert_to_vdf(tmp.path(), "", &sink, BAND).unwrap().converted, 0);
    assert_eq!(convert_to_tree(tmp.path(), &sink, BAND).unwrap().converted, 0);
    assert!(tmp.path().join("notes.json").is_file());
    assert!(tmp.path().join("readme.txt").is_file());
}

#[test]
fn test_unreadable_root_fails_the_sweep() {
    let tmp = TempDir::new().unwrap();
    let gone = tmp.path().join("gone");
    let sink = ProgressSink::disabled();

    let err = convert_to_tree(&gone, &sink, BAND).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }), "{err}");
    let err = convert_to_vdf(&gone, "", &sink, BAND).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }), "{err}");
}
