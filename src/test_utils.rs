use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        // Initialize logger only once
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const DEMO_MANIFEST: &str = r#""ID" "DEMO_PKG"
"Name" "Demo Package"
"Desc" "Fixture package"
"Item"
{
	"ID" "DEMO_DOOR"
	"Version"
	{
		"Styles"
		{
			"BEE2_CLEAN" "demo_door"
		}
	}
}
"Item"
{
	"ID" "DEMO_BUTTON"
	"Version"
	{
		"Styles"
		{
			"ANY_STYLE"
			{
				"Folder" "Demo_Button"
			}
		}
	}
}
"#;

/// `editoritems.txt` with a blank-keyed description line and a repeated `Condition` pair.
pub fn demo_editoritems(name: &str) -> String {
    format!(
        r#""Item"
{{
	"Type" "ITEM_{upper}"
	"Editor"
	{{
		"SubType"
		{{
			"Name" "{name}"
			"Palette"
			{{
				"Image" "palette/demo/{lower}.png"
			}}
		}}
	}}
	"Description"
	{{
		"" "{name} does things."
	}}
	"Exporting"
	{{
		"Condition"
		{{
			"Result" "first"
		}}
		"Condition"
		{{
			"Result" "second"
		}}
	}}
}}
"#,
        upper = name.to_uppercase().replace(' ', "_"),
        lower = name.to_lowercase().replace(' ', "_"),
    )
}

pub const DEMO_PROPERTIES: &str = r#""Properties"
{
	"Authors" "Fixture"
	"Icon"
	{
		"0" "demo/door.png"
	}
}
"#;

pub const DEMO_CONDITIONS: &str = r#""Conditions"
{
	"Condition"
	{
		"instance" "<ITEM_DEMO_DOOR>"
		"changeInstance" "instances/door_a.vmf"
	}
	"Condition"
	{
		"instance" "<ITEM_DEMO_DOOR>"
		"changeInstance" "instances/door_b.vmf"
	}
}
"#;

/// Files of a two-item package, relative to the archive root.
pub fn demo_package_files() -> Vec<(String, Vec<u8>)> {
    vec![
        ("info.txt".into(), DEMO_MANIFEST.as_bytes().to_vec()),
        (
            "items/demo_door/editoritems.txt".into(),
            demo_editoritems("Demo Door").into_bytes(),
        ),
        (
            "items/demo_door/properties.txt".into(),
            DEMO_PROPERTIES.as_bytes().to_vec(),
        ),
        (
            "items/demo_door/vbsp_config.cfg".into(),
            DEMO_CONDITIONS.as_bytes().to_vec(),
        ),
        (
            "items/demo_button/editoritems.txt".into(),
            demo_editoritems("Demo Button").into_bytes(),
        ),
        (
            "items/demo_button/properties.txt".into(),
            DEMO_PROPERTIES.as_bytes().to_vec(),
        ),
        ("items/demo_button/Thumbs.db".into(), b"junk".to_vec()),
        ("resources/BEE2/items/demo/door.png".into(), vec![0x89, b'P', b'N', b'G']),
    ]
}

/// Helper: write a ZIP archive with the given entries.
pub fn create_zip(path: &Path, files: &[(String, Vec<u8>)]) -> PathBuf {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (entry_name, content) in files {
        writer.start_file(entry_name.clone(), options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path.to_path_buf()
}

/// Write the demo package as loose files under `dir`.
pub fn write_demo_tree(dir: &Path) {
    for (name, content) in demo_package_files() {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}
