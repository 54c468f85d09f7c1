use super::roles::{CONDITIONS_JSON, EDITOR_ITEMS_JSON, PROPERTIES_JSON};
use crate::services::fs_utils::path_utils::resolve_safe_path;
use crate::services::vdf::TreeValue;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Style keys tried, in order, to find an item's folder.
const PREFERRED_STYLES: &[&str] = &["BEE2_CLEAN", "ANY_STYLE"];

const ICON_ROOT: &str = "resources/BEE2/items";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPaths {
    pub editor_items: PathBuf,
    pub properties: PathBuf,
    pub vbsp_config: Option<PathBuf>,
}

/// One item of a package, as described by its manifest entry.
///
/// Construction never fails. Anything missing or malformed is recorded in
/// `problems` and the item stays usable for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub item_folder: Option<String>,
    pub full_item_path: Option<PathBuf>,
    pub paths: Option<ItemPaths>,
    pub icon: Option<PathBuf>,
    /// The `Properties` block of `properties.json`, if present.
    pub details: Option<serde_json::Value>,
    pub problems: Vec<String>,
}

impl Item {
    pub fn new(package_dir: &Path, entry: &TreeValue) -> Item {
        let id = entry
            .get_ignore_case("ID")
            .and_then(TreeValue::as_str)
            .unwrap_or_default()
            .to_string();
        let mut item = Item {
            name: id.clone(),
            id,
            item_folder: None,
            full_item_path: None,
            paths: None,
            icon: None,
            details: None,
            problems: Vec::new(),
        };
        if item.id.is_empty() {
            item.problems.push("Item has no ID".to_string());
        }

        let Some(folder) = style_folder(entry) else {
            item.problems
                .push(format!("No item folder found for item {}", item.id));
            return item;
        };
        let folder = folder.to_lowercase();
        let full_item_path = match resolve_safe_path(&package_dir.join("items"), &folder) {
            Ok(p) => p,
            Err(e) => {
                item.problems.push(e);
                return item;
            }
        };

        let conditions = full_item_path.join(CONDITIONS_JSON);
        let paths = ItemPaths {
            editor_items: full_item_path.join(EDITOR_ITEMS_JSON),
            properties: full_item_path.join(PROPERTIES_JSON),
            vbsp_config: conditions.is_file().then_some(conditions),
        };

        let editor_items = item.read_json(&paths.editor_items);
        let sub_type = editor_items.as_ref().and_then(first_sub_type);
        match sub_type.and_then(|s| s.get("Name")).and_then(|n| n.as_str()) {
            Some(name) => item.name = name.to_string(),
            None if editor_items.is_some() => item
                .problems
                .push("Invalid editoritems - missing SubType Name".to_string()),
            None => {}
        }

        let properties = item.read_json(&paths.properties);
        item.details = properties
            .as_ref()
            .and_then(|p| p.get("Properties"))
            .cloned();

        item.icon = item
            .details
            .as_ref()
            .and_then(|d| d.get("Icon"))
            .and_then(|icon| icon.get("0"))
            .and_then(|v| v.as_str())
            .map(|icon| package_dir.join(ICON_ROOT).join(icon))
            .or_else(|| {
                // Palette images carry a leading "palette/" segment.
                let image = sub_type?.get("Palette")?.get("Image")?.as_str()?;
                let (_, rest) = image.split_once('/')?;
                Some(package_dir.join(ICON_ROOT).join(rest))
            });

        item.item_folder = Some(folder);
        item.full_item_path = Some(full_item_path);
        item.paths = Some(paths);
        log::debug!("Added item: {} (id: {})", item.name, item.id);
        item
    }

    /// Both required documents are on disk.
    pub fn exists(&self) -> bool {
        self.paths
            .as_ref()
            .is_some_and(|p| p.editor_items.is_file() && p.properties.is_file())
    }

    pub fn is_degraded(&self) -> bool {
        !self.problems.is_empty()
    }

    fn read_json(&mut self, path: &Path) -> Option<serde_json::Value> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                self.problems.push(format!("Missing {file_name}!"));
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.problems.push(format!("Invalid {file_name}: {e}"));
                None
            }
        }
    }
}

/// Folder named by `Version.Styles`: a preferred style, else the first one.
/// A style is either the folder itself or a block with a `folder` key.
fn style_folder(entry: &TreeValue) -> Option<String> {
    let version = entry.get_ignore_case("Version")?;
    let version = version.one_or_many().into_iter().next()?;
    let TreeValue::Object(styles) = version.get_ignore_case("Styles")? else {
        return None;
    };

    let style = PREFERRED_STYLES
        .iter()
        .find_map(|key| styles.iter().find(|(k, _)| k.as_str() == *key).map(|(_, v)| v))
        .or_else(|| styles.first().map(|(_, v)| v))?;

    let folder = match style {
        TreeValue::Scalar(s) => s.as_str(),
        other => other.get_ignore_case("folder")?.as_str()?,
    };
    (!folder.trim().is_empty()).then(|| folder.trim().to_string())
}

fn first_sub_type(editor_items: &serde_json::Value) -> Option<&serde_json::Value> {
    let sub_type = editor_items.get("Item")?.get("Editor")?.get("SubType")?;
    match sub_type {
        serde_json::Value::Array(items) => items.first(),
        serde_json::Value::Object(map) if map.contains_key("0") => map.get("0"),
        other => Some(other),
    }
}
