//! What each file in a working directory is, judged by its name.

use std::path::Path;

pub const MANIFEST_VDF: &str = "info.txt";
pub const MANIFEST_JSON: &str = "info.json";
pub const EDITOR_ITEMS_JSON: &str = "editoritems.json";
pub const PROPERTIES_JSON: &str = "properties.json";
pub const CONDITIONS_JSON: &str = "vbsp_config.json";

/// Leftovers from older tools and OS metadata; deleted on load.
const OBSOLETE_NAMES: &[&str] = &["thumbs.db", ".ds_store"];
const OBSOLETE_EXTENSIONS: &[&str] = &["vmx", "bak"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Manifest,
    ItemDefinition,
    ItemProperties,
    /// Holds repeatable condition blocks.
    ConditionConfig,
    Obsolete,
    Passthrough,
}

impl FileRole {
    /// Role of a file as found in an extracted archive.
    pub fn of_vdf_file(path: &Path) -> FileRole {
        let Some(name) = lower_file_name(path) else {
            return FileRole::Passthrough;
        };
        match name.as_str() {
            "info.txt" => FileRole::Manifest,
            "editoritems.txt" => FileRole::ItemDefinition,
            "properties.txt" => FileRole::ItemProperties,
            "vbsp_config.cfg" => FileRole::ConditionConfig,
            n if OBSOLETE_NAMES.contains(&n) => FileRole::Obsolete,
            n if OBSOLETE_EXTENSIONS
                .iter()
                .any(|ext| n.rsplit_once('.').is_some_and(|(_, e)| e == *ext)) =>
            {
                FileRole::Obsolete
            }
            _ => FileRole::Passthrough,
        }
    }

    /// Role of a converted tree document in a working directory.
    pub fn of_tree_file(path: &Path) -> FileRole {
        let Some(name) = lower_file_name(path) else {
            return FileRole::Passthrough;
        };
        match name.as_str() {
            MANIFEST_JSON => FileRole::Manifest,
            EDITOR_ITEMS_JSON => FileRole::ItemDefinition,
            PROPERTIES_JSON => FileRole::ItemProperties,
            CONDITIONS_JSON => FileRole::ConditionConfig,
            _ => FileRole::Passthrough,
        }
    }

    pub fn is_convertible(self) -> bool {
        self.vdf_name().is_some()
    }

    /// File name of the VDF form.
    pub fn vdf_name(self) -> Option<&'static str> {
        match self {
            FileRole::Manifest => Some(MANIFEST_VDF),
            FileRole::ItemDefinition => Some("editoritems.txt"),
            FileRole::ItemProperties => Some("properties.txt"),
            FileRole::ConditionConfig => Some("vbsp_config.cfg"),
            FileRole::Obsolete | FileRole::Passthrough => None,
        }
    }

    /// File name of the tree document form.
    pub fn tree_name(self) -> Option<&'static str> {
        match self {
            FileRole::Manifest => Some(MANIFEST_JSON),
            FileRole::ItemDefinition => Some(EDITOR_ITEMS_JSON),
            FileRole::ItemProperties => Some(PROPERTIES_JSON),
            FileRole::ConditionConfig => Some(CONDITIONS_JSON),
            FileRole::Obsolete | FileRole::Passthrough => None,
        }
    }
}

fn lower_file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_lowercase())
}
