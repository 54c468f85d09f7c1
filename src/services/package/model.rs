use super::item::Item;
use super::roles::MANIFEST_JSON;
use crate::services::vdf::TreeValue;
use crate::types::errors::{CodecError, PipelineError, PipelineResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub path: PathBuf,
}

/// Partial update of [`PackageInfo`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PackageInfoUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStats {
    pub items: usize,
    pub degraded_items: usize,
}

/// An extracted package and the items its manifest lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Archive or manifest the package was opened from.
    pub location: PathBuf,
    pub display_name: String,
    pub working_dir: PathBuf,
    pub items: Vec<Item>,
}

impl Package {
    /// Read `info.json` under `working_dir` and build every listed item.
    pub fn load(location: &Path, working_dir: &Path) -> PipelineResult<Package> {
        let manifest = read_manifest(working_dir)?;
        if !matches!(manifest, TreeValue::Object(_)) {
            return Err(PipelineError::ManifestInvalid(
                "manifest root must be a block".to_string(),
            ));
        }

        let items: Vec<Item> = manifest
            .get_ignore_case("Item")
            .map(|entries| {
                entries
                    .one_or_many()
                    .into_iter()
                    .map(|entry| Item::new(working_dir, entry))
                    .collect()
            })
            .unwrap_or_default();

        let display_name = manifest
            .get_ignore_case("Name")
            .and_then(TreeValue::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                location
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default()
            });

        for item in items.iter().filter(|i| i.is_degraded()) {
            log::warn!("Item {} loaded with problems: {}", item.id, item.problems.join("; "));
        }

        Ok(Package {
            location: location.to_path_buf(),
            display_name,
            working_dir: working_dir.to_path_buf(),
            items,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.working_dir.join(MANIFEST_JSON)
    }

    pub fn get_item_by_id(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_item_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Build an item from a manifest entry and append it.
    pub fn add_item(&mut self, entry: &TreeValue) -> &Item {
        let item = Item::new(&self.working_dir, entry);
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    /// Remove the first item whose id or name matches.
    pub fn remove_item(&mut self, identifier: &str) -> Option<Item> {
        let idx = self
            .items
            .iter()
            .position(|item| item.name == identifier || item.id == identifier)?;
        Some(self.items.remove(idx))
    }

    pub fn remove_all_items(&mut self) {
        self.items.clear();
    }

    /// The working directory still holds the converted manifest.
    pub fn is_loaded(&self) -> bool {
        self.manifest_path().is_file()
    }

    pub fn stats(&self) -> PackageStats {
        PackageStats {
            items: self.items.len(),
            degraded_items: self.items.iter().filter(|i| i.is_degraded()).count(),
        }
    }

    pub fn info(&self) -> PipelineResult<PackageInfo> {
        let manifest = read_manifest(&self.working_dir)?;
        let field = |key: &str| {
            manifest
                .get_ignore_case(key)
                .and_then(TreeValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(PackageInfo {
            id: field("ID"),
            name: field("Name"),
            description: field("Desc"),
            author: field("Author"),
            path: self.working_dir.clone(),
        })
    }

    /// Write the given fields into `info.json`, keeping everything else.
    pub fn update_info(&mut self, update: PackageInfoUpdate) -> PipelineResult<PackageInfo> {
        let mut manifest = read_manifest(&self.working_dir)?;
        let changes = [
            ("Name", update.name),
            ("Desc", update.description),
            ("Author", update.author),
        ];
        for (key, value) in changes {
            if let Some(value) = value {
                manifest.insert(key, TreeValue::Scalar(value));
            }
        }
        write_manifest(&self.working_dir, &manifest)?;

        let info = self.info()?;
        if !info.name.is_empty() {
            self.display_name = info.name.clone();
        }
        Ok(info)
    }
}

pub fn read_manifest(working_dir: &Path) -> PipelineResult<TreeValue> {
    let path = working_dir.join(MANIFEST_JSON);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::ManifestMissing { path })
        }
        Err(e) => return Err(PipelineError::io(path, e)),
    };
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| PipelineError::ManifestInvalid(format!("{MANIFEST_JSON}: {e}")))?;
    TreeValue::from_json(&value).map_err(|e| match e {
        CodecError::Structural(_) => PipelineError::codec(&path, e),
        other => PipelineError::ManifestInvalid(other.to_string()),
    })
}

pub fn write_manifest(working_dir: &Path, manifest: &TreeValue) -> PipelineResult<()> {
    let path = working_dir.join(MANIFEST_JSON);
    let json = serde_json::to_string_pretty(&manifest.to_json())
        .map_err(|e| PipelineError::ManifestInvalid(e.to_string()))?;
    crate::services::fs_utils::file_utils::write_atomic(&path, json.as_bytes())
        .map_err(|e| PipelineError::io(&path, std::io::Error::other(e)))
}
