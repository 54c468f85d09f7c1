use super::model::Package;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Lifecycle of the session's package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageState {
    Idle,
    Preparing,
    Extracting,
    Converting,
    Loading,
    Ready,
    Closing,
    Failed,
}

impl PackageState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: PackageState) -> bool {
        use PackageState::*;
        match (self, next) {
            (_, Failed) => self != Idle,
            (Idle | Ready | Failed, Preparing) => true,
            // Opening an already-extracted directory skips straight ahead.
            (Idle | Ready | Failed, Converting | Loading) => true,
            (Preparing, Extracting) => true,
            (Extracting, Converting) => true,
            (Converting, Loading) => true,
            (Loading, Ready) => true,
            (Ready | Failed, Closing) => true,
            (Closing, Idle) => true,
            _ => false,
        }
    }
}

/// The one "current package" handle, owned by whoever drives the manager.
#[derive(Debug)]
pub struct PackageSession {
    state: PackageState,
    current: Option<Package>,
    last_export_path: Option<PathBuf>,
}

impl Default for PackageSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageSession {
    pub fn new() -> Self {
        Self {
            state: PackageState::Idle,
            current: None,
            last_export_path: None,
        }
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    pub fn current(&self) -> Option<&Package> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Package> {
        self.current.as_mut()
    }

    pub fn is_loaded(&self) -> bool {
        self.state == PackageState::Ready && self.current.is_some()
    }

    pub fn last_export_path(&self) -> Option<&Path> {
        self.last_export_path.as_deref()
    }

    pub(crate) fn transition(&mut self, next: PackageState) {
        if !self.state.can_transition_to(next) {
            log::warn!("Unexpected package state change {:?} -> {:?}", self.state, next);
        }
        log::debug!("Package state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Drop the current package without touching its working directory.
    pub(crate) fn clear(&mut self) -> Option<Package> {
        self.last_export_path = None;
        self.current.take()
    }

    /// Make `package` current, replacing any previous one.
    pub(crate) fn install(&mut self, package: Package) -> &Package {
        self.transition(PackageState::Ready);
        self.current.insert(package)
    }

    pub(crate) fn set_last_export_path(&mut self, path: PathBuf) {
        self.last_export_path = Some(path);
    }
}
