//! Package model and the load/export lifecycle around it.

pub mod convert;
pub mod item;
pub mod manager;
pub mod model;
pub mod roles;
pub mod session;

pub use item::{Item, ItemPaths};
pub use manager::{package_id, HandleReleaser, NoopReleaser, PackageManager};
pub use model::{Package, PackageInfo, PackageInfoUpdate, PackageStats};
pub use roles::FileRole;
pub use session::{PackageSession, PackageState};

#[cfg(test)]
#[path = "tests/model_tests.rs"]
mod model_tests;

#[cfg(test)]
#[path = "tests/convert_tests.rs"]
mod convert_tests;

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod manager_tests;
