//! BEE package ingestion and export pipeline.
//!
//! Archives are extracted into a working directory, their VDF documents are
//! converted to editable tree documents, and the reverse runs on export.

pub mod services;
pub mod types;
#[cfg(test)]
pub mod test_utils;

pub use services::package::{PackageManager, PackageSession};
pub use types::errors::{PipelineError, PipelineResult};
