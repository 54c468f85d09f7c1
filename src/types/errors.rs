use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the VDF <-> tree document codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Malformed VDF text, attributed to the logical document it came from.
    #[error("Failed to parse {file} (line {line}): {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    /// A tree document broke the array-like invariant. Indicates a bug upstream.
    #[error("Malformed tree document: {0}")]
    Structural(String),
}

impl CodecError {
    /// Re-attribute a parse error to a named document.
    pub fn with_file(self, file: impl Into<String>) -> Self {
        match self {
            CodecError::Parse { line, message, .. } => CodecError::Parse {
                file: file.into(),
                line,
                message,
            },
            other => other,
        }
    }
}

/// Operation scope of a pipeline failure, as surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Extraction,
    Conversion,
    Load,
    Export,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to extract {archive}: {message}")]
    Extraction { archive: String, message: String },

    /// Never aborts an operation; carried so callers can log it uniformly.
    #[error("Could not clear {}: {message}", path.display())]
    Reconciliation { path: PathBuf, message: String },

    #[error("Failed to convert {}: {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Package is missing its manifest (expected {})", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("Invalid package manifest: {0}")]
    ManifestInvalid(String),

    #[error("Failed to write archive {}: {message}", path.display())]
    ArchiveWrite { path: PathBuf, message: String },

    #[error("No package loaded")]
    NoPackage,

    #[error("Operation in progress. Please wait.")]
    Busy,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn codec(path: impl Into<PathBuf>, source: CodecError) -> Self {
        PipelineError::Codec {
            path: path.into(),
            source,
        }
    }

    /// Kind of this failure when raised outside any export.
    pub fn kind(&self) -> ErrorKind {
        self.kind_in(ErrorKind::Load)
    }

    /// Kind of this failure when raised by `operation`. Failures that do not
    /// name a phase of their own take the operation's kind.
    pub fn kind_in(&self, operation: ErrorKind) -> ErrorKind {
        match self {
            PipelineError::Extraction { .. } | PipelineError::Reconciliation { .. } => {
                ErrorKind::Extraction
            }
            PipelineError::Codec { .. } => ErrorKind::Conversion,
            PipelineError::ManifestMissing { .. } | PipelineError::ManifestInvalid(_) => {
                ErrorKind::Load
            }
            PipelineError::ArchiveWrite { .. } => ErrorKind::Export,
            PipelineError::NoPackage | PipelineError::Busy | PipelineError::Io { .. } => {
                operation
            }
        }
    }

    /// True for failures that indicate a defect rather than bad user data.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            PipelineError::Codec {
                source: CodecError::Structural(_),
                ..
            }
        )
    }
}

// The UI only ever sees the message string.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

/// Error payload handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct UiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl UiError {
    /// Payload for `error` raised while running `operation`.
    pub fn scoped(error: &PipelineError, operation: ErrorKind) -> Self {
        UiError {
            kind: error.kind_in(operation),
            message: error.to_string(),
        }
    }
}

impl From<&PipelineError> for UiError {
    fn from(error: &PipelineError) -> Self {
        UiError {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
