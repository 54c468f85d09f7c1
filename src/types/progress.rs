//! Progress notifications for long-running package operations.
//!
//! Events are fire-and-forget: a dropped receiver never fails the operation
//! that produced them.

use crate::types::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Streaming event contract consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum ProgressEvent {
    /// Coarse phase progress with a human-readable message.
    #[serde(rename_all = "camelCase")]
    Progress { percent: u8, message: String },
    /// Per-file telemetry from an archive engine.
    #[serde(rename_all = "camelCase")]
    File { percent: u8, name: String },
    /// Emitted once when an operation fails.
    #[serde(rename_all = "camelCase")]
    Failed {
        kind: ErrorKind,
        message: String,
        error: String,
    },
}

/// Cloneable sender side of a progress channel.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// Create a sink together with the receiver the UI should drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn progress(&self, percent: u8, message: impl Into<String>) {
        self.send(ProgressEvent::Progress {
            percent: percent.min(100),
            message: message.into(),
        });
    }

    pub fn file(&self, percent: u8, name: impl Into<String>) {
        self.send(ProgressEvent::File {
            percent: percent.min(100),
            name: name.into(),
        });
    }

    pub fn failed(&self, kind: ErrorKind, message: impl Into<String>, error: impl Into<String>) {
        self.send(ProgressEvent::Failed {
            kind,
            message: message.into(),
            error: error.into(),
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Scale `done / total` into a sub-range of the overall percentage.
pub fn scaled_percent(done: usize, total: usize, from: u8, to: u8) -> u8 {
    if total == 0 || to <= from {
        return to;
    }
    let span = (to - from) as usize;
    let step = (done.min(total) * span) / total;
    from + step as u8
}
