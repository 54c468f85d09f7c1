//! Lock serializing package lifecycle operations.
//!
//! Load, export and close all rewrite the working directory, so only one
//! may run at a time. Uses tokio::sync::Mutex with a short timeout so a
//! second caller fails fast instead of queueing.

use crate::types::errors::PipelineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(50);

pub struct OperationLock {
    lock: Arc<Mutex<()>>,
}

impl OperationLock {
    pub fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
        }
    }
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLock {
    /// Try to acquire the lock, giving up after a short timeout.
    pub async fn acquire(&self) -> Result<OwnedMutexGuard<()>, PipelineError> {
        match tokio::time::timeout(ACQUIRE_TIMEOUT, self.lock.clone().lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(PipelineError::Busy),
        }
    }
}

#[cfg(test)]
#[path = "tests/operation_lock_tests.rs"]
mod tests;
