// Control plane: bounded worker pool for service queries
//
// Caps how many service queries run at once regardless of how many services
// discovery reports for a cycle.
//
// Numan Thabit 2025 Nov

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Debug)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a running query.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<WorkerPermit, AcquireError> {
        let permit = self.slots.clone().acquire_owned().await?;
        Ok(WorkerPermit { _permit: permit })
    }
}

pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
}
