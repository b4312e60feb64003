use async_trait::async_trait;
use linkpin_core::{Allocator, AllocatorError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::Result;

/// A process-local allocator.
///
/// Only unique within one process; meant for tests and single-instance
/// development setups. Availability can be toggled to exercise failure paths.
#[derive(Debug)]
pub struct InMemoryAllocator {
    counter: AtomicU64,
    available: AtomicBool,
}

impl Default for InMemoryAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAllocator {
    /// Creates an allocator whose first value is 1.
    pub fn new() -> Self {
        Self::with_initial(0)
    }

    /// Creates an allocator whose first value is `initial + 1`, matching a
    /// Redis counter seeded with `initial`.
    pub fn with_initial(initial: u64) -> Self {
        Self {
            counter: AtomicU64::new(initial),
            available: AtomicBool::new(true),
        }
    }

    /// The last value handed out (or the seed if none was).
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AllocatorError::Unavailable(
                "in-memory allocator is switched off".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Allocator for InMemoryAllocator {
    async fn next(&self) -> Result<u64> {
        self.ensure_available()?;
        // saturates at u64::MAX instead of wrapping back to 1
        self.counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| AllocatorError::InvalidData("counter overflowed".to_string()))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}
