//! Single-slot holder for the most recently published detection.

use crate::types::LatestState;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared between the detection loop (sole writer) and the HTTP reader.
///
/// The slot stores an `Arc<LatestState>`; a publish swaps the pointer under a
/// write lock held only for the assignment, so readers see either the old or
/// the new value in full.
#[derive(Debug, Clone, Default)]
pub struct LatestSlot {
    inner: Arc<RwLock<Arc<LatestState>>>,
}

impl LatestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    pub fn snapshot(&self) -> Arc<LatestState> {
        self.inner.read().clone()
    }

    /// Replace the current value, returning the previous one.
    pub fn publish(&self, state: LatestState) -> Arc<LatestState> {
        let next = Arc::new(state);
        std::mem::replace(&mut *self.inner.write(), next)
    }
}
