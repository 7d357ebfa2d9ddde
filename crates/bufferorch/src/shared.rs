//! Thread-safe handle to a [`BufferOrch`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferOrch;

/// Cloneable handle serializing every request through one lock.
///
/// A request holds the lock from validation to commit, so no other caller
/// can observe or interleave with a half-applied change.
#[derive(Debug, Clone)]
pub struct SharedBufferOrch {
    inner: Arc<Mutex<BufferOrch>>,
}

impl SharedBufferOrch {
    pub fn new(orch: BufferOrch) -> Self {
        Self {
            inner: Arc::new(Mutex::new(orch)),
        }
    }

    /// Runs `f` with exclusive access to the orch.
    pub fn with<R>(&self, f: impl FnOnce(&mut BufferOrch) -> R) -> R {
        let mut orch = self.inner.lock();
        f(&mut orch)
    }
}
