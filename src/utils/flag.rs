use crossbeam::utils::CachePadded;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cheaply clonable boolean shared between a connector and its channels.
/// Padded to avoid false sharing on the hot send path.
#[derive(Clone)]
#[repr(transparent)]
pub struct SharedFlag(Arc<CachePadded<AtomicBool>>);

impl SharedFlag {
    #[inline]
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(CachePadded::new(AtomicBool::new(initial))))
    }

    /// The flag only ever transitions down, so relaxed reads are enough.
    #[inline(always)]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn down(&self) {
        self.0.store(false, Ordering::Relaxed)
    }
}

impl fmt::Debug for SharedFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFlag").field("value", &self.get()).finish()
    }
}
