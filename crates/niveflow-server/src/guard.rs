//! Process-wide build-in-progress flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that admits one orchestration run at a time.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct BuildGuard {
    building: Arc<AtomicBool>,
}

impl BuildGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag, or `None` if a run is already active.
    pub fn try_acquire(&self) -> Option<BuildPermit> {
        self.building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BuildPermit {
                building: Arc::clone(&self.building),
            })
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the guard when dropped.
#[derive(Debug)]
pub struct BuildPermit {
    building: Arc<AtomicBool>,
}

impl Drop for BuildPermit {
    fn drop(&mut self) {
        self.building.store(false, Ordering::Release);
    }
}
