//! State shared between the mapping thread and producer callbacks.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::core::types::{Pose3D, Timestamped};

/// Lock-protected snapshot of the odometry-world-to-map-world link.
///
/// Written by the mapping thread after each successful solve; read by the
/// high-frequency odometry callback, which must always observe a
/// consistent `(q, t)` pair. The write lock is held only for the copy.
#[derive(Debug, Default)]
pub struct CorrectionLink {
    link: RwLock<Pose3D>,
}

impl CorrectionLink {
    /// Create an identity link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent snapshot of the current link.
    pub fn snapshot(&self) -> Pose3D {
        *self.link.read()
    }

    /// Publish a new link (mapping thread only).
    pub fn store(&self, link: Pose3D) {
        *self.link.write() = link;
    }

    /// Low-latency refined pose: `T_wmap_wodom ∘ T_wodom_curr`.
    ///
    /// Cheap enough to run inline in the odometry callback; never touches
    /// the staging mutex or the map.
    pub fn refine_odometry(&self, odometry: &Timestamped<Pose3D>) -> Timestamped<Pose3D> {
        Timestamped::new(
            self.snapshot().compose(&odometry.data),
            odometry.timestamp_us,
        )
    }
}

/// Cooperative cancellation token for the consumer loop.
///
/// Checked at the top of each frame and at each idle sleep; requesting
/// shutdown makes the loop flush its file sinks and return.
#[derive(Debug, Default)]
pub struct ShutdownFlag {
    requested: AtomicBool,
}

impl ShutdownFlag {
    /// Create a flag in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Check whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
