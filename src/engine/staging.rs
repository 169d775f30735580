//! Input staging: four bounded queues and time alignment.
//!
//! Producer callbacks push corner, surf, full-resolution and odometry
//! messages; the mapping thread drains them. All four queues sit behind a
//! single mutex and every critical section is bounded to queue-head work.
//! Backpressure is by eviction: a full queue drops its oldest entry.

use std::collections::VecDeque;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::core::types::{FeatureCloud, Pose3D, Timestamped};

/// Maximum pairwise timestamp skew for a frame to be accepted.
pub const TIME_SYNC_TOLERANCE_US: u64 = 10_000;

/// A time-aligned set of inputs for one mapping frame.
#[derive(Debug, Clone)]
pub struct StagedFrame {
    /// Edge feature cloud (sensor frame)
    pub corner: FeatureCloud,
    /// Planar feature cloud (sensor frame)
    pub surf: FeatureCloud,
    /// Full-resolution scan cloud (sensor frame)
    pub full: FeatureCloud,
    /// Upstream odometry pose `T_wodom_curr`
    pub odometry: Pose3D,
    /// Frame timestamp (the odometry message's)
    pub time_us: u64,
}

#[derive(Default)]
struct Queues {
    corner: VecDeque<Timestamped<FeatureCloud>>,
    surf: VecDeque<Timestamped<FeatureCloud>>,
    full: VecDeque<Timestamped<FeatureCloud>>,
    odometry: VecDeque<Timestamped<Pose3D>>,
}

/// Shared staging area between producer callbacks and the mapping thread.
pub struct InputStaging {
    queues: Mutex<Queues>,
    capacity: usize,
}

impl InputStaging {
    /// Create a staging area whose queues are bounded to `capacity`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            queues: Mutex::new(Queues::default()),
            capacity,
        }
    }

    fn push_bounded<T>(queue: &mut VecDeque<Timestamped<T>>, message: Timestamped<T>, capacity: usize, name: &str) {
        if queue.len() >= capacity {
            queue.pop_front();
            warn!("{} queue full, evicting oldest message", name);
        }
        queue.push_back(message);
    }

    /// Enqueue a corner (edge) feature cloud.
    pub fn push_corner(&self, message: Timestamped<FeatureCloud>) {
        let mut q = self.queues.lock();
        Self::push_bounded(&mut q.corner, message, self.capacity, "corner");
    }

    /// Enqueue a surf (planar) feature cloud.
    pub fn push_surf(&self, message: Timestamped<FeatureCloud>) {
        let mut q = self.queues.lock();
        Self::push_bounded(&mut q.surf, message, self.capacity, "surf");
    }

    /// Enqueue a full-resolution scan cloud.
    pub fn push_full(&self, message: Timestamped<FeatureCloud>) {
        let mut q = self.queues.lock();
        Self::push_bounded(&mut q.full, message, self.capacity, "full-res");
    }

    /// Enqueue an odometry pose.
    pub fn push_odometry(&self, message: Timestamped<Pose3D>) {
        let mut q = self.queues.lock();
        Self::push_bounded(&mut q.odometry, message, self.capacity, "odometry");
    }

    /// Queue depths `(corner, surf, full, odometry)`.
    pub fn depths(&self) -> (usize, usize, usize, usize) {
        let q = self.queues.lock();
        (q.corner.len(), q.surf.len(), q.full.len(), q.odometry.len())
    }

    /// Attempt to take one time-aligned frame.
    ///
    /// Aligns the surf, full-res and odometry queues to the corner head by
    /// discarding strictly older messages. Returns `None` when any queue
    /// runs dry during alignment. When the aligned heads still disagree by
    /// more than [`TIME_SYNC_TOLERANCE_US`], the corner head is consumed,
    /// a warning is logged and the frame is dropped with no other state
    /// mutated. On success all remaining corner messages are drained —
    /// recency beats latency, at most one mapping frame stays in flight.
    pub fn try_take_frame(&self) -> Option<StagedFrame> {
        let mut q = self.queues.lock();
        if q.corner.is_empty() || q.surf.is_empty() || q.full.is_empty() || q.odometry.is_empty() {
            return None;
        }

        debug!(
            "staging depths = ({}, {}, {}, {})",
            q.corner.len(),
            q.surf.len(),
            q.full.len(),
            q.odometry.len()
        );

        let corner_time = q.corner.front()?.timestamp_us;

        while q
            .odometry
            .front()
            .is_some_and(|m| m.timestamp_us < corner_time)
        {
            q.odometry.pop_front();
        }
        if q.odometry.is_empty() {
            return None;
        }

        while q.surf.front().is_some_and(|m| m.timestamp_us < corner_time) {
            q.surf.pop_front();
        }
        if q.surf.is_empty() {
            return None;
        }

        while q.full.front().is_some_and(|m| m.timestamp_us < corner_time) {
            q.full.pop_front();
        }
        if q.full.is_empty() {
            return None;
        }

        let surf_time = q.surf.front()?.timestamp_us;
        let full_time = q.full.front()?.timestamp_us;
        let odom_time = q.odometry.front()?.timestamp_us;

        let skewed = |t: u64| t.abs_diff(odom_time) > TIME_SYNC_TOLERANCE_US;
        if skewed(corner_time) || skewed(surf_time) || skewed(full_time) {
            warn!(
                "unsynced inputs: corner {} surf {} full {} odom {} (µs), dropping frame",
                corner_time, surf_time, full_time, odom_time
            );
            q.corner.pop_front();
            return None;
        }

        let corner = q.corner.pop_front()?;
        let surf = q.surf.pop_front()?;
        let full = q.full.pop_front()?;
        let odometry = q.odometry.pop_front()?;

        while q.corner.pop_front().is_some() {
            debug!("dropping stale lidar frame in mapping for real-time performance");
        }

        Some(StagedFrame {
            corner: corner.data,
            surf: surf.data,
            full: full.data,
            odometry: odometry.data,
            time_us: odometry.timestamp_us,
        })
    }
}
