//! Virtual-time timer scheduler for the target context.
//!
//! All engine delays (auto-fail timeout, per-character typing delay,
//! per-step drag ticks, post-load settle tick) are scheduled against this
//! queue rather than the host clock, so a run is fully deterministic and
//! unloading the context cannot leave orphaned callbacks firing into a
//! stale document. Time advances only when the suite runner pops a due
//! timer.

use std::collections::BTreeMap;
use std::fmt;

use crate::result::TocarResult;

/// Callback scheduled on the target context's clock.
///
/// An `Err` fails the currently running test case.
pub type TimerCallback = Box<dyn FnOnce() -> TocarResult<()>>;

/// Handle for cancelling a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Duration of one animation frame in virtual milliseconds
pub const FRAME_MS: u64 = 16;

/// Deterministic timer queue owned by one target context
pub struct Scheduler {
    now_ms: u64,
    next_id: u64,
    seq: u64,
    // Keyed by (deadline, insertion seq) so ties fire in scheduling order
    queue: BTreeMap<(u64, u64), (TimerId, TimerCallback)>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now_ms", &self.now_ms)
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler at time zero
    #[must_use]
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            seq: 0,
            queue: BTreeMap::new(),
        }
    }

    /// Current virtual time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Number of pending timers
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedule a callback after `delay_ms` virtual milliseconds
    pub fn set_timeout<F>(&mut self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.seq += 1;
        self.queue.insert(
            (self.now_ms + delay_ms, self.seq),
            (id, Box::new(callback)),
        );
        id
    }

    /// Cancel a pending timer; cancelling an already-fired timer is a no-op
    pub fn clear_timeout(&mut self, id: TimerId) {
        self.queue.retain(|_, (timer, _)| *timer != id);
    }

    /// Schedule a callback on the next animation frame
    pub fn request_animation_frame<F>(&mut self, callback: F) -> TimerId
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        self.set_timeout(FRAME_MS, callback)
    }

    /// Pop the earliest pending timer, advancing virtual time to its
    /// deadline. Returns `None` when nothing is pending.
    pub fn pop_due_next(&mut self) -> Option<TimerCallback> {
        let (&(deadline, seq), _) = self.queue.iter().next()?;
        let (_, callback) = self.queue.remove(&(deadline, seq))?;
        self.now_ms = self.now_ms.max(deadline);
        Some(callback)
    }

    /// Drop every pending timer. Called on unload so nothing can fire into
    /// a stale context.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
