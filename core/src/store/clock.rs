//! Monotonic timestamp allocator for store-assigned `created_at`
//!
//! Combines wall-clock time with the last issued value so that timestamps are
//! strictly increasing even when several posts are created within the same
//! millisecond or the system clock steps backwards.

use crate::types::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreClock {
    /// Last timestamp handed out (milliseconds since UNIX epoch)
    last: u64,
}

impl StoreClock {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Issue the next timestamp
    ///
    /// The result is the largest of the wall clock, `hint`, and one past the
    /// previous value. A hint can move the clock forward but never backward.
    /// Once the clock reaches `u64::MAX` it stays there.
    pub fn tick(&mut self, hint: Option<u64>) -> u64 {
        let next = now_millis()
            .max(self.last.saturating_add(1))
            .max(hint.unwrap_or(0));
        self.last = next;
        next
    }

    /// Account for a timestamp that entered the store from elsewhere (imports)
    pub fn observe(&mut self, timestamp: u64) {
        self.last = self.last.max(timestamp);
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}

impl Default for StoreClock {
    fn default() -> Self {
        Self::new()
    }
}
