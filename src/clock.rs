//! Injectable time source for rate limiting engines.
//!
//! Every engine reads "now" through this trait instead of calling
//! `SystemTime::now()` directly, so tests can advance time deterministically
//! without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonic millisecond time source.
pub trait Clock: Send + Sync + 'static {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        crate::storage::current_timestamp_ms()
    }
}

/// A clock whose value is set explicitly, for deterministic tests.
///
/// Cloning shares the same underlying counter, so a clone handed to an
/// engine still advances when the test advances the original.
#[derive(Debug, Clone)]
pub struct TestClock {
    now_ms: Arc<AtomicU64>,
}

impl TestClock {
    /// Create a test clock starting at the given epoch millisecond value.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Set the clock to an absolute epoch millisecond value.
    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Advance the clock by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_given_value() {
        let clock = TestClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
    }

    #[test]
    fn test_clock_advances() {
        let clock = TestClock::new(0);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 500);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_000);
    }

    #[test]
    fn test_clock_set_absolute() {
        let clock = TestClock::new(0);
        clock.set(60_000);
        assert_eq!(clock.now_ms(), 60_000);
    }

    #[test]
    fn test_clone_shares_counter() {
        let clock = TestClock::new(0);
        let clone = clock.clone();
        clock.advance(10);
        assert_eq!(clone.now_ms(), 10);
    }
}
