//! Time sources.
//!
//! Every component that stamps or ages records reads time through
//! [`TimeSource`] so tests can drive the clock.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::entities::Timestamp;

/// Abstract interface for reading the current time.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp::new(secs)
    }
}

/// Manually advanced clock for tests.
///
/// Uses an `AtomicU64` so a shared instance can be advanced while other
/// tasks read it.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    secs: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualTimeSource {
    /// Clock starting at `secs`.
    pub fn new(secs: u64) -> Self {
        Self {
            secs: std::sync::atomic::AtomicU64::new(secs),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.secs
            .fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(std::sync::atomic::Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_is_after_2020() {
        assert!(SystemTimeSource.now().as_secs() > 1_577_836_800);
    }

    #[test]
    fn test_manual_time_source_advances() {
        let clock = ManualTimeSource::new(1000);
        clock.advance(30);
        assert_eq!(clock.now().as_secs(), 1030);
        clock.set(5);
        assert_eq!(clock.now().as_secs(), 5);
    }
}
