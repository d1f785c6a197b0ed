use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters, shared by every worker.
#[derive(Debug, Default)]
pub struct CrawlStats {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub in_flight: u64,
    pub max_in_flight: u64,
}

impl CrawlStats {
    pub(crate) fn probe_started(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn probe_finished(&self, ok: bool, timed_out: bool) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            if timed_out {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            max_in_flight: self.max_in_flight.load(Ordering::SeqCst),
        }
    }
}
