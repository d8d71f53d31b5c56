//! Broker counters
//!
//! Monotonic atomics updated by the send path and the dispatch loop.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::DispatchReport;

/// Point-in-time copy of the broker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Messages accepted into the inbound queue
    pub accepted: u64,
    /// Messages taken off the queue and routed
    pub dispatched: u64,
    /// Successful per-recipient writes
    pub delivered: u64,
    /// Per-recipient skips plus direct messages to unknown users
    pub dropped: u64,
    /// Messages still queued when the broker stopped
    pub discarded: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, report: &DispatchReport) {
        self.dispatched.fetch_add(1, Ordering::Release);
        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(report.dropped() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Loads `dispatched` first so a snapshot never shows more dispatched
    /// than accepted.
    pub(crate) fn snapshot(&self) -> BrokerStats {
        let dispatched = self.dispatched.load(Ordering::Acquire);
        BrokerStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dispatched,
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.record_accepted();
        counters.record_accepted();
        counters.record_dispatch(&DispatchReport {
            delivered: 2,
            full: 1,
            closed: 0,
            unknown_recipient: false,
        });
        counters.record_discarded(1);

        assert_eq!(
            counters.snapshot(),
            BrokerStats {
                accepted: 2,
                dispatched: 1,
                delivered: 2,
                dropped: 1,
                discarded: 1,
            }
        );
    }
}
