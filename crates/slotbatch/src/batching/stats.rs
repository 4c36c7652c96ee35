use crate::StreamHandle;
use log::info;
use std::time::{Duration, Instant};

/// Per-stream counters, reported on progress and at close.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamStats {
    pub records_pushed: u64,
    pub bytes_pushed: u64,
    pub batches_flushed: u64,
    pub records_flushed: u64,
    pub slot_allocations: u64,
}

impl StreamStats {
    pub fn record_push(&mut self, bytes: usize, reallocated: bool) {
        self.records_pushed += 1;
        self.bytes_pushed += bytes as u64;
        if reallocated {
            self.slot_allocations += 1;
        }
    }

    pub fn record_flush(&mut self, records: usize) {
        self.batches_flushed += 1;
        self.records_flushed += records as u64;
    }

    /// Records accepted but not yet handed to the sink.
    pub fn pending_records(&self) -> u64 {
        self.records_pushed - self.records_flushed
    }
}

/// Decides when a stream logs a record-count line.
///
/// A count is eligible while it is below `interval` and afterwards at every
/// multiple of it. An eligible count is only logged if at least `min_gap`
/// has passed since the stream's previous line. An interval of zero
/// disables reporting.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReporter {
    interval: u64,
    min_gap: Duration,
}

impl ProgressReporter {
    pub fn new(interval: u64, min_gap: Duration) -> Self {
        Self { interval, min_gap }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval > 0
    }

    pub fn is_eligible(&self, records_pushed: u64) -> bool {
        if self.interval == 0 || records_pushed == 0 {
            return false;
        }
        records_pushed < self.interval || records_pushed % self.interval == 0
    }

    pub fn is_due(&self, records_pushed: u64, last_report: Option<Instant>, now: Instant) -> bool {
        if !self.is_eligible(records_pushed) {
            return false;
        }
        match last_report {
            Some(last) => now.saturating_duration_since(last) >= self.min_gap,
            None => true,
        }
    }

    /// Log a progress line if one is due, updating `last_report` when it is.
    pub fn maybe_report(
        &self,
        handle: StreamHandle,
        stats: &StreamStats,
        last_report: &mut Option<Instant>,
    ) -> bool {
        let now = Instant::now();
        if !self.is_due(stats.records_pushed, *last_report, now) {
            return false;
        }
        *last_report = Some(now);
        info!(
            "stream {handle}: {} records, {} bytes, {} batches flushed",
            stats.records_pushed, stats.bytes_pushed, stats.batches_flushed
        );
        true
    }

    pub fn report_final(&self, handle: StreamHandle, stats: &StreamStats) {
        info!(
            "stream {handle} closed: {} records, {} bytes in {} batches ({} slot allocations)",
            stats.records_pushed, stats.bytes_pushed, stats.batches_flushed, stats.slot_allocations
        );
    }
}
