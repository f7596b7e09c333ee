//! Process-wide scan metrics behind an explicit sink handle.
//!
//! Components take a sink at construction; there is no package-level
//! singleton and nothing is initialized behind the caller's back. The
//! default sink is a no-op, so instrumentation costs nothing unless wired
//! up. [`AtomicMetrics`] is the provided aggregate implementation: relaxed
//! counters, merged into a [`MetricsSnapshot`] on demand.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for scan-path events. All hooks default to no-ops so implementations
/// only override what they track.
pub trait MetricsSink: Send + Sync {
    /// A chunk was scanned; `bytes` counts its core window only, so totals
    /// add up to stream length without overlap double-counting.
    fn on_chunk(&self, bytes: u64) {
        let _ = bytes;
    }

    /// A stream read failed and the scan of that stream was truncated.
    fn on_read_error(&self) {}

    /// A finding was emitted; `verified` reflects the verification outcome.
    fn on_finding(&self, verified: bool) {
        let _ = verified;
    }
}

/// Sink that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Aggregate counters safe to share across scanning threads.
///
/// Updates are relaxed atomics; a snapshot taken while scans are in flight
/// is approximate (counters may be mid-update relative to each other),
/// which is fine for throughput reporting.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    chunks: AtomicU64,
    bytes_scanned: AtomicU64,
    read_errors: AtomicU64,
    findings: AtomicU64,
    verified_findings: AtomicU64,
}

impl AtomicMetrics {
    pub const fn new() -> Self {
        Self {
            chunks: AtomicU64::new(0),
            bytes_scanned: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            findings: AtomicU64::new(0),
            verified_findings: AtomicU64::new(0),
        }
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            findings: self.findings.load(Ordering::Relaxed),
            verified_findings: self.verified_findings.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn on_chunk(&self, bytes: u64) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_finding(&self, verified: bool) {
        self.findings.fetch_add(1, Ordering::Relaxed);
        if verified {
            self.verified_findings.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of [`AtomicMetrics`] counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Chunks scanned.
    pub chunks: u64,
    /// Bytes scanned (core windows only; excludes overlap).
    pub bytes_scanned: u64,
    /// Stream read failures that truncated a scan.
    pub read_errors: u64,
    /// Findings emitted.
    pub findings: u64,
    /// Findings whose verification came back positive.
    pub verified_findings: u64,
}
