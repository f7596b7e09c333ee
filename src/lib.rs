//! Secret-scanning core with bounded memory over unbounded inputs.
//!
//! ## Scope
//! This crate scans byte streams for credential-shaped patterns. Streams of
//! any length (including unbounded ones) are split into fixed-size
//! overlapping chunks; a keyword prefilter narrows the detector set per
//! chunk; rule-driven detectors extract candidate secrets; an optional
//! verification seam confirms them against the provider.
//!
//! ## Key invariants
//! - Chunks never exceed `CHUNK_SIZE + PEEK_SIZE` bytes, and consecutive
//!   chunks overlap by the peek window, so a match confined to one core
//!   window is visible whole in at least one chunk.
//! - Memory is bounded by the chunk windows plus whatever the caller
//!   explicitly buffers for sniffing; nothing materializes whole streams.
//! - Scanning degrades rather than aborts: a mid-stream read failure is
//!   logged and counted, and everything read before it is still scanned.
//!
//! ## Flow (single stream)
//! `Read -> BufferedReadSeeker (optional sniffing) -> ChunkReader -> Chunk
//! -> KeywordPrefilter -> Detectors -> Verifier -> Findings`
//!
//! ## Notable entry points
//! - [`ChunkReader`] / [`read_chunks`]: overlapping chunk sequences.
//! - [`BufferedReadSeeker`]: seek/size semantics over non-seekable sources.
//! - [`Engine`] / [`ScanRuntime`]: chunk-level and stream-level scanning.
//! - [`Detector`] / [`Verifier`]: the seams where rule catalogs and the
//!   verification transport plug in.
//! - [`builtin_detectors`]: a representative rule set.
//!
//! ## Design trade-offs
//! The overlap windows buy boundary-safe matching at the cost of re-reading
//! `PEEK_SIZE` bytes per chunk. Swallowing read errors (with logging) buys
//! availability at the cost of silently shorter scans; callers that need the
//! distinction use the `try_` surfaces.

mod api;
mod buffered;
mod chunker;
mod detector;
mod engine;
mod metrics;
mod prefilter;
mod rules;

pub use api::{
    sort_findings_stable, write_findings_json, Finding, SourceId, VerificationStatus,
};
pub use buffered::BufferedReadSeeker;
pub use chunker::{
    read_chunks, Chunk, ChunkParams, ChunkReader, ChunkStream, TryChunkStream, CHUNK_SIZE,
    PEEK_SIZE, TOTAL_CHUNK_SIZE,
};
pub use detector::{
    shannon_entropy, CandidateMatch, Detector, DetectorError, EntropySpec, RegexDetector, Verifier,
};
pub use engine::{Engine, ScanConfig, ScanReport, ScanRuntime, ScanScratch, ScanStats};
pub use metrics::{AtomicMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use prefilter::KeywordPrefilter;
pub use rules::builtin_detectors;
