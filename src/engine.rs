//! Chunk-level scanning engine and the per-stream runtime that drives it.
//!
//! ## Engine flow (single chunk)
//!
//! 1) Keyword prefilter over the full chunk bytes selects candidate
//!    detectors.
//! 2) Each candidate detector scans the chunk and emits candidate matches.
//! 3) Matches starting inside the peek window are dropped; the same bytes
//!    open the next chunk's core, which reports them instead (overlap
//!    dedupe).
//! 4) Survivors are verified (when a verifier is wired) and materialized as
//!    findings with absolute stream offsets.
//!
//! ## Runtime flow (stream)
//!
//! `Read -> ChunkReader -> Engine -> findings + stats`, with metrics
//! reported through the sink handed in at construction. A read failure
//! truncates the stream scan: everything read up to the failure is still
//! scanned, the failure is counted, and the report is returned rather than
//! an error (degraded results beat no results for scanning).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use ahash::AHashSet;

use crate::api::{sort_findings_stable, Finding, SourceId, VerificationStatus};
use crate::chunker::{Chunk, ChunkParams, ChunkReader};
use crate::detector::{CandidateMatch, Detector, DetectorError, Verifier};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::prefilter::KeywordPrefilter;

/// Reusable per-scan buffers, one per runtime (or per thread).
///
/// Keeps the per-chunk path free of repeated allocations; the vectors grow
/// to the scan's working set and stay there.
#[derive(Default)]
pub struct ScanScratch {
    candidates: Vec<u32>,
    matches: Vec<CandidateMatch>,
}

/// Immutable scanning state: detectors, their prefilter, and the optional
/// verification seam. Shared across runtimes via `Arc`.
pub struct Engine {
    detectors: Vec<Box<dyn Detector>>,
    prefilter: KeywordPrefilter,
    verifier: Option<Arc<dyn Verifier>>,
}

impl Engine {
    /// Builds an engine over `detectors`; findings are left unverified.
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Result<Self, DetectorError> {
        let prefilter = KeywordPrefilter::build(&detectors)?;
        Ok(Self {
            detectors,
            prefilter,
            verifier: None,
        })
    }

    /// Builds an engine that passes every candidate through `verifier`.
    pub fn with_verifier(
        detectors: Vec<Box<dyn Detector>>,
        verifier: Arc<dyn Verifier>,
    ) -> Result<Self, DetectorError> {
        let mut engine = Self::new(detectors)?;
        engine.verifier = Some(verifier);
        Ok(engine)
    }

    /// Number of detectors in this engine.
    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Fresh scratch sized for this engine.
    pub fn new_scratch(&self) -> ScanScratch {
        ScanScratch {
            candidates: Vec::with_capacity(self.detectors.len()),
            matches: Vec::new(),
        }
    }

    /// Scans one chunk, appending materialized findings to `out`.
    ///
    /// Offsets on emitted findings are absolute stream offsets
    /// (`chunk.base_offset() + relative`).
    pub fn scan_chunk_into(
        &self,
        source: SourceId,
        chunk: &Chunk,
        scratch: &mut ScanScratch,
        out: &mut Vec<Finding>,
    ) {
        let data = chunk.data();
        self.prefilter.candidates(data, &mut scratch.candidates);

        for &det_idx in &scratch.candidates {
            let detector = &self.detectors[det_idx as usize];
            scratch.matches.clear();
            detector.scan(data, &mut scratch.matches);

            for m in scratch.matches.drain(..) {
                if !chunk.keep_match_start(m.span.start) {
                    continue;
                }
                let verification = match &self.verifier {
                    Some(v) => v.verify(detector.name(), &m.raw),
                    None => VerificationStatus::Skipped,
                };
                out.push(Finding {
                    source,
                    detector: detector.name().to_string(),
                    start: chunk.base_offset() + m.span.start as u64,
                    end: chunk.base_offset() + m.span.end as u64,
                    secret: String::from_utf8_lossy(&m.raw).into_owned(),
                    verification,
                });
            }
        }
    }
}

/// Configuration for a [`ScanRuntime`].
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// Chunk window sizes fed to the [`ChunkReader`].
    pub chunk: ChunkParams,
    /// Findings cap per stream; hitting it truncates the scan.
    pub max_findings_per_stream: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkParams::default(),
            max_findings_per_stream: 10_000,
        }
    }
}

/// Summary counters for one stream scan.
///
/// All counters are always populated; `read_errors` is nonzero iff the
/// stream terminated on a read failure instead of end of stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanStats {
    /// Chunks scanned.
    pub chunks: u64,
    /// Bytes scanned (core windows only; excludes overlap).
    pub bytes_scanned: u64,
    /// Findings kept after dedupe.
    pub findings: u64,
    /// Read failures that truncated the stream.
    pub read_errors: u64,
    /// True when the findings cap stopped the scan early.
    pub truncated: bool,
}

/// Findings plus counters for one scanned stream.
#[derive(Debug)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub stats: ScanStats,
}

/// Per-caller driver that scans whole streams against a shared [`Engine`].
///
/// Owns mutable scratch state, so it is one-per-thread; the engine behind it
/// is shared. Construct with [`new`](Self::new) for no metrics, or
/// [`with_metrics`](Self::with_metrics) to wire a sink.
pub struct ScanRuntime {
    engine: Arc<Engine>,
    config: ScanConfig,
    metrics: Arc<dyn MetricsSink>,
    scratch: ScanScratch,
}

impl ScanRuntime {
    pub fn new(engine: Arc<Engine>, config: ScanConfig) -> Self {
        Self::with_metrics(engine, config, Arc::new(NoopMetrics))
    }

    pub fn with_metrics(
        engine: Arc<Engine>,
        config: ScanConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let scratch = engine.new_scratch();
        Self {
            engine,
            config,
            metrics,
            scratch,
        }
    }

    /// Scans one stream to completion (or read failure / findings cap) and
    /// returns the report, findings in stable order.
    pub fn scan_stream<R: Read + Send + 'static>(
        &mut self,
        source: SourceId,
        reader: R,
    ) -> ScanReport {
        let engine = &self.engine;
        let metrics = &self.metrics;
        let scratch = &mut self.scratch;

        let mut stats = ScanStats::default();
        let mut findings: Vec<Finding> = Vec::new();
        let mut seen: AHashSet<(String, u64, u64)> = AHashSet::new();
        let mut chunk_findings: Vec<Finding> = Vec::new();

        let stream = ChunkReader::with_params(self.config.chunk).try_chunks(reader);
        'stream: for item in stream {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(_) => {
                    // Producer already logged the failure; everything read
                    // before it has been scanned.
                    stats.read_errors += 1;
                    metrics.on_read_error();
                    break;
                }
            };

            stats.chunks += 1;
            stats.bytes_scanned += chunk.core_len() as u64;
            metrics.on_chunk(chunk.core_len() as u64);

            chunk_findings.clear();
            engine.scan_chunk_into(source, &chunk, scratch, &mut chunk_findings);

            for finding in chunk_findings.drain(..) {
                let key = (finding.detector.clone(), finding.start, finding.end);
                if !seen.insert(key) {
                    continue;
                }
                if findings.len() >= self.config.max_findings_per_stream {
                    stats.truncated = true;
                    // Dropping the stream below stops the producer.
                    break 'stream;
                }
                metrics.on_finding(finding.verification == VerificationStatus::Verified);
                stats.findings += 1;
                findings.push(finding);
            }
        }

        sort_findings_stable(&mut findings);
        log::debug!(
            "scanned source={} bytes={} chunks={} findings={} read_errors={}",
            source.0,
            stats.bytes_scanned,
            stats.chunks,
            stats.findings,
            stats.read_errors
        );
        ScanReport { findings, stats }
    }

    /// Opens and scans a file. Only the open can fail; read failures during
    /// the scan are reported through [`ScanStats::read_errors`].
    pub fn scan_file(&mut self, source: SourceId, path: &Path) -> io::Result<ScanReport> {
        let file = File::open(path)?;
        Ok(self.scan_stream(source, file))
    }
}
