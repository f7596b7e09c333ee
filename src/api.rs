use serde::Serialize;
use std::io::{self, Write};

// --------------------------
// Public API types
// --------------------------

/// Opaque identifier for one scanned input stream.
///
/// Assigned by the caller; findings carry it so results from many streams can
/// be attributed after the fact without holding paths or URLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SourceId(pub u32);

/// Outcome of the optional live-verification step for a candidate secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No verifier was configured; the candidate was not checked.
    Skipped,
    /// The provider confirmed the credential as active.
    Verified,
    /// The provider rejected the credential.
    Unverified,
    /// Verification was attempted but produced no usable answer
    /// (transport failure, ambiguous status).
    Indeterminate,
}

/// A materialized secret finding with stream provenance.
///
/// `start`/`end` are absolute byte offsets into the original stream,
/// half-open. `secret` is the matched bytes, lossily decoded for reporting;
/// offsets remain exact even when the decode is lossy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub source: SourceId,
    pub detector: String,
    pub start: u64,
    pub end: u64,
    pub secret: String,
    pub verification: VerificationStatus,
}

impl Finding {
    /// Length of the matched span in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// True when the span is empty (degenerate match).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Sorts findings into the stable reporting order: start offset ascending,
/// longer span first on ties, then detector name.
///
/// Reruns over the same input produce byte-identical output after this sort.
pub fn sort_findings_stable(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.detector.cmp(&b.detector))
            .then_with(|| a.secret.cmp(&b.secret))
    });
}

/// Streams findings to `out` as one JSON array.
///
/// Findings are written in slice order; call [`sort_findings_stable`] first
/// for reproducible output.
pub fn write_findings_json<W: Write>(out: &mut W, findings: &[Finding]) -> io::Result<()> {
    write!(out, "[")?;
    for (i, finding) in findings.iter().enumerate() {
        if i > 0 {
            write!(out, ",")?;
        }
        serde_json::to_writer(&mut *out, finding)?;
    }
    write!(out, "]")?;
    Ok(())
}
