//! Keyword prefilter: one automaton pass selects which detectors run.
//!
//! Running hundreds of regexes over every chunk is the naive cost model this
//! layer removes. All detector keywords go into a single Aho-Corasick
//! automaton; one scan of the chunk marks the detectors with at least one
//! keyword hit, and only those run their regexes.
//!
//! # Invariants
//! - Sound for gated detectors: if a detector's regex could match the chunk,
//!   the detector is in the candidate set (this follows from the keyword
//!   contract on [`Detector::keywords`]). Overlapping keyword hits are
//!   required for this, so the automaton is searched with
//!   `find_overlapping_iter`.
//! - Detectors with no keywords are always candidates.
//! - Matching is ASCII case-insensitive, so rules need not enumerate case
//!   variants of their keywords.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::detector::{Detector, DetectorError};

/// Maps chunk bytes to the subset of detectors worth running.
pub struct KeywordPrefilter {
    /// Automaton over all keywords; `None` when no detector is gated.
    ac: Option<AhoCorasick>,
    /// Automaton pattern index -> detector index.
    pattern_to_detector: Vec<u32>,
    /// Detectors with an empty keyword list: candidates on every chunk.
    ungated: Vec<u32>,
    detector_count: usize,
}

impl KeywordPrefilter {
    /// Builds the prefilter over `detectors`, in index order.
    pub fn build(detectors: &[Box<dyn Detector>]) -> Result<Self, DetectorError> {
        let mut patterns: Vec<&[u8]> = Vec::new();
        let mut pattern_to_detector = Vec::new();
        let mut ungated = Vec::new();

        for (idx, det) in detectors.iter().enumerate() {
            let keywords = det.keywords();
            if keywords.is_empty() {
                ungated.push(idx as u32);
                continue;
            }
            for kw in keywords {
                patterns.push(kw.as_slice());
                pattern_to_detector.push(idx as u32);
            }
        }

        let ac = if patterns.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .ascii_case_insensitive(true)
                    .match_kind(MatchKind::Standard)
                    .build(&patterns)
                    .map_err(|e| DetectorError::Prefilter(Box::new(e)))?,
            )
        };

        Ok(Self {
            ac,
            pattern_to_detector,
            ungated,
            detector_count: detectors.len(),
        })
    }

    /// Number of detectors the prefilter was built over.
    pub fn detector_count(&self) -> usize {
        self.detector_count
    }

    /// Writes the sorted, deduplicated candidate detector indices for
    /// `data` into `out`.
    pub fn candidates(&self, data: &[u8], out: &mut Vec<u32>) {
        out.clear();
        out.extend_from_slice(&self.ungated);

        let Some(ac) = &self.ac else {
            out.sort_unstable();
            return;
        };

        let mut marked = vec![false; self.detector_count];
        for &idx in &self.ungated {
            marked[idx as usize] = true;
        }
        let mut remaining = self.detector_count - out.len();

        for m in ac.find_overlapping_iter(data) {
            let det = self.pattern_to_detector[m.pattern().as_usize()];
            if !marked[det as usize] {
                marked[det as usize] = true;
                out.push(det);
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }
        out.sort_unstable();
    }
}
