//! Fixed-size overlapping chunking over arbitrary byte streams.
//!
//! ## Shape of a chunk
//!
//! Each chunk is a *core* window of up to [`CHUNK_SIZE`] freshly-read bytes
//! followed by a *peek* window of up to [`PEEK_SIZE`] lookahead bytes. The
//! peek bytes are not consumed from the chunk sequence: they reappear
//! verbatim as the prefix of the next chunk's core. Any match that fits in a
//! single core window is therefore visible whole in at least one chunk even
//! when it straddles a core boundary.
//!
//! ## Key invariants
//!
//! - Emitted length never exceeds `chunk_bytes + peek_bytes`.
//! - A stream of `L` bytes yields exactly `ceil(L / chunk_bytes)` chunks;
//!   an empty stream yields none.
//! - Only the final chunk may have a short core, and it carries no peek.
//! - Concatenating the core windows of all chunks reproduces the stream.
//!
//! ## Delivery
//!
//! [`read_chunks`] is the synchronous core: it drives the read loop and hands
//! each chunk to a callback. [`ChunkReader`] runs the same loop on a
//! dedicated thread and delivers chunks over a zero-capacity channel, so the
//! producer reads chunk `n + 1` while the consumer scans chunk `n` and blocks
//! whenever the consumer falls behind. Dropping the stream ends the producer
//! at its next send.
//!
//! ## Error posture
//!
//! A non-interrupt read failure is treated as end of stream: the bytes read
//! so far are still emitted as a final chunk, then the sequence closes.
//! [`ChunkReader::chunks`] logs the failure and yields nothing further;
//! [`ChunkReader::try_chunks`] and [`read_chunks`] surface it to callers that
//! want to distinguish a truncated scan from a complete one.

use std::io::{self, Read};
use std::ops::ControlFlow;
use std::thread;

use crossbeam_channel::{bounded, Receiver};

/// Bytes of new data read per chunk.
pub const CHUNK_SIZE: usize = 10 * 1024;
/// Bytes of lookahead appended to each chunk from the start of the next.
pub const PEEK_SIZE: usize = 3 * 1024;
/// Maximum emitted chunk length.
///
/// Detector rules assume a secret never exceeds [`PEEK_SIZE`] bytes, so a
/// match can only straddle a core boundary by less than one peek window.
/// Changing either constant shifts which boundary-straddling matches are
/// visible and is a breaking change for every consumer.
pub const TOTAL_CHUNK_SIZE: usize = CHUNK_SIZE + PEEK_SIZE;

/// Chunking parameters.
///
/// - `chunk_bytes`: new bytes read per chunk (the core window)
/// - `peek_bytes`: lookahead appended to each chunk, re-read as the start of
///   the next core
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkParams {
    /// New bytes to read per chunk.
    pub chunk_bytes: usize,
    /// Lookahead bytes appended to each chunk.
    pub peek_bytes: usize,
}

impl ChunkParams {
    /// Create chunk params with validation.
    ///
    /// # Panics
    /// Panics if `chunk_bytes` is 0.
    pub fn new(chunk_bytes: usize, peek_bytes: usize) -> Self {
        let params = Self {
            chunk_bytes,
            peek_bytes,
        };
        params.validate();
        params
    }

    /// Maximum emitted chunk length (core + peek).
    #[inline]
    pub fn total_size(&self) -> usize {
        self.chunk_bytes + self.peek_bytes
    }

    /// Validate parameters.
    pub fn validate(&self) {
        assert!(self.chunk_bytes > 0, "chunk_bytes must be > 0");
        debug_assert!(
            self.peek_bytes < self.chunk_bytes,
            "peek_bytes ({}) >= chunk_bytes ({}) causes redundant re-scanning",
            self.peek_bytes,
            self.chunk_bytes
        );
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_bytes: CHUNK_SIZE,
            peek_bytes: PEEK_SIZE,
        }
    }
}

/// One emitted chunk: a core window plus its lookahead suffix.
///
/// `peek_len` bytes at the tail of `data()` are lookahead; they reappear as
/// the prefix of the next chunk's core. Matching runs over the full
/// `data()`; dedupe uses [`keep_match_start`](Chunk::keep_match_start).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    base_offset: u64,
    data: Vec<u8>,
    peek_len: u32,
}

impl Chunk {
    /// Absolute stream offset of `data()[0]`.
    #[inline]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Full chunk bytes, including the lookahead suffix.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Core window: the bytes this chunk is responsible for.
    #[inline]
    pub fn core(&self) -> &[u8] {
        &self.data[..self.core_len()]
    }

    /// Core window length in bytes.
    #[inline]
    pub fn core_len(&self) -> usize {
        self.data.len() - self.peek_len as usize
    }

    /// Lookahead suffix length in bytes. Zero on the final chunk.
    #[inline]
    pub fn peek_len(&self) -> usize {
        self.peek_len as usize
    }

    /// Dedupe predicate for matches found in `data()`.
    ///
    /// A match starting inside the peek window lies entirely within the next
    /// chunk's window and is reported there; keeping only matches that start
    /// in the core yields each match exactly once.
    #[inline]
    pub fn keep_match_start(&self, rel_start: usize) -> bool {
        rel_start < self.core_len()
    }

    /// Consumes the chunk, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Reads until `buf` holds `target` bytes, the source reports end of stream,
/// or a read fails. Returns `Ok(true)` at end of stream.
///
/// `Interrupted` reads are retried, matching `Read::read_exact`.
fn fill_until<R: Read>(source: &mut R, buf: &mut Vec<u8>, target: usize) -> io::Result<bool> {
    while buf.len() < target {
        let start = buf.len();
        buf.resize(target, 0);
        match source.read(&mut buf[start..]) {
            Ok(0) => {
                buf.truncate(start);
                return Ok(true);
            }
            Ok(n) => buf.truncate(start + n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => buf.truncate(start),
            Err(e) => {
                buf.truncate(start);
                return Err(e);
            }
        }
    }
    Ok(false)
}

/// Drives the chunking loop over `source`, handing each chunk to `emit`.
///
/// This is the synchronous core that [`ChunkReader`] runs on its producer
/// thread. Returning `ControlFlow::Break` from `emit` stops the loop early
/// with `Ok(())`.
///
/// On a read failure the bytes already read are emitted as a final chunk and
/// the error is returned; the stream position past that point is unknown, so
/// callers must treat the sequence as truncated, not resumable.
pub fn read_chunks<R: Read>(
    mut source: R,
    params: ChunkParams,
    mut emit: impl FnMut(Chunk) -> ControlFlow<()>,
) -> io::Result<()> {
    params.validate();

    // Lookahead owed to the next core window.
    let mut pending: Vec<u8> = Vec::with_capacity(params.peek_bytes);
    let mut offset = 0u64;
    let mut at_eof = false;
    // Failure held back until bytes already peeked have been re-emitted as
    // a final core; they would otherwise vanish from the core sequence.
    let mut terminal_err: Option<io::Error> = None;

    loop {
        let mut data = Vec::with_capacity(params.total_size());
        data.extend_from_slice(&pending);
        pending.clear();

        let mut eof = at_eof;
        if !eof {
            match fill_until(&mut source, &mut data, params.chunk_bytes) {
                Ok(hit_eof) => eof = hit_eof,
                Err(e) => {
                    eof = true;
                    terminal_err = Some(e);
                }
            }
        }

        if data.is_empty() {
            // Stream ended exactly on a core boundary.
            return match terminal_err {
                Some(e) => Err(e),
                None => Ok(()),
            };
        }
        let core_len = data.len();

        // Peek the lookahead without consuming it from the sequence: the
        // same bytes start the next core. A short core already means end of
        // stream, so there is nothing to peek.
        if !eof {
            match fill_until(&mut source, &mut pending, params.peek_bytes) {
                Ok(hit_eof) => eof = hit_eof,
                Err(e) => {
                    eof = true;
                    terminal_err = Some(e);
                }
            }
            data.extend_from_slice(&pending);
        }

        let chunk = Chunk {
            base_offset: offset,
            peek_len: (data.len() - core_len) as u32,
            data,
        };
        offset += core_len as u64;

        if let ControlFlow::Break(()) = emit(chunk) {
            return Ok(());
        }
        if eof && pending.is_empty() {
            return match terminal_err {
                Some(e) => Err(e),
                None => Ok(()),
            };
        }
        at_eof = eof;
    }
}

/// Splits byte streams into overlapping chunks on a dedicated producer
/// thread.
///
/// One `ChunkReader` is cheap and reusable; each call to
/// [`chunks`](Self::chunks) or [`try_chunks`](Self::try_chunks) spawns an
/// independent producer for that stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkReader {
    params: ChunkParams,
}

impl ChunkReader {
    /// Chunker with the default [`CHUNK_SIZE`]/[`PEEK_SIZE`] windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunker with explicit window sizes.
    ///
    /// # Panics
    /// Panics if `params` is invalid.
    pub fn with_params(params: ChunkParams) -> Self {
        params.validate();
        Self { params }
    }

    /// The window sizes this reader emits.
    pub fn params(&self) -> ChunkParams {
        self.params
    }

    /// Lazy chunk sequence over `source`.
    ///
    /// Read failures are logged and end the sequence; the bytes read before
    /// the failure are still delivered. Use [`try_chunks`](Self::try_chunks)
    /// to observe the failure instead.
    pub fn chunks<R: Read + Send + 'static>(&self, source: R) -> ChunkStream {
        ChunkStream {
            rx: spawn_producer(self.params, source),
        }
    }

    /// Like [`chunks`](Self::chunks), but surfaces the terminating read
    /// error as the final item.
    pub fn try_chunks<R: Read + Send + 'static>(&self, source: R) -> TryChunkStream {
        TryChunkStream {
            rx: spawn_producer(self.params, source),
        }
    }
}

/// Spawns the producer thread for one stream.
///
/// The channel has zero capacity: every send rendezvouses with a receive, so
/// at most one chunk is in flight and the producer backpressures on a slow
/// consumer. A disconnected receiver (dropped stream) stops the producer at
/// its next send.
fn spawn_producer<R: Read + Send + 'static>(
    params: ChunkParams,
    source: R,
) -> Receiver<io::Result<Chunk>> {
    let (tx, rx) = bounded(0);
    thread::spawn(move || {
        let sender = tx.clone();
        let result = read_chunks(source, params, move |chunk| {
            if sender.send(Ok(chunk)).is_err() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        if let Err(err) = result {
            log::error!("chunk read failed, treating as end of stream: {err}");
            let _ = tx.send(Err(err));
        }
    });
    rx
}

/// Ordered chunk sequence for one stream. Read failures end the sequence.
pub struct ChunkStream {
    rx: Receiver<io::Result<Chunk>>,
}

impl Iterator for ChunkStream {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            match self.rx.recv() {
                Ok(Ok(chunk)) => return Some(chunk),
                // Already logged by the producer, which has since exited;
                // the next recv observes the disconnect.
                Ok(Err(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Ordered chunk sequence that surfaces the terminating read error.
///
/// All successfully-read chunks are yielded before the error.
pub struct TryChunkStream {
    rx: Receiver<io::Result<Chunk>>,
}

impl Iterator for TryChunkStream {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<io::Result<Chunk>> {
        self.rx.recv().ok()
    }
}
