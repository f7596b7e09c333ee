//! Uniform random access over seekable and sequential byte sources.
//!
//! ## Why
//!
//! The first bytes of many inputs are inspected twice: once for format
//! sniffing, then again for the real scan. Files support that natively;
//! network bodies do not. [`BufferedReadSeeker`] gives both the same
//! `Read + Seek` surface, buffering only what the sniffing phase touches.
//! Once the caller finishes sniffing it calls
//! [`disable_buffering`](BufferedReadSeeker::disable_buffering) and the bulk
//! of the stream flows through without being captured, bounding memory on
//! unbounded inputs.
//!
//! ## Capability selection
//!
//! The source's capability is fixed at construction: [`new`] wraps any
//! `Read` as sequential-only, [`with_seekable`] wraps a `Read + Seek` and
//! delegates every operation to it, leaving the buffer unused. There is no
//! runtime downgrade between the two.
//!
//! [`new`]: BufferedReadSeeker::new
//! [`with_seekable`]: BufferedReadSeeker::with_seekable
//!
//! ## Sequential-mode semantics
//!
//! - `index` is the logical position; seeks from start/current are pure
//!   arithmetic and perform no I/O.
//! - Reads inside the buffer copy from it; reads past it either pull more
//!   bytes into the buffer (buffering active) or stream directly from the
//!   source (buffering disabled, bytes consumed exactly once).
//! - End-relative seeks must discover the total length by draining the
//!   remaining stream in [`DRAIN_CHUNK_SIZE`] pulls: O(remaining) and
//!   destructive for unbuffered bytes. Known cost of asking a pipe its size.
//!
//! ## Ownership
//!
//! Not internally synchronized. One instance per input stream, one owner
//! issuing calls; the wrapped source is owned exclusively for the wrapper's
//! lifetime.

use std::io::{self, Read, Seek, SeekFrom};

/// Pull increment for draining a sequential source on end-relative seeks.
const DRAIN_CHUNK_SIZE: usize = 64 * 1024;

trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Source capability, fixed at construction.
enum Source {
    /// Natively seekable: every operation delegates, the buffer stays empty.
    Seekable(Box<dyn ReadSeek>),
    /// Sequential-only: random access is emulated via the accumulation
    /// buffer.
    Sequential(Box<dyn Read + Send>),
}

/// `Read + Seek` adapter over a source that may or may not support seeking.
///
/// See the [module docs](self) for the buffering model. Additional surface
/// beyond the std traits: [`read_at`](Self::read_at), [`size`](Self::size),
/// [`disable_buffering`](Self::disable_buffering).
pub struct BufferedReadSeeker {
    source: Source,
    /// Bytes captured from a sequential source while buffering is active.
    buffer: Vec<u8>,
    /// High-water mark of bytes consumed from the underlying source.
    bytes_read: u64,
    /// Logical read position.
    index: u64,
    /// While set, sequential reads past the buffer are captured into it.
    active_buffering: bool,
}

impl BufferedReadSeeker {
    /// Wraps a sequential-only source.
    ///
    /// Backward seeks work within data read while buffering was active;
    /// end-relative seeks drain the stream to learn its length.
    pub fn new<R: Read + Send + 'static>(source: R) -> Self {
        Self {
            source: Source::Sequential(Box::new(source)),
            buffer: Vec::new(),
            bytes_read: 0,
            index: 0,
            active_buffering: true,
        }
    }

    /// Wraps a natively seekable source; all operations delegate to it and
    /// nothing is buffered.
    pub fn with_seekable<R: Read + Seek + Send + 'static>(source: R) -> Self {
        Self {
            source: Source::Seekable(Box::new(source)),
            buffer: Vec::new(),
            bytes_read: 0,
            index: 0,
            active_buffering: false,
        }
    }

    /// True when the wrapped source supports native seeking.
    pub fn is_seekable(&self) -> bool {
        matches!(self.source, Source::Seekable(_))
    }

    /// Bytes currently held in the accumulation buffer.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// High-water mark of bytes consumed from the underlying source.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Stops capturing further reads into the buffer. Idempotent, one-way.
    ///
    /// Bytes already buffered remain re-readable via backward seeks; bytes
    /// read after this call on a sequential source are consumed exactly
    /// once. Call once initial sniffing is done.
    pub fn disable_buffering(&mut self) {
        self.active_buffering = false;
    }

    /// Total stream length.
    ///
    /// Position is preserved. On a sequential source this drains the
    /// remaining stream to find the end: O(remaining), and bytes skipped
    /// while buffering is disabled cannot be read again afterwards.
    pub fn size(&mut self) -> io::Result<u64> {
        let cur = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(cur))?;
        Ok(end)
    }

    /// Reads up to `out.len()` bytes at `offset` without assuming the
    /// current position.
    ///
    /// Composed of `Seek(Start(offset))` then one `read`. If the seek lands
    /// anywhere but `offset` (a native seeker clamping at end of stream)
    /// this returns `UnexpectedEof` with zero bytes rather than data from
    /// the wrong position.
    pub fn read_at(&mut self, out: &mut [u8], offset: u64) -> io::Result<usize> {
        let pos = self.seek(SeekFrom::Start(offset))?;
        if pos != offset {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "offset past end of stream",
            ));
        }
        self.read(out)
    }

    /// Serves a sequential-mode read according to where `index` sits
    /// relative to the buffer and whether buffering is active.
    fn read_sequential(&mut self, out: &mut [u8]) -> io::Result<usize> {
        // Rewound into captured data: copy without touching the source.
        // Short reads are fine per the Read contract; a following call
        // falls through to the cases below.
        if self.index < self.buffer.len() as u64 {
            let start = self.index as usize;
            let n = (self.buffer.len() - start).min(out.len());
            out[..n].copy_from_slice(&self.buffer[start..start + n]);
            self.index += n as u64;
            return Ok(n);
        }

        if !self.active_buffering {
            // Pass-through: bytes reach the caller without being captured.
            let inner = match &mut self.source {
                Source::Sequential(r) => r,
                Source::Seekable(_) => unreachable!("sequential path"),
            };
            let n = inner.read(out)?;
            self.index += n as u64;
            self.bytes_read += n as u64;
            return Ok(n);
        }

        // Capture mode: pull enough from the source to cover the request
        // (including any gap a forward seek opened), then copy out. If the
        // pull fails midway, whatever landed in the buffer is still served;
        // the error reappears on the next call.
        let target = (self.index as usize).saturating_add(out.len());
        let fill = self.fill_buffer(target);
        let start = self.index as usize;
        if self.buffer.len() > start {
            let n = (self.buffer.len() - start).min(out.len());
            out[..n].copy_from_slice(&self.buffer[start..start + n]);
            self.index += n as u64;
            return Ok(n);
        }
        fill.map(|_| 0)
    }

    /// Extends the buffer from the source until it holds `target` bytes or
    /// the stream ends.
    fn fill_buffer(&mut self, target: usize) -> io::Result<()> {
        let inner = match &mut self.source {
            Source::Sequential(r) => r,
            Source::Seekable(_) => unreachable!("sequential path"),
        };
        while self.buffer.len() < target {
            let start = self.buffer.len();
            self.buffer.resize(target, 0);
            match inner.read(&mut self.buffer[start..]) {
                Ok(0) => {
                    self.buffer.truncate(start);
                    break;
                }
                Ok(n) => {
                    self.buffer.truncate(start + n);
                    self.bytes_read += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.buffer.truncate(start)
                }
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Consumes the rest of a sequential stream to learn its total length.
    ///
    /// Captures into the buffer while buffering is active, otherwise only
    /// counts. End of stream means "done collecting", not failure.
    fn drain_remaining(&mut self) -> io::Result<u64> {
        if self.active_buffering {
            loop {
                let target = self.buffer.len() + DRAIN_CHUNK_SIZE;
                let before = self.buffer.len();
                self.fill_buffer(target)?;
                if self.buffer.len() == before {
                    break;
                }
            }
            return Ok(self.bytes_read);
        }

        let inner = match &mut self.source {
            Source::Sequential(r) => r,
            Source::Seekable(_) => unreachable!("sequential path"),
        };
        let mut scratch = vec![0u8; DRAIN_CHUNK_SIZE];
        loop {
            match inner.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => self.bytes_read += n as u64,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(self.bytes_read)
    }
}

impl Read for BufferedReadSeeker {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        match &mut self.source {
            Source::Seekable(inner) => {
                let n = inner.read(out)?;
                self.index += n as u64;
                self.bytes_read = self.bytes_read.max(self.index);
                Ok(n)
            }
            Source::Sequential(_) => self.read_sequential(out),
        }
    }
}

impl Seek for BufferedReadSeeker {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if let Source::Seekable(inner) = &mut self.source {
            let new = inner.seek(pos)?;
            self.index = new;
            self.bytes_read = self.bytes_read.max(new);
            return Ok(new);
        }

        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.index = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.index, delta),
            SeekFrom::End(delta) => (self.drain_remaining()?, delta),
        };

        let new = if delta >= 0 {
            base.checked_add(delta as u64).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid seek to an overflowing position",
                )
            })?
        } else {
            base.checked_sub(delta.unsigned_abs()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid seek to a negative position",
                )
            })?
        };
        self.index = new;
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Strips the `Seek` capability off a reader for sequential-mode tests.
    struct SequentialOnly<R: Read>(R);

    impl<R: Read> Read for SequentialOnly<R> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            self.0.read(out)
        }
    }

    fn sequential(data: &[u8]) -> BufferedReadSeeker {
        BufferedReadSeeker::new(SequentialOnly(Cursor::new(data.to_vec())))
    }

    fn seekable(data: &[u8]) -> BufferedReadSeeker {
        BufferedReadSeeker::with_seekable(Cursor::new(data.to_vec()))
    }

    fn read_all(r: &mut BufferedReadSeeker) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn identity_both_modes() {
        let data: Vec<u8> = (0..1000u32).map(|v| (v % 256) as u8).collect();
        assert_eq!(read_all(&mut sequential(&data)), data);
        assert_eq!(read_all(&mut seekable(&data)), data);
    }

    #[test]
    fn end_relative_seek_on_sequential_source() {
        // The documented scenario: 9 bytes, Seek(-4, End) lands on 5 and the
        // following read returns the last four bytes.
        let mut r = sequential(b"test data");
        let pos = r.seek(SeekFrom::End(-4)).unwrap();
        assert_eq!(pos, 5);

        let mut out = [0u8; 4];
        r.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"data");
    }

    #[test]
    fn seek_then_read_matches_slice_both_modes() {
        let data: Vec<u8> = (0..500u32).map(|v| (v * 7 % 256) as u8).collect();
        for mut r in [sequential(&data), seekable(&data)] {
            for offset in [0u64, 1, 9, 250, 499, 500] {
                r.seek(SeekFrom::Start(offset)).unwrap();
                let mut rest = Vec::new();
                r.read_to_end(&mut rest).unwrap();
                assert_eq!(rest, &data[offset as usize..], "offset={offset}");
            }
        }
    }

    #[test]
    fn rewind_within_buffered_data() {
        let mut r = sequential(b"abcdefghij");
        let mut first = [0u8; 6];
        r.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"abcdef");

        r.seek(SeekFrom::Start(2)).unwrap();
        let mut again = [0u8; 4];
        r.read_exact(&mut again).unwrap();
        assert_eq!(&again, b"cdef", "re-read comes from the buffer");
    }

    #[test]
    fn buffering_toggle_tradeoff() {
        let data: Vec<u8> = (b'a'..=b'z').collect();
        let mut r = sequential(&data);

        // Sniffing window: first 8 bytes, buffered.
        let mut head = [0u8; 8];
        r.read_exact(&mut head).unwrap();
        r.disable_buffering();

        // Bulk phase: consumed exactly once, not captured.
        let mut bulk = [0u8; 10];
        r.read_exact(&mut bulk).unwrap();
        assert_eq!(r.buffered_len(), 8);

        // The sniffing window stays re-readable...
        r.seek(SeekFrom::Start(0)).unwrap();
        let mut head_again = [0u8; 8];
        r.read_exact(&mut head_again).unwrap();
        assert_eq!(head, head_again);

        // ...but the next read resumes at the source's position, past the
        // bytes that streamed through unbuffered.
        let mut next = [0u8; 4];
        r.read_exact(&mut next).unwrap();
        assert_eq!(&next, b"stuv");
    }

    #[test]
    fn negative_seek_rejected_index_unchanged() {
        for mut r in [sequential(b"hello world"), seekable(b"hello world")] {
            r.seek(SeekFrom::Start(4)).unwrap();
            let err = r.seek(SeekFrom::Current(-10)).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
            assert_eq!(r.stream_position().unwrap(), 4, "index unchanged");

            let err = r.seek(SeekFrom::End(-100)).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn size_preserves_position() {
        let data: Vec<u8> = vec![3u8; 300];
        for mut r in [sequential(&data), seekable(&data)] {
            r.seek(SeekFrom::Start(17)).unwrap();
            assert_eq!(r.size().unwrap(), 300);
            assert_eq!(r.stream_position().unwrap(), 17);
            // And reads resume correctly after the drain.
            let mut rest = Vec::new();
            r.read_to_end(&mut rest).unwrap();
            assert_eq!(rest.len(), 283);
        }
    }

    #[test]
    fn read_at_both_modes() {
        let data = b"0123456789";
        for mut r in [sequential(data), seekable(data)] {
            let mut out = [0u8; 3];
            let n = r.read_at(&mut out, 4).unwrap();
            assert_eq!(n, 3);
            assert_eq!(&out, b"456");
        }
    }

    #[test]
    fn read_at_past_end_of_seekable_source() {
        // Whether the native seeker clamps the seek or allows it and then
        // reads nothing, no wrong-position data may come back.
        let mut r = seekable(b"abc");
        let mut out = [0u8; 2];
        match r.read_at(&mut out, 10) {
            Ok(0) => {}
            Ok(n) => panic!("read {n} bytes past end"),
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
        }
    }

    #[test]
    fn forward_seek_gap_is_filled_while_buffering() {
        let data: Vec<u8> = (0..200u8).collect();
        let mut r = sequential(&data);

        // Jump past everything read so far; the gap is pulled into the
        // buffer on the next read, so rewinding still works afterwards.
        r.seek(SeekFrom::Start(150)).unwrap();
        let mut out = [0u8; 10];
        r.read_exact(&mut out).unwrap();
        assert_eq!(&out[..], &data[150..160]);

        r.seek(SeekFrom::Start(0)).unwrap();
        let mut head = [0u8; 10];
        r.read_exact(&mut head).unwrap();
        assert_eq!(&head[..], &data[..10]);
    }

    #[test]
    fn seek_current_is_arithmetic_on_sequential() {
        let mut r = sequential(b"abcdefghij");
        assert_eq!(r.seek(SeekFrom::Current(4)).unwrap(), 4);
        assert_eq!(r.seek(SeekFrom::Current(-2)).unwrap(), 2);
        let mut out = [0u8; 3];
        r.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"cde");
    }

    #[test]
    fn bytes_read_high_water_mark() {
        let mut r = sequential(b"0123456789");
        let mut out = [0u8; 4];
        r.read_exact(&mut out).unwrap();
        assert_eq!(r.bytes_read(), 4);

        // Rewind and re-read: served from the buffer, no new source bytes.
        r.seek(SeekFrom::Start(0)).unwrap();
        r.read_exact(&mut out).unwrap();
        assert_eq!(r.bytes_read(), 4);
    }

    #[test]
    fn seekable_mode_never_buffers() {
        let data: Vec<u8> = vec![8u8; 4096];
        let mut r = seekable(&data);
        let _ = read_all(&mut r);
        r.seek(SeekFrom::Start(0)).unwrap();
        let _ = read_all(&mut r);
        assert_eq!(r.buffered_len(), 0);
    }

    #[test]
    fn empty_stream_size_is_zero() {
        let mut r = sequential(b"");
        assert_eq!(r.size().unwrap(), 0);
        let mut out = [0u8; 1];
        assert_eq!(r.read(&mut out).unwrap(), 0);
    }
}
