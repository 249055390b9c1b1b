//! Lazy byte sequences and stream comparison
//!
//! [`ByteSequence`] walks a stream front to back in 8 KiB reads.
//! [`ReverseByteSequence`] walks a random-access stream back to front: it
//! loads the highest chunk not yet emitted, yields it in reverse, then moves
//! one chunk towards the start, finishing with a shorter head chunk. This is
//! how an archive is scanned from its end without loading it.
//!
//! Both are single-pass. They dispose their stream once exhausted unless
//! built with `leave_open`. An I/O error is yielded once and ends the
//! sequence.

use crate::error::{Result, StreamError};
use crate::ext::InputStreamExt;
use crate::filter::{abandon, FilterCore};
use crate::partial::Window;
use crate::position::{advance, Position};
use crate::progress::{ProgressCounter, ProgressFn};
use crate::stream::{Dispose, RandomInput, SequentialInput};

/// Read size used by the byte sequences
pub const SEQUENCE_CHUNK_SIZE: usize = 8 * 1024;

/// Read size used by copying and stream comparison
pub const BULK_CHUNK_SIZE: usize = 80 * 1024;

/// Lazy front-to-back sequence of a stream's bytes.
#[derive(Debug)]
pub struct ByteSequence<S> {
    core: FilterCore<S>,
    chunk: Vec<u8>,
    next: usize,
    filled: usize,
    /// Bytes still to be read when a count was given
    remaining: Option<u64>,
    progress: ProgressCounter,
    done: bool,
}

impl<S> ByteSequence<S> {
    /// Every byte up to end-of-data
    pub fn new(stream: S, leave_open: bool) -> Self {
        Self {
            core: FilterCore::new(stream, leave_open),
            chunk: vec![0u8; SEQUENCE_CHUNK_SIZE],
            next: 0,
            filled: 0,
            remaining: None,
            progress: ProgressCounter::silent(),
            done: false,
        }
    }

    /// Exactly `count` bytes; a shorter stream yields `UnexpectedEndOfData`
    pub fn with_count(stream: S, count: u64, leave_open: bool) -> Self {
        Self {
            remaining: Some(count),
            ..Self::new(stream, leave_open)
        }
    }

    /// Report the number of bytes read after every chunk and at the end.
    pub fn with_progress(mut self, report: ProgressFn) -> Self {
        self.progress = ProgressCounter::new(Some(report));
        self
    }

    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn state(&mut self) -> SequenceState<'_, S> {
        SequenceState {
            core: &mut self.core,
            chunk: &mut self.chunk,
            next: &mut self.next,
            filled: &mut self.filled,
            remaining: &mut self.remaining,
            progress: &mut self.progress,
            done: &mut self.done,
        }
    }
}

impl<S> ByteSequence<S> {
    /// `count` bytes starting at `offset` of a random-access stream.
    ///
    /// The range is checked against the stream length and the stream is
    /// seeked to `offset`; on failure the stream is disposed unless
    /// `leave_open`.
    pub fn with_range<P: Position>(mut stream: S, offset: P, count: u64, leave_open: bool) -> Result<Self>
    where
        S: RandomInput<P>,
    {
        let positioned = stream
            .length()
            .and_then(|length| Window::bounded(offset, count).validate(stream.start_of_stream(), length))
            .and_then(|()| stream.seek(offset));
        match positioned {
            Ok(()) => Ok(Self::with_count(stream, count, leave_open)),
            Err(e) => Err(abandon(stream, leave_open, e)),
        }
    }
}

/// Borrowed view of a [`ByteSequence`] shared with the async stream
pub(crate) struct SequenceState<'a, S> {
    pub(crate) core: &'a mut FilterCore<S>,
    pub(crate) chunk: &'a mut Vec<u8>,
    pub(crate) next: &'a mut usize,
    pub(crate) filled: &'a mut usize,
    pub(crate) remaining: &'a mut Option<u64>,
    pub(crate) progress: &'a mut ProgressCounter,
    pub(crate) done: &'a mut bool,
}

impl<S> SequenceState<'_, S> {
    pub(crate) fn pop(&mut self) -> Option<u8> {
        if *self.next < *self.filled {
            let byte = self.chunk[*self.next];
            *self.next += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Size of the next read, 0 once a counted sequence is complete
    pub(crate) fn request(&self) -> usize {
        match *self.remaining {
            Some(remaining) => usize::try_from(remaining).map_or(self.chunk.len(), |r| r.min(self.chunk.len())),
            None => self.chunk.len(),
        }
    }

    /// Commit a completed read; `n == 0` with bytes still owed is an error.
    pub(crate) fn loaded(&mut self, n: usize) -> Result<bool> {
        if n == 0 {
            return match *self.remaining {
                Some(remaining) if remaining > 0 => Err(StreamError::UnexpectedEndOfData),
                _ => Ok(false),
            };
        }
        *self.next = 0;
        *self.filled = n;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= n as u64;
        }
        self.progress.add(n as u64);
        self.progress.report();
        Ok(true)
    }

    pub(crate) fn finished(&mut self) {
        *self.done = true;
        self.progress.report();
    }
}

fn finish<S: Dispose>(state: &mut SequenceState<'_, S>, outcome: Option<Result<u8>>) -> Option<Result<u8>> {
    state.finished();
    let released = if state.core.begin_dispose().is_some() {
        state.core.end_dispose()
    } else {
        Ok(())
    };
    match (outcome, released) {
        (Some(Err(e)), _) => Some(Err(e)),
        (_, Err(e)) => Some(Err(e)),
        (outcome, Ok(())) => outcome,
    }
}

impl<S: SequentialInput> Iterator for ByteSequence<S> {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_done() {
            return None;
        }
        let mut state = self.state();
        if let Some(byte) = state.pop() {
            return Some(Ok(byte));
        }
        let want = state.request();
        if want == 0 {
            return finish(&mut state, None);
        }
        let read = match state.core.get() {
            Ok(inner) => inner.read(&mut state.chunk[..want]),
            Err(e) => Err(e),
        };
        match read.and_then(|n| state.loaded(n)) {
            Ok(true) => state.pop().map(Ok),
            Ok(false) => finish(&mut state, None),
            Err(e) => finish(&mut state, Some(Err(e))),
        }
    }
}

/// Lazy back-to-front sequence of a random-access stream's bytes.
#[derive(Debug)]
pub struct ReverseByteSequence<S, P = u64> {
    core: FilterCore<S>,
    chunk: Vec<u8>,
    /// Bytes of `chunk` not yet yielded; they are yielded from the top down
    pending: usize,
    /// First position of the range
    offset: P,
    /// Bytes between `offset` and the lowest chunk loaded so far
    unloaded: u64,
    progress: ProgressCounter,
    done: bool,
}

impl<S: RandomInput<P>, P: Position> ReverseByteSequence<S, P> {
    /// The whole stream, last byte first
    pub fn new(mut stream: S, leave_open: bool) -> Result<Self> {
        let start = stream.start_of_stream();
        match stream.length() {
            Ok(length) => Self::with_range(stream, start, length, leave_open),
            Err(e) => Err(abandon(stream, leave_open, e)),
        }
    }

    /// `count` bytes starting at `offset`, last byte first
    pub fn with_range(mut stream: S, offset: P, count: u64, leave_open: bool) -> Result<Self> {
        let checked = stream
            .length()
            .and_then(|length| Window::bounded(offset, count).validate(stream.start_of_stream(), length));
        match checked {
            Ok(()) => Ok(Self::from_range(FilterCore::new(stream, leave_open), offset, count)),
            Err(e) => Err(abandon(stream, leave_open, e)),
        }
    }
}

impl<S, P: Position> ReverseByteSequence<S, P> {
    pub(crate) fn from_range(core: FilterCore<S>, offset: P, count: u64) -> Self {
        Self {
            core,
            chunk: vec![0u8; SEQUENCE_CHUNK_SIZE],
            pending: 0,
            offset,
            unloaded: count,
            progress: ProgressCounter::silent(),
            done: false,
        }
    }

    pub fn with_progress(mut self, report: ProgressFn) -> Self {
        self.progress = ProgressCounter::new(Some(report));
        self
    }

    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn state(&mut self) -> ReverseState<'_, S, P> {
        ReverseState {
            core: &mut self.core,
            chunk: &mut self.chunk,
            pending: &mut self.pending,
            offset: self.offset,
            unloaded: &mut self.unloaded,
            progress: &mut self.progress,
            done: &mut self.done,
        }
    }
}

pub(crate) struct ReverseState<'a, S, P> {
    pub(crate) core: &'a mut FilterCore<S>,
    pub(crate) chunk: &'a mut Vec<u8>,
    pub(crate) pending: &'a mut usize,
    pub(crate) offset: P,
    pub(crate) unloaded: &'a mut u64,
    pub(crate) progress: &'a mut ProgressCounter,
    pub(crate) done: &'a mut bool,
}

impl<S, P: Position> ReverseState<'_, S, P> {
    pub(crate) fn pop(&mut self) -> Option<u8> {
        if *self.pending == 0 {
            return None;
        }
        *self.pending -= 1;
        Some(self.chunk[*self.pending])
    }

    /// Where the next chunk starts and how long it is; `None` when done
    pub(crate) fn next_chunk(&self) -> Result<Option<(P, usize)>> {
        if *self.unloaded == 0 {
            return Ok(None);
        }
        let size = usize::try_from(*self.unloaded).map_or(self.chunk.len(), |u| u.min(self.chunk.len()));
        let start = advance(self.offset, *self.unloaded - size as u64)?;
        Ok(Some((start, size)))
    }

    pub(crate) fn loaded(&mut self, size: usize) {
        *self.pending = size;
        *self.unloaded -= size as u64;
        self.progress.add(size as u64);
        self.progress.report();
    }

    pub(crate) fn finished(&mut self) {
        *self.done = true;
        self.progress.report();
    }
}

fn finish_reverse<S: Dispose, P: Position>(
    state: &mut ReverseState<'_, S, P>,
    outcome: Option<Result<u8>>,
) -> Option<Result<u8>> {
    state.finished();
    let released = if state.core.begin_dispose().is_some() {
        state.core.end_dispose()
    } else {
        Ok(())
    };
    match (outcome, released) {
        (Some(Err(e)), _) => Some(Err(e)),
        (_, Err(e)) => Some(Err(e)),
        (outcome, Ok(())) => outcome,
    }
}

fn load_chunk<S: RandomInput<P>, P: Position>(
    inner: &mut S,
    chunk: &mut [u8],
    start: P,
) -> Result<()> {
    inner.seek(start)?;
    inner.read_exact_bytes(chunk)
}

impl<S: RandomInput<P>, P: Position> Iterator for ReverseByteSequence<S, P> {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_done() {
            return None;
        }
        let mut state = self.state();
        if let Some(byte) = state.pop() {
            return Some(Ok(byte));
        }
        let (start, size) = match state.next_chunk() {
            Ok(Some(next)) => next,
            Ok(None) => return finish_reverse(&mut state, None),
            Err(e) => return finish_reverse(&mut state, Some(Err(e))),
        };
        let loaded = match state.core.get() {
            Ok(inner) => load_chunk(inner, &mut state.chunk[..size], start),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(()) => {
                state.loaded(size);
                state.pop().map(Ok)
            }
            Err(e) => finish_reverse(&mut state, Some(Err(e))),
        }
    }
}

/// Compare two streams byte for byte.
///
/// Both streams are read to the first difference (or to their end) and
/// disposed afterwards unless `leave_open`, whatever the outcome.
pub fn stream_bytes_equal<S1: SequentialInput, S2: SequentialInput>(
    first: S1,
    second: S2,
    leave_open: bool,
) -> Result<bool> {
    stream_bytes_equal_with_progress(first, second, None, leave_open)
}

/// [`stream_bytes_equal`], adding the bytes compared to `progress`
pub fn stream_bytes_equal_with_progress<S1: SequentialInput, S2: SequentialInput>(
    mut first: S1,
    mut second: S2,
    progress: Option<&mut ProgressCounter>,
    leave_open: bool,
) -> Result<bool> {
    let outcome = compare_chunks(&mut first, &mut second, progress);
    let released = if leave_open {
        Ok(())
    } else {
        let first_released = first.dispose();
        let second_released = second.dispose();
        first_released.and(second_released)
    };
    let equal = outcome?;
    released?;
    Ok(equal)
}

fn compare_chunks<S1: SequentialInput, S2: SequentialInput>(
    first: &mut S1,
    second: &mut S2,
    mut progress: Option<&mut ProgressCounter>,
) -> Result<bool> {
    let mut left = vec![0u8; BULK_CHUNK_SIZE];
    let mut right = vec![0u8; BULK_CHUNK_SIZE];
    loop {
        let n1 = first.read_fill(&mut left)?;
        let n2 = second.read_fill(&mut right)?;
        if n1 != n2 || left[..n1] != right[..n2] {
            return Ok(false);
        }
        if n1 == 0 {
            return Ok(true);
        }
        if let Some(progress) = progress.as_deref_mut() {
            progress.add(n1 as u64);
            progress.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStream;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_forward_sequence() {
        let data = sample(20_000);
        let bytes: Vec<u8> = ByteSequence::new(MemoryStream::from_vec(data.clone()), false)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_counted_sequence_too_short() {
        let mut sequence = ByteSequence::with_count(MemoryStream::from_vec(vec![1, 2]), 3, false);
        assert_eq!(sequence.next().unwrap().unwrap(), 1);
        assert_eq!(sequence.next().unwrap().unwrap(), 2);
        assert!(matches!(sequence.next(), Some(Err(StreamError::UnexpectedEndOfData))));
        assert!(sequence.next().is_none());
    }

    #[test]
    fn test_forward_range() {
        let base = MemoryStream::from_vec(b"0123456789".to_vec());
        let bytes: Vec<u8> = ByteSequence::with_range(base, 2u64, 5, false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(bytes, b"23456");

        let mut base = MemoryStream::from_vec(b"0123".to_vec());
        assert!(matches!(
            ByteSequence::with_range(&mut base, 2u64, 5, false),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(base.is_disposed());
    }

    #[test]
    fn test_reverse_sequence_spans_partial_head_chunk() {
        let data = sample(SEQUENCE_CHUNK_SIZE * 2 + 123);
        let mut expected = data.clone();
        expected.reverse();
        let bytes: Vec<u8> = ReverseByteSequence::<_, u64>::new(MemoryStream::from_vec(data), false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_reverse_range() {
        let base = MemoryStream::from_vec(b"0123456789".to_vec());
        let bytes: Vec<u8> = ReverseByteSequence::with_range(base, 2u64, 5, false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(bytes, b"65432");
        let base = MemoryStream::from_vec(b"0123".to_vec());
        assert!(ReverseByteSequence::with_range(base, 2u64, 5, false).is_err());
    }

    #[test]
    fn test_sequence_disposes_unless_left_open() {
        let mut base = MemoryStream::from_vec(vec![9; 3]);
        assert_eq!(ByteSequence::new(&mut base, true).count(), 3);
        assert!(!base.is_disposed());
        assert_eq!(ByteSequence::new(&mut base, false).count(), 0);
        assert!(base.is_disposed());
    }

    #[test]
    fn test_compare() {
        let a = sample(200_000);
        let mut b = a.clone();
        assert!(stream_bytes_equal(MemoryStream::from_vec(a.clone()), MemoryStream::from_vec(b.clone()), false).unwrap());
        b[150_000] ^= 1;
        assert!(!stream_bytes_equal(MemoryStream::from_vec(a.clone()), MemoryStream::from_vec(b), false).unwrap());
        assert!(!stream_bytes_equal(MemoryStream::from_vec(a.clone()), MemoryStream::from_vec(a[..1000].to_vec()), false).unwrap());
    }
}
