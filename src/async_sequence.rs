//! Async byte sequences and stream comparison
//!
//! The same [`ByteSequence`] and [`ReverseByteSequence`] values drive the
//! async path: pull bytes with `next_async`, or turn the sequence into a
//! `futures_util::Stream` with `into_stream`.

use crate::async_ext::AsyncInputStreamExt;
use crate::async_stream::{AsyncDispose, AsyncRandomInput, AsyncSequentialInput};
use crate::error::Result;
use crate::filter::{abandon_async, FilterCore};
use crate::partial::Window;
use crate::position::Position;
use crate::progress::ProgressCounter;
use crate::sequence::{ByteSequence, ReverseByteSequence, ReverseState, SequenceState, BULK_CHUNK_SIZE};
use futures_util::stream::{self, Stream};

async fn finish_async<S: AsyncDispose>(
    state: &mut SequenceState<'_, S>,
    outcome: Option<Result<u8>>,
) -> Option<Result<u8>> {
    state.finished();
    let released = if state.core.begin_dispose().is_some() {
        state.core.end_dispose_async().await
    } else {
        Ok(())
    };
    match (outcome, released) {
        (Some(Err(e)), _) => Some(Err(e)),
        (_, Err(e)) => Some(Err(e)),
        (outcome, Ok(())) => outcome,
    }
}

impl<S> ByteSequence<S> {
    /// Async counterpart of [`ByteSequence::with_range`]
    pub async fn with_range_async<P: Position>(
        mut stream: S,
        offset: P,
        count: u64,
        leave_open: bool,
    ) -> Result<Self>
    where
        S: AsyncRandomInput<P>,
    {
        let checked = match stream.length_async().await {
            Ok(length) => Window::bounded(offset, count).validate(stream.start_of_stream(), length),
            Err(e) => Err(e),
        };
        let positioned = match checked {
            Ok(()) => stream.seek_async(offset).await,
            Err(e) => Err(e),
        };
        match positioned {
            Ok(()) => Ok(Self::with_count(stream, count, leave_open)),
            Err(e) => Err(abandon_async(stream, leave_open, e).await),
        }
    }
}

impl<S: AsyncSequentialInput> ByteSequence<S> {
    /// Next byte, `None` once the sequence is exhausted
    pub async fn next_async(&mut self) -> Option<Result<u8>> {
        if self.is_done() {
            return None;
        }
        let mut state = self.state();
        if let Some(byte) = state.pop() {
            return Some(Ok(byte));
        }
        let want = state.request();
        if want == 0 {
            return finish_async(&mut state, None).await;
        }
        let read = match state.core.get() {
            Ok(inner) => inner.read_async(&mut state.chunk[..want]).await,
            Err(e) => Err(e),
        };
        match read.and_then(|n| state.loaded(n)) {
            Ok(true) => state.pop().map(Ok),
            Ok(false) => finish_async(&mut state, None).await,
            Err(e) => finish_async(&mut state, Some(Err(e))).await,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<u8>> {
        stream::unfold(self, |mut sequence| async move {
            let item = sequence.next_async().await?;
            Some((item, sequence))
        })
    }
}

async fn finish_reverse_async<S: AsyncDispose, P: Position>(
    state: &mut ReverseState<'_, S, P>,
    outcome: Option<Result<u8>>,
) -> Option<Result<u8>> {
    state.finished();
    let released = if state.core.begin_dispose().is_some() {
        state.core.end_dispose_async().await
    } else {
        Ok(())
    };
    match (outcome, released) {
        (Some(Err(e)), _) => Some(Err(e)),
        (_, Err(e)) => Some(Err(e)),
        (outcome, Ok(())) => outcome,
    }
}

async fn load_chunk_async<S: AsyncRandomInput<P>, P: Position>(
    inner: &mut S,
    chunk: &mut [u8],
    start: P,
) -> Result<()> {
    inner.seek_async(start).await?;
    inner.read_exact_bytes_async(chunk).await
}

impl<S: AsyncRandomInput<P>, P: Position> ReverseByteSequence<S, P> {
    /// Async counterpart of [`ReverseByteSequence::new`]
    pub async fn new_async(mut stream: S, leave_open: bool) -> Result<Self> {
        let start = stream.start_of_stream();
        match stream.length_async().await {
            Ok(length) => Self::with_range_async(stream, start, length, leave_open).await,
            Err(e) => Err(abandon_async(stream, leave_open, e).await),
        }
    }

    /// Async counterpart of [`ReverseByteSequence::with_range`]
    pub async fn with_range_async(
        mut stream: S,
        offset: P,
        count: u64,
        leave_open: bool,
    ) -> Result<Self> {
        let checked = match stream.length_async().await {
            Ok(length) => Window::bounded(offset, count).validate(stream.start_of_stream(), length),
            Err(e) => Err(e),
        };
        match checked {
            Ok(()) => Ok(Self::from_range(FilterCore::new(stream, leave_open), offset, count)),
            Err(e) => Err(abandon_async(stream, leave_open, e).await),
        }
    }

    pub async fn next_async(&mut self) -> Option<Result<u8>> {
        if self.is_done() {
            return None;
        }
        let mut state = self.state();
        if let Some(byte) = state.pop() {
            return Some(Ok(byte));
        }
        let (start, size) = match state.next_chunk() {
            Ok(Some(next)) => next,
            Ok(None) => return finish_reverse_async(&mut state, None).await,
            Err(e) => return finish_reverse_async(&mut state, Some(Err(e))).await,
        };
        let loaded = match state.core.get() {
            Ok(inner) => load_chunk_async(inner, &mut state.chunk[..size], start).await,
            Err(e) => Err(e),
        };
        match loaded {
            Ok(()) => {
                state.loaded(size);
                state.pop().map(Ok)
            }
            Err(e) => finish_reverse_async(&mut state, Some(Err(e))).await,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<u8>> {
        stream::unfold(self, |mut sequence| async move {
            let item = sequence.next_async().await?;
            Some((item, sequence))
        })
    }
}

/// Async counterpart of [`stream_bytes_equal`](crate::stream_bytes_equal)
pub async fn stream_bytes_equal_async<S1: AsyncSequentialInput, S2: AsyncSequentialInput>(
    first: S1,
    second: S2,
    leave_open: bool,
) -> Result<bool> {
    stream_bytes_equal_with_progress_async(first, second, None, leave_open).await
}

pub async fn stream_bytes_equal_with_progress_async<S1, S2>(
    mut first: S1,
    mut second: S2,
    mut progress: Option<&mut ProgressCounter>,
    leave_open: bool,
) -> Result<bool>
where
    S1: AsyncSequentialInput,
    S2: AsyncSequentialInput,
{
    let mut left = vec![0u8; BULK_CHUNK_SIZE];
    let mut right = vec![0u8; BULK_CHUNK_SIZE];
    let outcome: Result<bool> = async {
        loop {
            let n1 = first.read_fill_async(&mut left).await?;
            let n2 = second.read_fill_async(&mut right).await?;
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
    .await;
    let released = if leave_open {
        Ok(())
    } else {
        let first_released = first.dispose_async().await;
        let second_released = second.dispose_async().await;
        first_released.and(second_released)
    };
    let equal = outcome?;
    released?;
    Ok(equal)
}

/// Collect a byte stream, stopping at the first error.
pub async fn collect_bytes<St: Stream<Item = Result<u8>>>(bytes: St) -> Result<Vec<u8>> {
    use futures_util::TryStreamExt;
    bytes.try_collect().await
}
