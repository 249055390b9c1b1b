//! Buffering filters
//!
//! [`BufferedInput`] and [`BufferedRandomInput`] read ahead in bulk and serve
//! small reads from memory. [`BufferedOutput`] collects writes and pushes
//! them to the base stream when the cache fills, on `flush`, on `seek`, and
//! on disposal.
//!
//! Requests at least as large as the cache bypass it.

use crate::error::{Result, StreamError};
use crate::filter::{abandon, FilterCore};
use crate::position::{advance, distance, Position};
use crate::stream::{
    Dispose, RandomAccess, RandomInput, RandomOutput, SequentialInput, SequentialOutput,
    StreamOrigin,
};

/// Default cache capacity (64 KiB)
pub const DEFAULT_CACHE_SIZE: usize = 64 * 1024;

/// Configuration for buffering filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache capacity in bytes (default: 64 KiB, must be at least 1)
    pub cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    /// Small cache for many concurrently open streams
    pub fn small() -> Self {
        Self { cache_size: 4 * 1024 }
    }

    /// Large cache for bulk sequential transfers
    pub fn large() -> Self {
        Self {
            cache_size: 1024 * 1024,
        }
    }

    /// Set cache capacity
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(StreamError::invalid("cache size must be at least 1 byte"));
        }
        Ok(())
    }
}

/// Read-ahead cache: `buf[start..end]` holds bytes not yet handed out.
#[derive(Debug)]
pub(crate) struct ReadCache {
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl ReadCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            start: 0,
            end: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.start >= self.end
    }

    pub(crate) fn valid(&self) -> usize {
        self.end
    }

    pub(crate) fn cursor(&self) -> usize {
        self.start
    }

    /// Copy cached bytes into `out`
    pub(crate) fn take(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.end - self.start);
        out[..n].copy_from_slice(&self.buf[self.start..self.start + n]);
        self.start += n;
        n
    }

    /// Whole buffer, for a refill that is committed with [`ReadCache::filled`]
    pub(crate) fn spare(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub(crate) fn filled(&mut self, n: usize) {
        self.start = 0;
        self.end = n;
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.start = cursor;
    }

    pub(crate) fn invalidate(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}

/// Write-behind cache.
pub(crate) struct WriteCache {
    buf: Vec<u8>,
    capacity: usize,
}

impl WriteCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn fits(&self, extra: usize) -> bool {
        self.buf.len() + extra <= self.capacity
    }

    pub(crate) fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Forget the first `n` pending bytes once the base accepted them
    pub(crate) fn consume(&mut self, n: usize) {
        self.buf.drain(..n);
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }
}

impl std::fmt::Debug for WriteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCache")
            .field("pending", &self.buf.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Drop for WriteCache {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            tracing::warn!(
                pending = self.buf.len(),
                "buffered output dropped with unflushed bytes"
            );
        }
    }
}

/// Sequential input with a read-ahead cache.
#[derive(Debug)]
pub struct BufferedInput<S> {
    core: FilterCore<S>,
    cache: ReadCache,
}

impl<S: SequentialInput> BufferedInput<S> {
    /// Fails with `InvalidArgument` for a zero cache size; the base is
    /// disposed on failure unless `leave_open`.
    pub fn new(inner: S, config: CacheConfig, leave_open: bool) -> Result<Self> {
        match config.validate() {
            Ok(()) => Ok(Self::from_core(FilterCore::new(inner, leave_open), config)),
            Err(e) => Err(abandon(inner, leave_open, e)),
        }
    }
}

impl<S> BufferedInput<S> {
    pub(crate) fn from_core(core: FilterCore<S>, config: CacheConfig) -> Self {
        Self {
            core,
            cache: ReadCache::new(config.cache_size),
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.capacity()
    }

    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut ReadCache)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.cache))
    }

    pub(crate) fn core_mut(&mut self) -> &mut FilterCore<S> {
        &mut self.core
    }
}

impl<S: SequentialInput> Dispose for BufferedInput<S> {
    fn dispose(&mut self) -> Result<()> {
        if self.core.begin_dispose().is_none() {
            return Ok(());
        }
        self.cache.invalidate();
        self.core.end_dispose()
    }
}

impl<S: SequentialInput> SequentialInput for BufferedInput<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, cache) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if cache.is_exhausted() {
            if buf.len() >= cache.capacity() {
                return inner.read(buf);
            }
            let n = inner.read(cache.spare())?;
            cache.filled(n);
        }
        Ok(cache.take(buf))
    }
}

/// Random-access input with a read-ahead cache.
///
/// A seek that lands inside the cached range only moves the cache cursor.
/// On teardown with `leave_open` (and in `into_inner`) the base is seeked
/// back to the filter's logical position, so the caller carries on where
/// the filter stopped rather than at the end of the read-ahead.
#[derive(Debug)]
pub struct BufferedRandomInput<S, P = u64> {
    core: FilterCore<S>,
    cache: ReadCache,
    /// Base position of the first cached byte; `None` while nothing is cached
    origin: Option<P>,
}

impl<S: RandomInput<P>, P: Position> BufferedRandomInput<S, P> {
    pub fn new(inner: S, config: CacheConfig, leave_open: bool) -> Result<Self> {
        match config.validate() {
            Ok(()) => Ok(Self::from_core(FilterCore::new(inner, leave_open), config)),
            Err(e) => Err(abandon(inner, leave_open, e)),
        }
    }

    /// Hand back the base stream, positioned where this filter stood.
    pub fn into_inner(mut self) -> Result<S> {
        if let Ok((inner, cache, origin)) = self.parts() {
            if let Some(position) = logical_position(*origin, cache)? {
                inner.seek(position)?;
            }
        }
        Ok(self.into_core().into_inner())
    }
}

impl<S, P> BufferedRandomInput<S, P> {
    pub(crate) fn from_core(core: FilterCore<S>, config: CacheConfig) -> Self {
        Self {
            core,
            cache: ReadCache::new(config.cache_size),
            origin: None,
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.capacity()
    }

    pub(crate) fn into_core(self) -> FilterCore<S> {
        self.core
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut ReadCache, &mut Option<P>)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.cache, &mut self.origin))
    }

    pub(crate) fn core_mut(&mut self) -> &mut FilterCore<S> {
        &mut self.core
    }

    /// Tear down the cache; yields the base and, when it was left open, the
    /// position it must be moved back to.
    pub(crate) fn teardown_parts(&mut self) -> Option<(&mut S, Result<Option<P>>)>
    where
        P: Position,
    {
        let leave_open = self.core.leaves_open();
        let inner = self.core.begin_dispose()?;
        let realign = if leave_open {
            logical_position(self.origin, &self.cache)
        } else {
            Ok(None)
        };
        self.cache.invalidate();
        self.origin = None;
        Some((inner, realign))
    }
}

/// Position the filter reports while bytes are cached; `None` when the base
/// already stands there
pub(crate) fn logical_position<P: Position>(origin: Option<P>, cache: &ReadCache) -> Result<Option<P>> {
    origin.map(|o| advance(o, cache.cursor() as u64)).transpose()
}

/// Cursor inside the cache for `target`, if the cache covers it
pub(crate) fn cached_cursor<P: Position>(
    origin: Option<P>,
    cache: &ReadCache,
    target: P,
) -> Option<usize> {
    let origin = origin?;
    if target < origin {
        return None;
    }
    let offset = usize::try_from(target.checked_distance(origin)?).ok()?;
    (offset <= cache.valid()).then_some(offset)
}

/// Base position right after the cached bytes
pub(crate) fn cache_end<P: Position>(origin: P, cache: &ReadCache) -> Result<P> {
    advance(origin, cache.valid() as u64)
}

impl<S: RandomInput<P>, P: Position> Dispose for BufferedRandomInput<S, P> {
    fn dispose(&mut self) -> Result<()> {
        let Some((inner, realign)) = self.teardown_parts() else {
            return Ok(());
        };
        let realigned = match realign {
            Ok(Some(position)) => inner.seek(position),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        let released = self.core.end_dispose();
        realigned.and(released)
    }
}

impl<S: RandomInput<P>, P: Position> SequentialInput for BufferedRandomInput<S, P> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, cache, origin) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if cache.is_exhausted() {
            if buf.len() >= cache.capacity() {
                cache.invalidate();
                *origin = None;
                return inner.read(buf);
            }
            let refill_at = match *origin {
                Some(o) => cache_end(o, cache)?,
                None => inner.position()?,
            };
            let n = inner.read(cache.spare())?;
            cache.filled(n);
            *origin = (n > 0).then_some(refill_at);
        }
        Ok(cache.take(buf))
    }
}

impl<S: StreamOrigin<P>, P: Position> StreamOrigin<P> for BufferedRandomInput<S, P> {
    fn start_of_stream(&self) -> P {
        self.core.get_ref().start_of_stream()
    }
}

impl<S: RandomInput<P>, P: Position> RandomAccess<P> for BufferedRandomInput<S, P> {
    fn position(&mut self) -> Result<P> {
        let (inner, cache, origin) = self.parts()?;
        match logical_position(*origin, cache)? {
            Some(position) => Ok(position),
            None => inner.position(),
        }
    }

    fn seek(&mut self, position: P) -> Result<()> {
        let (inner, cache, origin) = self.parts()?;
        if let Some(cursor) = cached_cursor(*origin, cache, position) {
            cache.set_cursor(cursor);
            return Ok(());
        }
        inner.seek(position)?;
        cache.invalidate();
        *origin = None;
        Ok(())
    }

    fn length(&mut self) -> Result<u64> {
        self.core.get()?.length()
    }
}

/// Drains the cache into the base when an undisposed output is dropped
type DropDrain<S> = fn(&mut S, &mut WriteCache) -> Result<()>;

/// Output with a write-behind cache, sequential or random depending on the
/// base stream.
///
/// A synchronous output dropped without `flush` or `dispose` writes its
/// pending bytes to the base on a best-effort basis, like
/// `std::io::BufWriter`; a failure there is logged and the bytes are lost.
/// Outputs built with `new_async` cannot wait in `drop`: they only log the
/// pending count.
pub struct BufferedOutput<S> {
    /// `None` only once `into_core` has taken it
    core: Option<FilterCore<S>>,
    cache: WriteCache,
    drop_drain: Option<DropDrain<S>>,
}

impl<S: SequentialOutput> BufferedOutput<S> {
    pub fn new(inner: S, config: CacheConfig, leave_open: bool) -> Result<Self> {
        match config.validate() {
            Ok(()) => {
                let mut output = Self::from_core(FilterCore::new(inner, leave_open), config);
                output.drop_drain = Some(drain_and_flush::<S>);
                Ok(output)
            }
            Err(e) => Err(abandon(inner, leave_open, e)),
        }
    }
}

impl<S> BufferedOutput<S> {
    pub(crate) fn from_core(core: FilterCore<S>, config: CacheConfig) -> Self {
        Self {
            core: Some(core),
            cache: WriteCache::new(config.cache_size),
            drop_drain: None,
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.capacity()
    }

    /// Bytes accepted but not yet written to the base stream
    pub fn pending_len(&self) -> usize {
        self.cache.pending().len()
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut WriteCache)> {
        let inner = self.core.as_mut().ok_or(StreamError::Disposed)?.get()?;
        Ok((inner, &mut self.cache))
    }

    pub(crate) fn teardown_parts(&mut self) -> Option<(&mut S, &mut WriteCache)> {
        let inner = self.core.as_mut()?.begin_dispose()?;
        Some((inner, &mut self.cache))
    }

    fn core_ref(&self) -> &FilterCore<S> {
        match &self.core {
            Some(core) => core,
            None => unreachable!("buffered output used after into_core"),
        }
    }

    pub(crate) fn core_mut(&mut self) -> Result<&mut FilterCore<S>> {
        self.core.as_mut().ok_or(StreamError::Disposed)
    }

    /// Take the core out; the cache must already be drained.
    pub(crate) fn into_core(mut self) -> Result<FilterCore<S>> {
        self.core.take().ok_or(StreamError::Disposed)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for BufferedOutput<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedOutput")
            .field("core", &self.core)
            .field("cache", &self.cache)
            .field("drains_on_drop", &self.drop_drain.is_some())
            .finish()
    }
}

impl<S> Drop for BufferedOutput<S> {
    fn drop(&mut self) {
        if self.cache.pending().is_empty() {
            return;
        }
        let (Some(drain), Some(core)) = (self.drop_drain, self.core.as_mut()) else {
            return;
        };
        let Ok(inner) = core.get() else {
            return;
        };
        if let Err(e) = drain(inner, &mut self.cache) {
            tracing::warn!(
                error = %e,
                pending = self.cache.pending().len(),
                "draining buffered output on drop failed"
            );
            self.cache.clear();
        }
    }
}

impl<S: SequentialOutput> BufferedOutput<S> {
    /// Flush pending bytes and hand back the base stream.
    pub fn into_inner(mut self) -> Result<S> {
        if let Ok((inner, cache)) = self.parts() {
            drain(inner, cache)?;
        }
        Ok(self.into_core()?.into_inner())
    }
}

fn drain<S: SequentialOutput>(inner: &mut S, cache: &mut WriteCache) -> Result<()> {
    while !cache.pending().is_empty() {
        let n = inner.write(cache.pending())?;
        if n == 0 {
            return Err(StreamError::write_zero());
        }
        cache.consume(n);
    }
    Ok(())
}

fn drain_and_flush<S: SequentialOutput>(inner: &mut S, cache: &mut WriteCache) -> Result<()> {
    drain(inner, cache)?;
    inner.flush()
}

impl<S: SequentialOutput> Dispose for BufferedOutput<S> {
    fn dispose(&mut self) -> Result<()> {
        let Some((inner, cache)) = self.teardown_parts() else {
            return Ok(());
        };
        let flushed = drain_and_flush(inner, cache);
        cache.clear();
        let released = self.core_mut().and_then(|core| core.end_dispose());
        flushed.and(released)
    }
}

impl<S: SequentialOutput> SequentialOutput for BufferedOutput<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, cache) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if !cache.fits(buf.len()) {
            drain(inner, cache)?;
        }
        if buf.len() >= cache.capacity() {
            return inner.write(buf);
        }
        cache.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        let (inner, cache) = self.parts()?;
        drain(inner, cache)?;
        inner.flush()
    }
}

impl<S: StreamOrigin<P>, P: Position> StreamOrigin<P> for BufferedOutput<S> {
    fn start_of_stream(&self) -> P {
        self.core_ref().get_ref().start_of_stream()
    }
}

impl<S: RandomOutput<P>, P: Position> RandomAccess<P> for BufferedOutput<S> {
    fn position(&mut self) -> Result<P> {
        let (inner, cache) = self.parts()?;
        advance(inner.position()?, cache.pending().len() as u64)
    }

    fn seek(&mut self, position: P) -> Result<()> {
        let (inner, cache) = self.parts()?;
        drain(inner, cache)?;
        inner.seek(position)
    }

    /// Base length, extended by pending bytes that run past it
    fn length(&mut self) -> Result<u64> {
        let (inner, cache) = self.parts()?;
        let base_length = inner.length()?;
        let pending_end = advance(inner.position()?, cache.pending().len() as u64)?;
        let pending_length = distance(pending_end, inner.start_of_stream())?;
        Ok(base_length.max(pending_length))
    }
}

impl<S: RandomOutput<P>, P: Position> RandomOutput<P> for BufferedOutput<S> {
    fn set_length(&mut self, length: u64) -> Result<()> {
        let (inner, cache) = self.parts()?;
        drain(inner, cache)?;
        inner.set_length(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStream;

    /// Base that counts the calls reaching it
    struct Counting {
        stream: MemoryStream,
        reads: usize,
        writes: usize,
        seeks: usize,
    }

    impl Counting {
        fn new(data: Vec<u8>) -> Self {
            Self {
                stream: MemoryStream::from_vec(data),
                reads: 0,
                writes: 0,
                seeks: 0,
            }
        }
    }

    impl Dispose for Counting {
        fn dispose(&mut self) -> Result<()> {
            self.stream.dispose()
        }
    }

    impl SequentialInput for Counting {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reads += 1;
            self.stream.read(buf)
        }
    }

    impl SequentialOutput for Counting {
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.writes += 1;
            self.stream.write(buf)
        }

        fn flush(&mut self) -> Result<()> {
            self.stream.flush()
        }
    }

    impl StreamOrigin<u64> for Counting {
        fn start_of_stream(&self) -> u64 {
            0
        }
    }

    impl RandomAccess<u64> for Counting {
        fn position(&mut self) -> Result<u64> {
            self.stream.position()
        }

        fn seek(&mut self, position: u64) -> Result<()> {
            self.seeks += 1;
            self.stream.seek(position)
        }

        fn length(&mut self) -> Result<u64> {
            self.stream.length()
        }
    }

    impl RandomOutput<u64> for Counting {
        fn set_length(&mut self, length: u64) -> Result<()> {
            self.stream.set_length(length)
        }
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let mut base = MemoryStream::new();
        let config = CacheConfig::default().with_cache_size(0);
        assert!(matches!(
            BufferedInput::new(&mut base, config, true),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(!base.is_disposed());
        assert!(BufferedOutput::new(&mut base, config, false).is_err());
        assert!(base.is_disposed());
    }

    #[test]
    fn test_small_reads_hit_cache() {
        let mut base = Counting::new((0u8..=255).collect());
        let mut input = BufferedInput::new(&mut base, CacheConfig::default().with_cache_size(64), true).unwrap();
        let mut byte = [0u8; 1];
        for expected in 0u8..64 {
            assert_eq!(input.read(&mut byte).unwrap(), 1);
            assert_eq!(byte[0], expected);
        }
        drop(input);
        assert_eq!(base.reads, 1);
    }

    #[test]
    fn test_in_range_seek_keeps_cache() {
        let mut base = Counting::new((0u8..=255).collect());
        let mut input =
            BufferedRandomInput::<_, u64>::new(&mut base, CacheConfig::default().with_cache_size(32), true).unwrap();
        let mut buf = [0u8; 4];
        input.read(&mut buf).unwrap();
        input.seek(20).unwrap();
        input.read(&mut buf).unwrap();
        assert_eq!(buf, [20, 21, 22, 23]);
        input.seek(2).unwrap();
        assert_eq!(input.position().unwrap(), 2);
        input.seek(100).unwrap();
        input.read(&mut buf).unwrap();
        assert_eq!(buf, [100, 101, 102, 103]);
        assert_eq!(input.position().unwrap(), 104);
        drop(input);
        assert_eq!(base.reads, 2);
        assert_eq!(base.seeks, 1);
    }

    #[test]
    fn test_write_behind() {
        let mut base = Counting::new(Vec::new());
        let mut output = BufferedOutput::new(&mut base, CacheConfig::default().with_cache_size(8), true).unwrap();
        output.write(b"abc").unwrap();
        output.write(b"def").unwrap();
        assert_eq!(output.pending_len(), 6);
        output.write(b"gh!").unwrap();
        assert_eq!(output.pending_len(), 3);
        assert_eq!(output.position().unwrap(), 9);
        assert_eq!(output.length().unwrap(), 9);
        output.dispose().unwrap();
        output.dispose().unwrap();
        drop(output);
        assert_eq!(base.writes, 2);
        assert_eq!(base.stream.as_slice(), b"abcdefgh!");
    }
}
