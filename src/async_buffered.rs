//! Async surface of the buffering filters
//!
//! Cache state is committed only after the awaited base operation returns,
//! so dropping a pending future leaves the cache consistent.

use crate::async_stream::{
    AsyncDispose, AsyncRandomAccess, AsyncRandomInput, AsyncRandomOutput, AsyncSequentialInput,
    AsyncSequentialOutput,
};
use crate::buffered::{
    cache_end, cached_cursor, logical_position, BufferedInput, BufferedOutput,
    BufferedRandomInput, CacheConfig, WriteCache,
};
use crate::error::{Result, StreamError};
use crate::filter::{abandon_async, FilterCore};
use crate::position::{advance, distance, Position};

impl<S: AsyncSequentialInput> BufferedInput<S> {
    /// Async counterpart of [`BufferedInput::new`]
    pub async fn new_async(inner: S, config: CacheConfig, leave_open: bool) -> Result<Self> {
        match config.validate() {
            Ok(()) => Ok(Self::from_core(FilterCore::new(inner, leave_open), config)),
            Err(e) => Err(abandon_async(inner, leave_open, e).await),
        }
    }
}

impl<S: AsyncRandomInput<P>, P: Position> BufferedRandomInput<S, P> {
    /// Async counterpart of [`BufferedRandomInput::new`]
    pub async fn new_async(inner: S, config: CacheConfig, leave_open: bool) -> Result<Self> {
        match config.validate() {
            Ok(()) => Ok(Self::from_core(FilterCore::new(inner, leave_open), config)),
            Err(e) => Err(abandon_async(inner, leave_open, e).await),
        }
    }

    /// Async counterpart of [`BufferedRandomInput::into_inner`]
    pub async fn into_inner_async(mut self) -> Result<S> {
        if let Ok((inner, cache, origin)) = self.parts() {
            if let Some(position) = logical_position(*origin, cache)? {
                inner.seek_async(position).await?;
            }
        }
        Ok(self.into_core().into_inner())
    }
}

impl<S: AsyncSequentialOutput> BufferedOutput<S> {
    /// Async counterpart of [`BufferedOutput::new`]
    pub async fn new_async(inner: S, config: CacheConfig, leave_open: bool) -> Result<Self> {
        match config.validate() {
            Ok(()) => Ok(Self::from_core(FilterCore::new(inner, leave_open), config)),
            Err(e) => Err(abandon_async(inner, leave_open, e).await),
        }
    }
}

impl<S: AsyncSequentialInput> AsyncDispose for BufferedInput<S> {
    async fn dispose_async(&mut self) -> Result<()> {
        if self.core_mut().begin_dispose().is_none() {
            return Ok(());
        }
        self.core_mut().end_dispose_async().await
    }
}

impl<S: AsyncSequentialInput> AsyncSequentialInput for BufferedInput<S> {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, cache) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if cache.is_exhausted() {
            if buf.len() >= cache.capacity() {
                return inner.read_async(buf).await;
            }
            let n = inner.read_async(cache.spare()).await?;
            cache.filled(n);
        }
        Ok(cache.take(buf))
    }
}

impl<S: AsyncRandomInput<P>, P: Position> AsyncDispose for BufferedRandomInput<S, P> {
    async fn dispose_async(&mut self) -> Result<()> {
        let Some((inner, realign)) = self.teardown_parts() else {
            return Ok(());
        };
        let realigned = match realign {
            Ok(Some(position)) => inner.seek_async(position).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        let released = self.core_mut().end_dispose_async().await;
        realigned.and(released)
    }
}

impl<S: AsyncRandomInput<P>, P: Position> AsyncSequentialInput for BufferedRandomInput<S, P> {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, cache, origin) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if cache.is_exhausted() {
            if buf.len() >= cache.capacity() {
                let n = inner.read_async(buf).await?;
                cache.invalidate();
                *origin = None;
                return Ok(n);
            }
            let refill_at = match *origin {
                Some(o) => cache_end(o, cache)?,
                None => inner.position_async().await?,
            };
            let n = inner.read_async(cache.spare()).await?;
            cache.filled(n);
            *origin = (n > 0).then_some(refill_at);
        }
        Ok(cache.take(buf))
    }
}

impl<S: AsyncRandomInput<P>, P: Position> AsyncRandomAccess<P> for BufferedRandomInput<S, P> {
    async fn position_async(&mut self) -> Result<P> {
        let (inner, cache, origin) = self.parts()?;
        match logical_position(*origin, cache)? {
            Some(position) => Ok(position),
            None => inner.position_async().await,
        }
    }

    async fn seek_async(&mut self, position: P) -> Result<()> {
        let (inner, cache, origin) = self.parts()?;
        if let Some(cursor) = cached_cursor(*origin, cache, position) {
            cache.set_cursor(cursor);
            return Ok(());
        }
        inner.seek_async(position).await?;
        cache.invalidate();
        *origin = None;
        Ok(())
    }

    async fn length_async(&mut self) -> Result<u64> {
        self.parts()?.0.length_async().await
    }
}

async fn drain_async<S: AsyncSequentialOutput>(inner: &mut S, cache: &mut WriteCache) -> Result<()> {
    while !cache.pending().is_empty() {
        let n = inner.write_async(cache.pending()).await?;
        if n == 0 {
            return Err(StreamError::write_zero());
        }
        cache.consume(n);
    }
    Ok(())
}

impl<S: AsyncSequentialOutput> BufferedOutput<S> {
    /// Async counterpart of [`BufferedOutput::into_inner`]
    pub async fn into_inner_async(mut self) -> Result<S> {
        if let Ok((inner, cache)) = self.parts() {
            drain_async(inner, cache).await?;
        }
        Ok(self.into_core()?.into_inner())
    }
}

impl<S: AsyncSequentialOutput> AsyncDispose for BufferedOutput<S> {
    async fn dispose_async(&mut self) -> Result<()> {
        let Some((inner, cache)) = self.teardown_parts() else {
            return Ok(());
        };
        let flushed = match drain_async(inner, cache).await {
            Ok(()) => inner.flush_async().await,
            Err(e) => Err(e),
        };
        cache.clear();
        let released = match self.core_mut() {
            Ok(core) => core.end_dispose_async().await,
            Err(e) => Err(e),
        };
        flushed.and(released)
    }
}

impl<S: AsyncSequentialOutput> AsyncSequentialOutput for BufferedOutput<S> {
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, cache) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if !cache.fits(buf.len()) {
            drain_async(inner, cache).await?;
        }
        if buf.len() >= cache.capacity() {
            return inner.write_async(buf).await;
        }
        cache.push(buf);
        Ok(buf.len())
    }

    async fn flush_async(&mut self) -> Result<()> {
        let (inner, cache) = self.parts()?;
        drain_async(inner, cache).await?;
        inner.flush_async().await
    }
}

impl<S: AsyncRandomOutput<P>, P: Position> AsyncRandomAccess<P> for BufferedOutput<S> {
    async fn position_async(&mut self) -> Result<P> {
        let (inner, cache) = self.parts()?;
        let base = inner.position_async().await?;
        advance(base, cache.pending().len() as u64)
    }

    async fn seek_async(&mut self, position: P) -> Result<()> {
        let (inner, cache) = self.parts()?;
        drain_async(inner, cache).await?;
        inner.seek_async(position).await
    }

    async fn length_async(&mut self) -> Result<u64> {
        let (inner, cache) = self.parts()?;
        let base_length = inner.length_async().await?;
        let pending_end = advance(inner.position_async().await?, cache.pending().len() as u64)?;
        let pending_length = distance(pending_end, inner.start_of_stream())?;
        Ok(base_length.max(pending_length))
    }
}

impl<S: AsyncRandomOutput<P>, P: Position> AsyncRandomOutput<P> for BufferedOutput<S> {
    async fn set_length_async(&mut self, length: u64) -> Result<()> {
        let (inner, cache) = self.parts()?;
        drain_async(inner, cache).await?;
        inner.set_length_async(length).await
    }
}
