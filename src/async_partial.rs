//! Async surface of the windowing filters

use crate::async_stream::{
    AsyncDispose, AsyncRandomAccess, AsyncRandomInput, AsyncRandomOutput, AsyncSequentialInput,
    AsyncSequentialOutput,
};
use crate::error::{Result, StreamError};
use crate::filter::{abandon_async, FilterCore};
use crate::partial::{
    clip_remaining, PartialInput, PartialOutput, PartialRandomInput, PartialRandomOutput, Window,
    WindowMap,
};
use crate::position::{advance, distance, Position};

async fn prepare_async<S: AsyncRandomAccess<P>, P: Position>(
    base: &mut S,
    window: Window<P>,
) -> Result<()> {
    let length = base.length_async().await?;
    window.validate(base.start_of_stream(), length)?;
    base.seek_async(window.offset).await
}

impl<S: AsyncRandomInput<P1>, P1: Position, P2: Position> PartialRandomInput<S, P1, P2> {
    /// Async counterpart of [`PartialRandomInput::new`]
    pub async fn new_async(
        mut base: S,
        window: Window<P1>,
        zero: P2,
        leave_open: bool,
    ) -> Result<Self> {
        match prepare_async(&mut base, window).await {
            Ok(()) => Ok(Self::from_parts(
                FilterCore::new(base, leave_open),
                WindowMap::new(window, zero),
            )),
            Err(e) => Err(abandon_async(base, leave_open, e).await),
        }
    }

    pub async fn from_current_async(
        mut base: S,
        size: Option<u64>,
        zero: P2,
        leave_open: bool,
    ) -> Result<Self> {
        match base.position_async().await {
            Ok(offset) => Self::new_async(base, Window::new(offset, size), zero, leave_open).await,
            Err(e) => Err(abandon_async(base, leave_open, e).await),
        }
    }
}

impl<S: AsyncRandomOutput<P1>, P1: Position, P2: Position> PartialRandomOutput<S, P1, P2> {
    /// Async counterpart of [`PartialRandomOutput::new`]
    pub async fn new_async(
        mut base: S,
        window: Window<P1>,
        zero: P2,
        leave_open: bool,
    ) -> Result<Self> {
        match prepare_async(&mut base, window).await {
            Ok(()) => Ok(Self::from_parts(
                FilterCore::new(base, leave_open),
                WindowMap::new(window, zero),
            )),
            Err(e) => Err(abandon_async(base, leave_open, e).await),
        }
    }

    pub async fn from_current_async(
        mut base: S,
        size: Option<u64>,
        zero: P2,
        leave_open: bool,
    ) -> Result<Self> {
        match base.position_async().await {
            Ok(offset) => Self::new_async(base, Window::new(offset, size), zero, leave_open).await,
            Err(e) => Err(abandon_async(base, leave_open, e).await),
        }
    }
}

impl<S: AsyncSequentialInput> AsyncDispose for PartialInput<S> {
    async fn dispose_async(&mut self) -> Result<()> {
        if self.core_mut().begin_dispose().is_none() {
            return Ok(());
        }
        self.core_mut().end_dispose_async().await
    }
}

impl<S: AsyncSequentialInput> AsyncSequentialInput for PartialInput<S> {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, remaining) = self.parts()?;
        let want = clip_remaining(buf.len(), *remaining);
        if want == 0 {
            return Ok(0);
        }
        let n = inner.read_async(&mut buf[..want]).await?;
        if n == 0 {
            return Err(StreamError::UnexpectedEndOfData);
        }
        *remaining -= n as u64;
        Ok(n)
    }
}

impl<S: AsyncSequentialOutput> AsyncDispose for PartialOutput<S> {
    async fn dispose_async(&mut self) -> Result<()> {
        if self.core_mut().begin_dispose().is_none() {
            return Ok(());
        }
        self.core_mut().end_dispose_async().await
    }
}

impl<S: AsyncSequentialOutput> AsyncSequentialOutput for PartialOutput<S> {
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, remaining) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let want = clip_remaining(buf.len(), *remaining);
        if want == 0 {
            return Err(StreamError::write_zero());
        }
        let n = inner.write_async(&buf[..want]).await?;
        *remaining -= n as u64;
        Ok(n)
    }

    async fn flush_async(&mut self) -> Result<()> {
        self.parts()?.0.flush_async().await
    }
}

impl<S: AsyncRandomInput<P1>, P1: Position, P2: Position> AsyncDispose
    for PartialRandomInput<S, P1, P2>
{
    async fn dispose_async(&mut self) -> Result<()> {
        if self.core_mut().begin_dispose().is_none() {
            return Ok(());
        }
        self.core_mut().end_dispose_async().await
    }
}

impl<S: AsyncRandomInput<P1>, P1: Position, P2: Position> AsyncSequentialInput
    for PartialRandomInput<S, P1, P2>
{
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, map) = self.parts()?;
        let base_length = inner.length_async().await?;
        let limit = map.length(inner.start_of_stream(), base_length)?;
        let want = map.clip(buf.len(), limit);
        if want == 0 {
            return Ok(0);
        }
        let n = inner.read_async(&mut buf[..want]).await?;
        if n == 0 {
            return Err(StreamError::UnexpectedEndOfData);
        }
        map.cursor += n as u64;
        Ok(n)
    }
}

impl<S: AsyncRandomInput<P1>, P1: Position, P2: Position> AsyncRandomAccess<P2>
    for PartialRandomInput<S, P1, P2>
{
    async fn position_async(&mut self) -> Result<P2> {
        self.parts()?.1.logical_position()
    }

    async fn seek_async(&mut self, position: P2) -> Result<()> {
        let (inner, map) = self.parts()?;
        let cursor = map.cursor_for(position)?;
        let base_length = inner.length_async().await?;
        map.check_seek(cursor, Some(map.length(inner.start_of_stream(), base_length)?))?;
        inner.seek_async(map.base_position(cursor)?).await?;
        map.cursor = cursor;
        Ok(())
    }

    async fn length_async(&mut self) -> Result<u64> {
        let (inner, map) = self.parts()?;
        let base_length = inner.length_async().await?;
        map.length(inner.start_of_stream(), base_length)
    }
}

impl<S: AsyncRandomOutput<P1>, P1: Position, P2: Position> AsyncDispose
    for PartialRandomOutput<S, P1, P2>
{
    async fn dispose_async(&mut self) -> Result<()> {
        if self.core_mut().begin_dispose().is_none() {
            return Ok(());
        }
        self.core_mut().end_dispose_async().await
    }
}

impl<S: AsyncRandomOutput<P1>, P1: Position, P2: Position> AsyncSequentialOutput
    for PartialRandomOutput<S, P1, P2>
{
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, map) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let want = match map.size {
            Some(size) => map.clip(buf.len(), size),
            None => buf.len(),
        };
        if want == 0 {
            return Err(StreamError::write_zero());
        }
        let n = inner.write_async(&buf[..want]).await?;
        map.cursor += n as u64;
        Ok(n)
    }

    async fn flush_async(&mut self) -> Result<()> {
        self.parts()?.0.flush_async().await
    }
}

impl<S: AsyncRandomOutput<P1>, P1: Position, P2: Position> AsyncRandomAccess<P2>
    for PartialRandomOutput<S, P1, P2>
{
    async fn position_async(&mut self) -> Result<P2> {
        self.parts()?.1.logical_position()
    }

    async fn seek_async(&mut self, position: P2) -> Result<()> {
        let (inner, map) = self.parts()?;
        let cursor = map.cursor_for(position)?;
        map.check_seek(cursor, map.size)?;
        inner.seek_async(map.base_position(cursor)?).await?;
        map.cursor = cursor;
        Ok(())
    }

    async fn length_async(&mut self) -> Result<u64> {
        let (inner, map) = self.parts()?;
        let base_length = inner.length_async().await?;
        map.length(inner.start_of_stream(), base_length)
    }
}

impl<S: AsyncRandomOutput<P1>, P1: Position, P2: Position> AsyncRandomOutput<P2>
    for PartialRandomOutput<S, P1, P2>
{
    async fn set_length_async(&mut self, length: u64) -> Result<()> {
        let (inner, map) = self.parts()?;
        map.check_set_length(length)?;
        let start = inner.start_of_stream();
        let end = advance(map.offset, length)?;
        let base_length = inner.length_async().await?;
        if map.ends_with_base(start, base_length)? {
            inner.set_length_async(distance(end, start)?).await?;
        }
        if map.size.is_some() {
            map.size = Some(length);
        }
        if map.cursor > length {
            inner.seek_async(end).await?;
            map.cursor = length;
        }
        Ok(())
    }
}
