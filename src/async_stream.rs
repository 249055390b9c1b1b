//! Asynchronous stream capability traits
//!
//! Mirrors [`crate::stream`] one to one, with identical semantics and error
//! behavior. An operation suspends only while awaiting the underlying
//! resource; dropping the future cancels it, and the filters in this crate
//! commit cache state only after the awaited base operation has returned.
//!
//! These traits use `async fn` and are meant for static dispatch.

use crate::error::Result;
use crate::position::Position;
use crate::stream::StreamOrigin;

/// Asynchronous, idempotent teardown.
#[allow(async_fn_in_trait)]
pub trait AsyncDispose {
    /// Release the stream. Calling it again is a no-op that returns `Ok(())`.
    async fn dispose_async(&mut self) -> Result<()>;
}

/// Asynchronous source of bytes read front to back.
#[allow(async_fn_in_trait)]
pub trait AsyncSequentialInput: AsyncDispose {
    /// See [`SequentialInput::read`](crate::SequentialInput::read).
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Asynchronous sink of bytes written front to back.
#[allow(async_fn_in_trait)]
pub trait AsyncSequentialOutput: AsyncDispose {
    /// See [`SequentialOutput::write`](crate::SequentialOutput::write).
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize>;

    /// See [`SequentialOutput::flush`](crate::SequentialOutput::flush).
    async fn flush_async(&mut self) -> Result<()>;
}

/// Asynchronous seekable stream over positions of type `P`.
#[allow(async_fn_in_trait)]
pub trait AsyncRandomAccess<P: Position>: StreamOrigin<P> {
    async fn position_async(&mut self) -> Result<P>;

    async fn seek_async(&mut self, position: P) -> Result<()>;

    async fn length_async(&mut self) -> Result<u64>;
}

/// Asynchronous seekable input stream.
pub trait AsyncRandomInput<P: Position>: AsyncSequentialInput + AsyncRandomAccess<P> {}

impl<P: Position, T: AsyncSequentialInput + AsyncRandomAccess<P> + ?Sized> AsyncRandomInput<P>
    for T
{
}

/// Asynchronous seekable, resizable output stream.
#[allow(async_fn_in_trait)]
pub trait AsyncRandomOutput<P: Position>: AsyncSequentialOutput + AsyncRandomAccess<P> {
    async fn set_length_async(&mut self, length: u64) -> Result<()>;
}

impl<T: AsyncDispose> AsyncDispose for &mut T {
    async fn dispose_async(&mut self) -> Result<()> {
        (**self).dispose_async().await
    }
}

impl<T: AsyncSequentialInput> AsyncSequentialInput for &mut T {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_async(buf).await
    }
}

impl<T: AsyncSequentialOutput> AsyncSequentialOutput for &mut T {
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write_async(buf).await
    }

    async fn flush_async(&mut self) -> Result<()> {
        (**self).flush_async().await
    }
}

impl<P: Position, T: AsyncRandomAccess<P>> AsyncRandomAccess<P> for &mut T {
    async fn position_async(&mut self) -> Result<P> {
        (**self).position_async().await
    }

    async fn seek_async(&mut self, position: P) -> Result<()> {
        (**self).seek_async(position).await
    }

    async fn length_async(&mut self) -> Result<u64> {
        (**self).length_async().await
    }
}

impl<P: Position, T: AsyncRandomOutput<P>> AsyncRandomOutput<P> for &mut T {
    async fn set_length_async(&mut self, length: u64) -> Result<()> {
        (**self).set_length_async(length).await
    }
}
