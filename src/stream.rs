//! Synchronous stream capability traits
//!
//! A stream implements only the capabilities it actually has:
//!
//! - [`SequentialInput`]: forward-only reads
//! - [`SequentialOutput`]: forward-only writes
//! - [`RandomAccess`]: positions, seeking and length, over a caller-chosen
//!   [`Position`] type
//! - [`RandomOutput`]: random access plus resizing
//!
//! [`RandomInput`] is a shorthand for `SequentialInput + RandomAccess<P>`.
//! Every stream also implements [`Dispose`]: disposal is idempotent and every
//! other operation fails with [`StreamError::Disposed`](crate::StreamError)
//! afterwards.
//!
//! The asynchronous surface lives in [`crate::async_stream`].

use crate::error::Result;
use crate::position::Position;

/// Deterministic, idempotent teardown of a stream handle.
pub trait Dispose {
    /// Release the stream. Calling it again is a no-op that returns `Ok(())`.
    fn dispose(&mut self) -> Result<()>;
}

/// A source of bytes read front to back.
pub trait SequentialInput: Dispose {
    /// Copy up to `buf.len()` bytes into `buf`.
    ///
    /// Returns 0 only at end-of-data when `buf` is non-empty. An empty request
    /// always returns 0 without implying end-of-data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// A sink of bytes written front to back.
pub trait SequentialOutput: Dispose {
    /// Write some prefix of `buf`, returning how many bytes were accepted.
    ///
    /// A sink that cannot accept any byte of a non-empty buffer fails with
    /// [`StreamError::write_zero`](crate::StreamError::write_zero) instead of
    /// returning 0.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Push pending bytes to the underlying resource.
    fn flush(&mut self) -> Result<()>;
}

/// The zero value of a stream's position space.
///
/// Shared by the sync and async random-access traits so a type implementing
/// both exposes a single `start_of_stream`.
pub trait StreamOrigin<P: Position> {
    /// The first position of this stream; the additive identity of its
    /// position space.
    fn start_of_stream(&self) -> P;
}

/// Seekable stream over positions of type `P`.
pub trait RandomAccess<P: Position>: StreamOrigin<P> {
    /// Current position
    fn position(&mut self) -> Result<P>;

    /// Move to `position`
    fn seek(&mut self, position: P) -> Result<()>;

    /// Length of the stream in bytes
    fn length(&mut self) -> Result<u64>;
}

/// Seekable input stream.
pub trait RandomInput<P: Position>: SequentialInput + RandomAccess<P> {}

impl<P: Position, T: SequentialInput + RandomAccess<P> + ?Sized> RandomInput<P> for T {}

/// Seekable, resizable output stream.
pub trait RandomOutput<P: Position>: SequentialOutput + RandomAccess<P> {
    /// Truncate or extend the underlying resource to `length` bytes.
    fn set_length(&mut self, length: u64) -> Result<()>;
}

// Borrowed streams keep every capability. Passing `&mut stream` to a filter
// is how a caller keeps using the base once the filter is gone.

impl<T: Dispose + ?Sized> Dispose for &mut T {
    fn dispose(&mut self) -> Result<()> {
        (**self).dispose()
    }
}

impl<T: SequentialInput + ?Sized> SequentialInput for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<T: SequentialOutput + ?Sized> SequentialOutput for &mut T {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<P: Position, T: StreamOrigin<P> + ?Sized> StreamOrigin<P> for &mut T {
    fn start_of_stream(&self) -> P {
        (**self).start_of_stream()
    }
}

impl<P: Position, T: RandomAccess<P> + ?Sized> RandomAccess<P> for &mut T {
    fn position(&mut self) -> Result<P> {
        (**self).position()
    }

    fn seek(&mut self, position: P) -> Result<()> {
        (**self).seek(position)
    }

    fn length(&mut self) -> Result<u64> {
        (**self).length()
    }
}

impl<P: Position, T: RandomOutput<P> + ?Sized> RandomOutput<P> for &mut T {
    fn set_length(&mut self, length: u64) -> Result<()> {
        (**self).set_length(length)
    }
}

impl<T: Dispose + ?Sized> Dispose for Box<T> {
    fn dispose(&mut self) -> Result<()> {
        (**self).dispose()
    }
}

impl<T: SequentialInput + ?Sized> SequentialInput for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<T: SequentialOutput + ?Sized> SequentialOutput for Box<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<P: Position, T: StreamOrigin<P> + ?Sized> StreamOrigin<P> for Box<T> {
    fn start_of_stream(&self) -> P {
        (**self).start_of_stream()
    }
}

impl<P: Position, T: RandomAccess<P> + ?Sized> RandomAccess<P> for Box<T> {
    fn position(&mut self) -> Result<P> {
        (**self).position()
    }

    fn seek(&mut self, position: P) -> Result<()> {
        (**self).seek(position)
    }

    fn length(&mut self) -> Result<u64> {
        (**self).length()
    }
}

impl<P: Position, T: RandomOutput<P> + ?Sized> RandomOutput<P> for Box<T> {
    fn set_length(&mut self, length: u64) -> Result<()> {
        (**self).set_length(length)
    }
}
