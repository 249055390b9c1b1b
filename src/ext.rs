//! Helper and builder methods on every stream
//!
//! [`InputStreamExt`] and [`OutputStreamExt`] add bulk reads and writes,
//! fixed-width integer and IEEE 754 float codecs, copying, CRC calculation,
//! and one builder per filter. Random-access builders live on [`RandomInputExt`] and
//! [`RandomOutputExt`]. Output builders carry an `_output` suffix so a
//! stream that can both read and write never sees two methods with the
//! same name.
//!
//! ```
//! use s_zip_io::{InputStreamExt, MemoryStream, OutputStreamExt, RandomAccess};
//!
//! let mut stream = MemoryStream::new();
//! stream.write_u32_le(0x0403_4b50)?;
//! stream.write_u16_be(20)?;
//! stream.seek(0)?;
//! assert_eq!(stream.read_u32_le()?, 0x0403_4b50);
//! assert_eq!(stream.read_u16_be()?, 20);
//! assert_eq!(stream.read_byte_opt()?, None);
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```

use crate::branch::BranchOutput;
use crate::buffered::{BufferedInput, BufferedOutput, BufferedRandomInput, CacheConfig};
use crate::crc::{Crc24, Crc32, CrcSession};
use crate::error::{Result, StreamError};
use crate::instrument::{
    Crc24Input, Crc24Output, CrcCallback, CrcInput, CrcObserver, CrcOutput, EndAction,
    EndActionInput, EndActionObserver, EndActionOutput, ObservedInput, ObservedOutput,
    ProgressInput, ProgressObserver, ProgressOutput,
};
use crate::partial::{PartialInput, PartialOutput, PartialRandomInput, PartialRandomOutput, Window};
use crate::position::Position;
use crate::progress::{ProgressCounter, ProgressFn};
use crate::sequence::{ByteSequence, ReverseByteSequence, BULK_CHUNK_SIZE, SEQUENCE_CHUNK_SIZE};
use crate::stream::{RandomInput, RandomOutput, SequentialInput, SequentialOutput};

macro_rules! read_num {
    ($($name:ident => $ty:ty, $from:ident;)*) => {
        $(
            fn $name(&mut self) -> Result<$ty> {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                self.read_exact_bytes(&mut bytes)?;
                Ok(<$ty>::$from(bytes))
            }
        )*
    };
}

macro_rules! write_num {
    ($($name:ident => $ty:ty, $to:ident;)*) => {
        $(
            fn $name(&mut self, value: $ty) -> Result<()> {
                self.write_all_bytes(&value.$to())
            }
        )*
    };
}

/// Helpers and filter builders for sequential input.
pub trait InputStreamExt: SequentialInput + Sized {
    /// Read until `buf` is full or the stream ends; returns the byte count.
    fn read_fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Fill `buf` completely or fail with `UnexpectedEndOfData`.
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.read_fill(buf)? < buf.len() {
            return Err(StreamError::UnexpectedEndOfData);
        }
        Ok(())
    }

    /// Up to `count` bytes; fewer only at end-of-data
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; count];
        let n = self.read_fill(&mut bytes)?;
        bytes.truncate(n);
        Ok(bytes)
    }

    /// Everything up to end-of-data
    fn read_all_bytes(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; BULK_CHUNK_SIZE];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(bytes);
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.read_byte_opt()?.ok_or(StreamError::UnexpectedEndOfData)
    }

    /// Next byte, or `None` at end-of-data
    fn read_byte_opt(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(match self.read(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    read_num! {
        read_u16_le => u16, from_le_bytes;
        read_u16_be => u16, from_be_bytes;
        read_i16_le => i16, from_le_bytes;
        read_i16_be => i16, from_be_bytes;
        read_u32_le => u32, from_le_bytes;
        read_u32_be => u32, from_be_bytes;
        read_i32_le => i32, from_le_bytes;
        read_i32_be => i32, from_be_bytes;
        read_u64_le => u64, from_le_bytes;
        read_u64_be => u64, from_be_bytes;
        read_i64_le => i64, from_le_bytes;
        read_i64_be => i64, from_be_bytes;
        read_f32_le => f32, from_le_bytes;
        read_f32_be => f32, from_be_bytes;
        read_f64_le => f64, from_le_bytes;
        read_f64_be => f64, from_be_bytes;
    }

    /// Copy everything up to end-of-data into `dest`; returns the byte count.
    fn copy_to<D: SequentialOutput>(
        &mut self,
        dest: &mut D,
        mut progress: Option<&mut ProgressCounter>,
    ) -> Result<u64> {
        let mut chunk = vec![0u8; BULK_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(total);
            }
            dest.write_all_bytes(&chunk[..n])?;
            total += n as u64;
            if let Some(progress) = progress.as_deref_mut() {
                progress.add(n as u64);
                progress.report();
            }
        }
    }

    /// Run the remaining bytes through `session`; returns `(checksum, length)`.
    fn calculate_crc<C: CrcSession>(
        &mut self,
        mut session: C,
        mut progress: Option<&mut ProgressCounter>,
    ) -> Result<(u32, u64)> {
        let mut chunk = vec![0u8; BULK_CHUNK_SIZE];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(session.result());
            }
            session.put(&chunk[..n]);
            if let Some(progress) = progress.as_deref_mut() {
                progress.add(n as u64);
                progress.report();
            }
        }
    }

    fn calculate_crc32(&mut self, progress: Option<&mut ProgressCounter>) -> Result<(u32, u64)> {
        self.calculate_crc(Crc32::new(), progress)
    }

    fn calculate_crc24(&mut self, progress: Option<&mut ProgressCounter>) -> Result<(u32, u64)> {
        self.calculate_crc(Crc24::new(), progress)
    }

    /// Limit this stream to its next `size` bytes
    fn with_partial(self, size: u64, leave_open: bool) -> PartialInput<Self> {
        PartialInput::new(self, size, leave_open)
    }

    fn with_cache(self, config: CacheConfig, leave_open: bool) -> Result<BufferedInput<Self>> {
        BufferedInput::new(self, config, leave_open)
    }

    fn with_crc32(self, on_complete: Option<CrcCallback>, leave_open: bool) -> CrcInput<Self> {
        ObservedInput::new(self, CrcObserver::new(Crc32::new(), on_complete), leave_open)
    }

    fn with_crc24(self, on_complete: Option<CrcCallback>, leave_open: bool) -> Crc24Input<Self> {
        ObservedInput::new(self, CrcObserver::new(Crc24::new(), on_complete), leave_open)
    }

    fn with_progress(self, report: ProgressFn, leave_open: bool) -> ProgressInput<Self> {
        ObservedInput::new(self, ProgressObserver::new(report), leave_open)
    }

    fn with_end_action(self, action: EndAction, leave_open: bool) -> EndActionInput<Self> {
        ObservedInput::new(self, EndActionObserver::new(action), leave_open)
    }

    /// Lazy front-to-back byte iterator over the rest of the stream
    fn into_byte_sequence(self, leave_open: bool) -> ByteSequence<Self> {
        ByteSequence::new(self, leave_open)
    }
}

impl<T: SequentialInput> InputStreamExt for T {}

/// Helpers and filter builders for sequential output.
pub trait OutputStreamExt: SequentialOutput + Sized {
    /// Write all of `buf`; a sink that stops accepting bytes fails with
    /// [`StreamError::write_zero`].
    fn write_all_bytes(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(StreamError::write_zero());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write_all_bytes(&[value])
    }

    /// Write every byte `bytes` yields, in chunks; returns the byte count.
    fn write_byte_sequence<I: IntoIterator<Item = u8>>(&mut self, bytes: I) -> Result<u64> {
        let mut chunk = Vec::with_capacity(SEQUENCE_CHUNK_SIZE);
        let mut total = 0u64;
        for byte in bytes {
            chunk.push(byte);
            if chunk.len() == SEQUENCE_CHUNK_SIZE {
                self.write_all_bytes(&chunk)?;
                total += chunk.len() as u64;
                chunk.clear();
            }
        }
        self.write_all_bytes(&chunk)?;
        Ok(total + chunk.len() as u64)
    }

    write_num! {
        write_u16_le => u16, to_le_bytes;
        write_u16_be => u16, to_be_bytes;
        write_i16_le => i16, to_le_bytes;
        write_i16_be => i16, to_be_bytes;
        write_u32_le => u32, to_le_bytes;
        write_u32_be => u32, to_be_bytes;
        write_i32_le => i32, to_le_bytes;
        write_i32_be => i32, to_be_bytes;
        write_u64_le => u64, to_le_bytes;
        write_u64_be => u64, to_be_bytes;
        write_i64_le => i64, to_le_bytes;
        write_i64_be => i64, to_be_bytes;
        write_f32_le => f32, to_le_bytes;
        write_f32_be => f32, to_be_bytes;
        write_f64_le => f64, to_le_bytes;
        write_f64_be => f64, to_be_bytes;
    }

    /// Accept at most `size` more bytes
    fn with_partial_output(self, size: u64, leave_open: bool) -> PartialOutput<Self> {
        PartialOutput::new(self, size, leave_open)
    }

    fn with_cache_output(self, config: CacheConfig, leave_open: bool) -> Result<BufferedOutput<Self>> {
        BufferedOutput::new(self, config, leave_open)
    }

    fn with_crc32_output(self, on_complete: Option<CrcCallback>, leave_open: bool) -> CrcOutput<Self> {
        ObservedOutput::new(self, CrcObserver::new(Crc32::new(), on_complete), leave_open)
    }

    fn with_crc24_output(self, on_complete: Option<CrcCallback>, leave_open: bool) -> Crc24Output<Self> {
        ObservedOutput::new(self, CrcObserver::new(Crc24::new(), on_complete), leave_open)
    }

    fn with_progress_output(self, report: ProgressFn, leave_open: bool) -> ProgressOutput<Self> {
        ObservedOutput::new(self, ProgressObserver::new(report), leave_open)
    }

    fn with_end_action_output(self, action: EndAction, leave_open: bool) -> EndActionOutput<Self> {
        ObservedOutput::new(self, EndActionObserver::new(action), leave_open)
    }

    /// Tee every write into `second` as well
    fn branch<S2: SequentialOutput>(self, second: S2, leave_open: bool) -> BranchOutput<Self, S2> {
        BranchOutput::new(self, second, leave_open)
    }
}

impl<T: SequentialOutput> OutputStreamExt for T {}

/// Builders for random-access input.
pub trait RandomInputExt<P: Position>: RandomInput<P> + Sized {
    /// Window with zero-based `u64` positions
    fn with_window(self, window: Window<P>, leave_open: bool) -> Result<PartialRandomInput<Self, P, u64>> {
        PartialRandomInput::new(self, window, 0, leave_open)
    }

    /// Window whose positions start at `zero`
    fn with_window_at<P2: Position>(
        self,
        window: Window<P>,
        zero: P2,
        leave_open: bool,
    ) -> Result<PartialRandomInput<Self, P, P2>> {
        PartialRandomInput::new(self, window, zero, leave_open)
    }

    fn with_random_cache(self, config: CacheConfig, leave_open: bool) -> Result<BufferedRandomInput<Self, P>> {
        BufferedRandomInput::new(self, config, leave_open)
    }

    /// Lazy back-to-front byte iterator over the whole stream
    fn into_reverse_byte_sequence(self, leave_open: bool) -> Result<ReverseByteSequence<Self, P>> {
        ReverseByteSequence::new(self, leave_open)
    }
}

impl<P: Position, T: RandomInput<P>> RandomInputExt<P> for T {}

/// Builders for random-access output.
pub trait RandomOutputExt<P: Position>: RandomOutput<P> + Sized {
    fn with_window_output(
        self,
        window: Window<P>,
        leave_open: bool,
    ) -> Result<PartialRandomOutput<Self, P, u64>> {
        PartialRandomOutput::new(self, window, 0, leave_open)
    }

    fn with_window_output_at<P2: Position>(
        self,
        window: Window<P>,
        zero: P2,
        leave_open: bool,
    ) -> Result<PartialRandomOutput<Self, P, P2>> {
        PartialRandomOutput::new(self, window, zero, leave_open)
    }
}

impl<P: Position, T: RandomOutput<P>> RandomOutputExt<P> for T {}
