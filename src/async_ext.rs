//! Async helper and builder methods
//!
//! The async twins of [`crate::ext`], suffixed `_async`. Infallible filter
//! builders are shared with the sync surface; only the constructors that
//! touch the base stream have async forms here.

use crate::async_stream::{
    AsyncRandomInput, AsyncRandomOutput, AsyncSequentialInput, AsyncSequentialOutput,
};
use crate::buffered::{BufferedInput, BufferedOutput, BufferedRandomInput, CacheConfig};
use crate::crc::{Crc24, Crc32, CrcSession};
use crate::error::{Result, StreamError};
use crate::partial::{PartialRandomInput, PartialRandomOutput, Window};
use crate::position::Position;
use crate::progress::ProgressCounter;
use crate::sequence::{ByteSequence, BULK_CHUNK_SIZE, SEQUENCE_CHUNK_SIZE};
use futures_util::Stream;

macro_rules! read_num_async {
    ($($name:ident => $ty:ty, $from:ident;)*) => {
        $(
            async fn $name(&mut self) -> Result<$ty> {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                self.read_exact_bytes_async(&mut bytes).await?;
                Ok(<$ty>::$from(bytes))
            }
        )*
    };
}

macro_rules! write_num_async {
    ($($name:ident => $ty:ty, $to:ident;)*) => {
        $(
            async fn $name(&mut self, value: $ty) -> Result<()> {
                self.write_all_bytes_async(&value.$to()).await
            }
        )*
    };
}

/// Async helpers for sequential input.
#[allow(async_fn_in_trait)]
pub trait AsyncInputStreamExt: AsyncSequentialInput + Sized {
    async fn read_fill_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_async(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    async fn read_exact_bytes_async(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.read_fill_async(buf).await? < buf.len() {
            return Err(StreamError::UnexpectedEndOfData);
        }
        Ok(())
    }

    async fn read_bytes_async(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; count];
        let n = self.read_fill_async(&mut bytes).await?;
        bytes.truncate(n);
        Ok(bytes)
    }

    async fn read_all_bytes_async(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; BULK_CHUNK_SIZE];
        loop {
            let n = self.read_async(&mut chunk).await?;
            if n == 0 {
                return Ok(bytes);
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
    }

    async fn read_byte_async(&mut self) -> Result<u8> {
        self.read_byte_opt_async()
            .await?
            .ok_or(StreamError::UnexpectedEndOfData)
    }

    async fn read_byte_opt_async(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(match self.read_async(&mut byte).await? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    read_num_async! {
        read_u16_le_async => u16, from_le_bytes;
        read_u16_be_async => u16, from_be_bytes;
        read_i16_le_async => i16, from_le_bytes;
        read_i16_be_async => i16, from_be_bytes;
        read_u32_le_async => u32, from_le_bytes;
        read_u32_be_async => u32, from_be_bytes;
        read_i32_le_async => i32, from_le_bytes;
        read_i32_be_async => i32, from_be_bytes;
        read_u64_le_async => u64, from_le_bytes;
        read_u64_be_async => u64, from_be_bytes;
        read_i64_le_async => i64, from_le_bytes;
        read_i64_be_async => i64, from_be_bytes;
        read_f32_le_async => f32, from_le_bytes;
        read_f32_be_async => f32, from_be_bytes;
        read_f64_le_async => f64, from_le_bytes;
        read_f64_be_async => f64, from_be_bytes;
    }

    async fn copy_to_async<D: AsyncSequentialOutput>(
        &mut self,
        dest: &mut D,
        mut progress: Option<&mut ProgressCounter>,
    ) -> Result<u64> {
        let mut chunk = vec![0u8; BULK_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = self.read_async(&mut chunk).await?;
            if n == 0 {
                return Ok(total);
            }
            dest.write_all_bytes_async(&chunk[..n]).await?;
            total += n as u64;
            if let Some(progress) = progress.as_deref_mut() {
                progress.add(n as u64);
                progress.report();
            }
        }
    }

    async fn calculate_crc_async<C: CrcSession>(
        &mut self,
        mut session: C,
        mut progress: Option<&mut ProgressCounter>,
    ) -> Result<(u32, u64)> {
        let mut chunk = vec![0u8; BULK_CHUNK_SIZE];
        loop {
            let n = self.read_async(&mut chunk).await?;
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

    async fn calculate_crc32_async(
        &mut self,
        progress: Option<&mut ProgressCounter>,
    ) -> Result<(u32, u64)> {
        self.calculate_crc_async(Crc32::new(), progress).await
    }

    async fn calculate_crc24_async(
        &mut self,
        progress: Option<&mut ProgressCounter>,
    ) -> Result<(u32, u64)> {
        self.calculate_crc_async(Crc24::new(), progress).await
    }

    async fn with_cache_async(self, config: CacheConfig, leave_open: bool) -> Result<BufferedInput<Self>> {
        BufferedInput::new_async(self, config, leave_open).await
    }

    /// Front-to-back byte stream over the rest of the input
    fn into_byte_stream(self, leave_open: bool) -> impl Stream<Item = Result<u8>> {
        ByteSequence::new(self, leave_open).into_stream()
    }
}

impl<T: AsyncSequentialInput> AsyncInputStreamExt for T {}

/// Async helpers for sequential output.
#[allow(async_fn_in_trait)]
pub trait AsyncOutputStreamExt: AsyncSequentialOutput + Sized {
    async fn write_all_bytes_async(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write_async(buf).await?;
            if n == 0 {
                return Err(StreamError::write_zero());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    async fn write_byte_async(&mut self, value: u8) -> Result<()> {
        self.write_all_bytes_async(&[value]).await
    }

    /// Async counterpart of [`crate::OutputStreamExt::write_byte_sequence`]
    async fn write_byte_sequence_async<I: IntoIterator<Item = u8>>(&mut self, bytes: I) -> Result<u64> {
        let mut chunk = Vec::with_capacity(SEQUENCE_CHUNK_SIZE);
        let mut total = 0u64;
        for byte in bytes {
            chunk.push(byte);
            if chunk.len() == SEQUENCE_CHUNK_SIZE {
                self.write_all_bytes_async(&chunk).await?;
                total += chunk.len() as u64;
                chunk.clear();
            }
        }
        self.write_all_bytes_async(&chunk).await?;
        Ok(total + chunk.len() as u64)
    }

    write_num_async! {
        write_u16_le_async => u16, to_le_bytes;
        write_u16_be_async => u16, to_be_bytes;
        write_i16_le_async => i16, to_le_bytes;
        write_i16_be_async => i16, to_be_bytes;
        write_u32_le_async => u32, to_le_bytes;
        write_u32_be_async => u32, to_be_bytes;
        write_i32_le_async => i32, to_le_bytes;
        write_i32_be_async => i32, to_be_bytes;
        write_u64_le_async => u64, to_le_bytes;
        write_u64_be_async => u64, to_be_bytes;
        write_i64_le_async => i64, to_le_bytes;
        write_i64_be_async => i64, to_be_bytes;
        write_f32_le_async => f32, to_le_bytes;
        write_f32_be_async => f32, to_be_bytes;
        write_f64_le_async => f64, to_le_bytes;
        write_f64_be_async => f64, to_be_bytes;
    }

    async fn with_cache_output_async(
        self,
        config: CacheConfig,
        leave_open: bool,
    ) -> Result<BufferedOutput<Self>> {
        BufferedOutput::new_async(self, config, leave_open).await
    }
}

impl<T: AsyncSequentialOutput> AsyncOutputStreamExt for T {}

/// Async builders for random-access input.
#[allow(async_fn_in_trait)]
pub trait AsyncRandomInputExt<P: Position>: AsyncRandomInput<P> + Sized {
    async fn with_window_async(
        self,
        window: Window<P>,
        leave_open: bool,
    ) -> Result<PartialRandomInput<Self, P, u64>> {
        PartialRandomInput::new_async(self, window, 0, leave_open).await
    }

    async fn with_window_at_async<P2: Position>(
        self,
        window: Window<P>,
        zero: P2,
        leave_open: bool,
    ) -> Result<PartialRandomInput<Self, P, P2>> {
        PartialRandomInput::new_async(self, window, zero, leave_open).await
    }

    async fn with_random_cache_async(
        self,
        config: CacheConfig,
        leave_open: bool,
    ) -> Result<BufferedRandomInput<Self, P>> {
        BufferedRandomInput::new_async(self, config, leave_open).await
    }
}

impl<P: Position, T: AsyncRandomInput<P>> AsyncRandomInputExt<P> for T {}

/// Async builders for random-access output.
#[allow(async_fn_in_trait)]
pub trait AsyncRandomOutputExt<P: Position>: AsyncRandomOutput<P> + Sized {
    async fn with_window_output_async(
        self,
        window: Window<P>,
        leave_open: bool,
    ) -> Result<PartialRandomOutput<Self, P, u64>> {
        PartialRandomOutput::new_async(self, window, 0, leave_open).await
    }

    async fn with_window_output_at_async<P2: Position>(
        self,
        window: Window<P>,
        zero: P2,
        leave_open: bool,
    ) -> Result<PartialRandomOutput<Self, P, P2>> {
        PartialRandomOutput::new_async(self, window, zero, leave_open).await
    }
}

impl<P: Position, T: AsyncRandomOutput<P>> AsyncRandomOutputExt<P> for T {}
