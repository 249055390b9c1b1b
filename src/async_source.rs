//! Async concrete streams: tokio adapters and the async surface of [`MemoryStream`]

use crate::async_stream::{
    AsyncDispose, AsyncRandomAccess, AsyncRandomOutput, AsyncSequentialInput,
    AsyncSequentialOutput,
};
use crate::error::{Result, StreamError};
use crate::source::MemoryStream;
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

impl AsyncDispose for MemoryStream {
    async fn dispose_async(&mut self) -> Result<()> {
        self.dispose_now();
        Ok(())
    }
}

impl AsyncSequentialInput for MemoryStream {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_now(buf)
    }
}

impl AsyncSequentialOutput for MemoryStream {
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_now(buf)
    }

    async fn flush_async(&mut self) -> Result<()> {
        self.position_now().map(|_| ())
    }
}

impl AsyncRandomAccess<u64> for MemoryStream {
    async fn position_async(&mut self) -> Result<u64> {
        self.position_now()
    }

    async fn seek_async(&mut self, position: u64) -> Result<()> {
        self.seek_now(position)
    }

    async fn length_async(&mut self) -> Result<u64> {
        self.length_now()
    }
}

impl AsyncRandomOutput<u64> for MemoryStream {
    async fn set_length_async(&mut self, length: u64) -> Result<()> {
        self.set_length_now(length)
    }
}

/// Async resources whose length can be changed in place.
#[allow(async_fn_in_trait)]
pub trait AsyncSetLen {
    async fn set_len_async(&mut self, length: u64) -> io::Result<()>;
}

impl AsyncSetLen for File {
    async fn set_len_async(&mut self, length: u64) -> io::Result<()> {
        self.set_len(length).await
    }
}

/// Capability stream over a tokio I/O value.
///
/// The async counterpart of [`IoStream`](crate::IoStream). Disposal drops
/// the wrapped value; flush tokio files before disposing them if the data
/// must be on disk when disposal returns.
#[derive(Debug)]
pub struct AsyncIoStream<T> {
    inner: Option<T>,
}

impl AsyncIoStream<File> {
    /// Open an existing file for reading
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path).await?))
    }

    /// Create (or truncate) a file for reading and writing
    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        Ok(Self::new(file))
    }
}

impl<T> AsyncIoStream<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Some(inner) }
    }

    /// The wrapped value, or `None` once disposed
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }

    fn io(&mut self) -> Result<&mut T> {
        self.inner.as_mut().ok_or(StreamError::Disposed)
    }
}

impl<T> AsyncDispose for AsyncIoStream<T> {
    async fn dispose_async(&mut self) -> Result<()> {
        self.inner = None;
        Ok(())
    }
}

impl<T: AsyncRead + Unpin> AsyncSequentialInput for AsyncIoStream<T> {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.io()?.read(buf).await?)
    }
}

impl<T: AsyncWrite + Unpin> AsyncSequentialOutput for AsyncIoStream<T> {
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        match self.io()?.write(buf).await? {
            0 if !buf.is_empty() => Err(StreamError::write_zero()),
            n => Ok(n),
        }
    }

    async fn flush_async(&mut self) -> Result<()> {
        Ok(self.io()?.flush().await?)
    }
}

impl<T: AsyncSeek + Unpin> crate::stream::StreamOrigin<u64> for AsyncIoStream<T> {
    fn start_of_stream(&self) -> u64 {
        0
    }
}

impl<T: AsyncSeek + Unpin> AsyncRandomAccess<u64> for AsyncIoStream<T> {
    async fn position_async(&mut self) -> Result<u64> {
        Ok(self.io()?.stream_position().await?)
    }

    async fn seek_async(&mut self, position: u64) -> Result<()> {
        self.io()?.seek(SeekFrom::Start(position)).await?;
        Ok(())
    }

    async fn length_async(&mut self) -> Result<u64> {
        let io = self.io()?;
        let current = io.stream_position().await?;
        let end = io.seek(SeekFrom::End(0)).await?;
        if end != current {
            io.seek(SeekFrom::Start(current)).await?;
        }
        Ok(end)
    }
}

impl<T: AsyncWrite + AsyncSeek + AsyncSetLen + Unpin> AsyncRandomOutput<u64> for AsyncIoStream<T> {
    async fn set_length_async(&mut self, length: u64) -> Result<()> {
        Ok(self.io()?.set_len_async(length).await?)
    }
}
