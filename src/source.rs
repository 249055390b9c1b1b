//! Concrete streams: in-memory buffers, `std::io` adapters in both directions
//!
//! - [`MemoryStream`]: growable `Vec<u8>` with random input and output
//! - [`IoStream`]: any `std::io::Read` / `Write` / `Seek` value as a capability stream
//! - [`StdReader`] / [`StdWriter`]: any capability stream as `std::io::Read` / `Write`

use crate::error::{Result, StreamError};
use crate::stream::{
    Dispose, RandomAccess, RandomOutput, SequentialInput, SequentialOutput, StreamOrigin,
};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

fn to_index(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| StreamError::overflow(format!("{} does not fit in memory", value)))
}

/// In-memory random-access stream over a growable byte vector.
///
/// Seeking past the end is allowed; a later write fills the gap with zeros.
/// The contents stay readable through [`MemoryStream::as_slice`] and
/// [`MemoryStream::into_inner`] after disposal.
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
    data: Vec<u8>,
    position: u64,
    disposed: bool,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream positioned at the start of `data`
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            position: 0,
            disposed: false,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn check(&self) -> Result<()> {
        if self.disposed {
            Err(StreamError::Disposed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn read_now(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check()?;
        let start = to_index(self.position)?;
        if start >= self.data.len() || buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }

    pub(crate) fn write_now(&mut self, buf: &[u8]) -> Result<usize> {
        self.check()?;
        let start = to_index(self.position)?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| StreamError::overflow("memory stream write past usize::MAX"))?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    pub(crate) fn seek_now(&mut self, position: u64) -> Result<()> {
        self.check()?;
        self.position = position;
        Ok(())
    }

    pub(crate) fn position_now(&self) -> Result<u64> {
        self.check()?;
        Ok(self.position)
    }

    pub(crate) fn length_now(&self) -> Result<u64> {
        self.check()?;
        Ok(self.data.len() as u64)
    }

    pub(crate) fn set_length_now(&mut self, length: u64) -> Result<()> {
        self.check()?;
        self.data.resize(to_index(length)?, 0);
        self.position = self.position.min(length);
        Ok(())
    }

    pub(crate) fn dispose_now(&mut self) {
        self.disposed = true;
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for MemoryStream {
    fn from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }
}

impl Dispose for MemoryStream {
    fn dispose(&mut self) -> Result<()> {
        self.dispose_now();
        Ok(())
    }
}

impl SequentialInput for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_now(buf)
    }
}

impl SequentialOutput for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_now(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.check()
    }
}

impl StreamOrigin<u64> for MemoryStream {
    fn start_of_stream(&self) -> u64 {
        0
    }
}

impl RandomAccess<u64> for MemoryStream {
    fn position(&mut self) -> Result<u64> {
        self.position_now()
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.seek_now(position)
    }

    fn length(&mut self) -> Result<u64> {
        self.length_now()
    }
}

impl RandomOutput<u64> for MemoryStream {
    fn set_length(&mut self, length: u64) -> Result<()> {
        self.set_length_now(length)
    }
}

/// Resources whose length can be changed in place.
pub trait SetLen {
    fn set_len(&mut self, length: u64) -> io::Result<()>;
}

impl SetLen for File {
    fn set_len(&mut self, length: u64) -> io::Result<()> {
        File::set_len(self, length)
    }
}

impl SetLen for Cursor<Vec<u8>> {
    fn set_len(&mut self, length: u64) -> io::Result<()> {
        let length = usize::try_from(length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length too large"))?;
        self.get_mut().resize(length, 0);
        Ok(())
    }
}

/// Capability stream over a `std::io` value.
///
/// Capabilities follow the wrapped type: `Read` gives sequential input,
/// `Write` sequential output, `Seek` random access with `u64` positions,
/// and `Write + Seek + SetLen` random output. Disposal drops the wrapped
/// value, which closes files and flushes `BufWriter`s.
#[derive(Debug)]
pub struct IoStream<T> {
    inner: Option<T>,
}

impl IoStream<File> {
    /// Open an existing file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }

    /// Create (or truncate) a file for reading and writing
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl<T> IoStream<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Some(inner) }
    }

    /// The wrapped value, or `None` once disposed
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }

    pub fn get_ref(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    fn io(&mut self) -> Result<&mut T> {
        self.inner.as_mut().ok_or(StreamError::Disposed)
    }
}

impl<T> Dispose for IoStream<T> {
    fn dispose(&mut self) -> Result<()> {
        self.inner = None;
        Ok(())
    }
}

impl<T: Read> SequentialInput for IoStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let io = self.io()?;
        loop {
            match io.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<T: Write> SequentialOutput for IoStream<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let io = self.io()?;
        loop {
            match io.write(buf) {
                Ok(0) if !buf.is_empty() => return Err(StreamError::write_zero()),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.io()?.flush()?)
    }
}

impl<T: Seek> StreamOrigin<u64> for IoStream<T> {
    fn start_of_stream(&self) -> u64 {
        0
    }
}

impl<T: Seek> RandomAccess<u64> for IoStream<T> {
    fn position(&mut self) -> Result<u64> {
        Ok(self.io()?.stream_position()?)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.io()?.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn length(&mut self) -> Result<u64> {
        let io = self.io()?;
        let current = io.stream_position()?;
        let end = io.seek(SeekFrom::End(0))?;
        if end != current {
            io.seek(SeekFrom::Start(current))?;
        }
        Ok(end)
    }
}

impl<T: Write + Seek + SetLen> RandomOutput<u64> for IoStream<T> {
    fn set_length(&mut self, length: u64) -> Result<()> {
        Ok(self.io()?.set_len(length)?)
    }
}

fn seek_target<S: RandomAccess<u64>>(stream: &mut S, pos: SeekFrom) -> io::Result<u64> {
    let base = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::End(delta) => (stream.length()?, delta),
        SeekFrom::Current(delta) => (stream.position()?, delta),
    };
    base.0
        .checked_add_signed(base.1)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream"))
}

/// `std::io::Read` (and `Seek`) view of a capability stream.
#[derive(Debug)]
pub struct StdReader<S> {
    stream: S,
}

impl<S> StdReader<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: SequentialInput> Read for StdReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.stream.read(buf)?)
    }
}

impl<S: RandomAccess<u64>> Seek for StdReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = seek_target(&mut self.stream, pos)?;
        self.stream.seek(target)?;
        Ok(target)
    }
}

/// `std::io::Write` (and `Seek`) view of a capability stream.
#[derive(Debug)]
pub struct StdWriter<S> {
    stream: S,
}

impl<S> StdWriter<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: SequentialOutput> Write for StdWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.stream.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.stream.flush()?)
    }
}

impl<S: RandomAccess<u64>> Seek for StdWriter<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = seek_target(&mut self.stream, pos)?;
        self.stream.seek(target)?;
        Ok(target)
    }
}
