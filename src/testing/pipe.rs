//! Bounded in-process byte pipe
//!
//! The writer half is a sequential output, the reader half a sequential
//! input. Chunks travel over a bounded `tokio::sync::mpsc` channel, so a
//! fast writer blocks (or awaits) until the reader catches up.
//!
//! The sync surface uses the channel's blocking calls and must not be driven
//! from inside an async runtime; use the `_async` surface there.

use crate::error::{Result, StreamError};
use crate::stream::{Dispose, SequentialInput, SequentialOutput};
use std::io;
use tokio::sync::mpsc;

/// Number of chunks the pipe holds before the writer has to wait
pub const PIPE_CAPACITY: usize = 16;

/// Largest chunk a single write hands to the reader
pub const PIPE_CHUNK_SIZE: usize = 64 * 1024;

/// Create a connected writer/reader pair.
///
/// Disposing (or dropping) the writer signals end-of-data to the reader.
/// Disposing (or dropping) the reader makes further writes fail with a
/// broken-pipe error.
pub fn in_process_pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
    (
        PipeWriter { tx: Some(tx) },
        PipeReader {
            rx: Some(rx),
            current: Vec::new(),
            cursor: 0,
        },
    )
}

fn reader_gone() -> StreamError {
    StreamError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "pipe reader closed",
    ))
}

/// Writing half of [`in_process_pipe`]
#[derive(Debug)]
pub struct PipeWriter {
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl PipeWriter {
    fn sender(&self) -> Result<&mpsc::Sender<Vec<u8>>> {
        self.tx.as_ref().ok_or(StreamError::Disposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.tx.is_none()
    }
}

impl Dispose for PipeWriter {
    fn dispose(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

impl SequentialOutput for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let tx = self.sender()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(PIPE_CHUNK_SIZE);
        tx.blocking_send(buf[..n].to_vec())
            .map_err(|_| reader_gone())?;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.sender().map(|_| ())
    }
}

/// Reading half of [`in_process_pipe`]
#[derive(Debug)]
pub struct PipeReader {
    rx: Option<mpsc::Receiver<Vec<u8>>>,
    current: Vec<u8>,
    cursor: usize,
}

impl PipeReader {
    pub fn is_disposed(&self) -> bool {
        self.rx.is_none()
    }

    fn receiver(&mut self) -> Result<&mut mpsc::Receiver<Vec<u8>>> {
        self.rx.as_mut().ok_or(StreamError::Disposed)
    }

    fn take_buffered(&mut self, buf: &mut [u8]) -> usize {
        let n = (self.current.len() - self.cursor).min(buf.len());
        buf[..n].copy_from_slice(&self.current[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    fn has_buffered(&self) -> bool {
        self.cursor < self.current.len()
    }

    fn refill(&mut self, chunk: Option<Vec<u8>>) -> bool {
        match chunk {
            Some(chunk) => {
                self.current = chunk;
                self.cursor = 0;
                true
            }
            None => false,
        }
    }
}

impl Dispose for PipeReader {
    fn dispose(&mut self) -> Result<()> {
        self.rx = None;
        self.current = Vec::new();
        self.cursor = 0;
        Ok(())
    }
}

impl SequentialInput for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.is_disposed() {
            return Err(StreamError::Disposed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.has_buffered() {
            let chunk = self.receiver()?.blocking_recv();
            if !self.refill(chunk) {
                return Ok(0);
            }
        }
        Ok(self.take_buffered(buf))
    }
}

#[cfg(feature = "async")]
mod async_impls {
    use super::*;
    use crate::async_stream::{AsyncDispose, AsyncSequentialInput, AsyncSequentialOutput};

    impl AsyncDispose for PipeWriter {
        async fn dispose_async(&mut self) -> Result<()> {
            self.dispose()
        }
    }

    impl AsyncSequentialOutput for PipeWriter {
        async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
            let tx = self.sender()?;
            if buf.is_empty() {
                return Ok(0);
            }
            let n = buf.len().min(PIPE_CHUNK_SIZE);
            tx.send(buf[..n].to_vec()).await.map_err(|_| reader_gone())?;
            Ok(n)
        }

        async fn flush_async(&mut self) -> Result<()> {
            self.flush()
        }
    }

    impl AsyncDispose for PipeReader {
        async fn dispose_async(&mut self) -> Result<()> {
            self.dispose()
        }
    }

    impl AsyncSequentialInput for PipeReader {
        async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.is_disposed() {
                return Err(StreamError::Disposed);
            }
            if buf.is_empty() {
                return Ok(0);
            }
            if !self.has_buffered() {
                let chunk = self.receiver()?.recv().await;
                if !self.refill(chunk) {
                    return Ok(0);
                }
            }
            Ok(self.take_buffered(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::{InputStreamExt, OutputStreamExt};
    use std::thread;

    #[test]
    fn test_pipe_transfers_across_threads() {
        let (mut writer, mut reader) = in_process_pipe();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();
        let producer = thread::spawn(move || {
            writer.write_all_bytes(&data).unwrap();
            writer.dispose().unwrap();
        });
        let received = reader.read_all_bytes().unwrap();
        producer.join().unwrap();
        assert_eq!(received, expected);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_closed_reader_breaks_writer() {
        let (mut writer, mut reader) = in_process_pipe();
        reader.dispose().unwrap();
        assert!(matches!(reader.read(&mut [0u8; 1]), Err(StreamError::Disposed)));
        match writer.write(b"x") {
            Err(StreamError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[cfg(feature = "async")]
    mod async_tests {
        use super::*;
        use crate::async_ext::{AsyncInputStreamExt, AsyncOutputStreamExt};
        use crate::async_stream::AsyncDispose;

        #[tokio::test]
        async fn test_async_pipe_round_trip() {
            let (mut writer, mut reader) = in_process_pipe();
            let producer = async {
                writer.write_u32_le_async(0xDEAD_BEEF).await.unwrap();
                writer.write_all_bytes_async(&[7u8; 100_000]).await.unwrap();
                writer.dispose_async().await.unwrap();
            };
            let consumer = async {
                let header = reader.read_u32_le_async().await.unwrap();
                (header, reader.read_all_bytes_async().await.unwrap())
            };
            let ((), (header, rest)) = tokio::join!(producer, consumer);
            assert_eq!(header, 0xDEAD_BEEF);
            assert_eq!(rest.len(), 100_000);
            assert!(rest.iter().all(|&b| b == 7));
        }
    }
}
