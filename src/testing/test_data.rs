//! Self-validating test data streams
//!
//! Both streams speak the same framing:
//!
//! ```text
//! u64 LE content length | content bytes | u32 LE CRC-32 of the content
//! ```
//!
//! [`InputTestDataStream`] produces a random payload in that framing from a
//! background thread. [`OutputTestDataStream`] accepts bytes in that framing
//! and checks them on a background thread, reporting failures to a handler
//! and on the next write or flush.

use crate::error::{Result, StreamError};
use crate::ext::{InputStreamExt, OutputStreamExt};
use crate::instrument::{EndActionOutput, EndActionObserver, ObservedOutput};
use crate::progress::{invoke_guarded, ResultHolder};
use crate::stream::{Dispose, SequentialInput, SequentialOutput};
use crate::testing::pipe::{in_process_pipe, PipeReader, PipeWriter};
use rand::RngCore;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;

/// Bytes taken by the length header and the CRC trailer
pub const FRAMING_SIZE: u64 = 12;

/// Largest run of random bytes generated at once
pub const MAX_CONTENT_CHUNK: usize = 1024 * 1024;

/// Optional per-byte transform applied to generated content
pub type ByteFilter = Box<dyn Fn(u8) -> u8 + Send>;

fn incorrect(detail: &str) -> StreamError {
    StreamError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("output test data is incorrect: {}", detail),
    ))
}

/// Readable stream of framed random test data.
///
/// `length` counts the whole stream including the 12 framing bytes.
#[derive(Debug)]
pub struct InputTestDataStream {
    reader: PipeReader,
}

impl InputTestDataStream {
    /// Start generating `length` bytes of framed test data.
    ///
    /// Fails with `InvalidArgument` when `length` is less than 12.
    pub fn create(length: u64, byte_filter: Option<ByteFilter>) -> Result<Self> {
        if length < FRAMING_SIZE {
            return Err(StreamError::invalid(format!(
                "test data length {} is shorter than its {} framing bytes",
                length, FRAMING_SIZE
            )));
        }
        let content_length = length - FRAMING_SIZE;
        let (writer, reader) = in_process_pipe();
        thread::spawn(move || match produce(writer, content_length, byte_filter) {
            Ok(()) => tracing::debug!(content_length, "test data produced"),
            Err(e) => tracing::debug!(error = %e, "test data producer stopped"),
        });
        Ok(Self { reader })
    }
}

fn produce(mut out: PipeWriter, content_length: u64, byte_filter: Option<ByteFilter>) -> Result<()> {
    out.write_u64_le(content_length)?;

    let holder = ResultHolder::new();
    let sink = holder.clone();
    let mut content = (&mut out).with_crc32_output(
        Some(Box::new(move |crc, _| sink.set(crc))),
        true,
    );
    let mut rng = rand::thread_rng();
    let mut chunk = vec![0u8; content_length.min(MAX_CONTENT_CHUNK as u64) as usize];
    let mut remaining = content_length;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        rng.fill_bytes(&mut chunk[..n]);
        if let Some(filter) = &byte_filter {
            chunk[..n].iter_mut().for_each(|b| *b = filter(*b));
        }
        content.write_all_bytes(&chunk[..n])?;
        remaining -= n as u64;
    }
    content.dispose()?;
    drop(content);

    let crc = holder.get().unwrap_or_default();
    out.write_u32_le(crc)?;
    out.dispose()
}

impl Dispose for InputTestDataStream {
    fn dispose(&mut self) -> Result<()> {
        self.reader.dispose()
    }
}

impl SequentialInput for InputTestDataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reader.read(buf)
    }
}

type Fault = Arc<Mutex<Option<StreamError>>>;

/// One-shot "validation finished" signal, taken by whichever disposal path
/// waits on it first
type Finished = Arc<Mutex<Option<oneshot::Receiver<()>>>>;

fn take_finished(finished: &Finished) -> Option<oneshot::Receiver<()>> {
    finished.lock().unwrap_or_else(|e| e.into_inner()).take()
}

/// Block until the validating thread is done.
///
/// Inside an async runtime the wait is skipped: only `dispose_async` may
/// wait there, and it awaits the signal instead.
fn wait_finished(finished: &Finished) {
    let Some(signal) = take_finished(finished) else {
        return;
    };
    if tokio::runtime::Handle::try_current().is_ok() {
        tracing::debug!("test data sink released inside a runtime, not waiting for validation");
        return;
    }
    let _ = signal.blocking_recv();
}

/// Writable sink that validates framed test data.
///
/// A validation failure is passed to the handler once, from the validating
/// thread, and is raised by the next `write` or `flush`. Disposal waits for
/// the validating thread to finish but does not raise the failure;
/// `dispose_async` awaits it without blocking the executor.
pub struct OutputTestDataStream {
    inner: EndActionOutput<PipeWriter>,
    fault: Fault,
    finished: Finished,
}

impl std::fmt::Debug for OutputTestDataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputTestDataStream")
            .field("written", &self.inner.observer().total())
            .finish()
    }
}

impl OutputTestDataStream {
    pub fn create<F>(handler: F) -> Self
    where
        F: FnOnce(StreamError) + Send + 'static,
    {
        let (writer, reader) = in_process_pipe();
        let (finished_tx, finished_rx) = oneshot::channel::<()>();
        let fault: Fault = Arc::default();
        let finished: Finished = Arc::new(Mutex::new(Some(finished_rx)));

        let latch = Arc::clone(&fault);
        thread::spawn(move || {
            match validate(reader) {
                Ok(length) => tracing::debug!(length, "output test data validated"),
                Err(e) => {
                    tracing::debug!(error = %e, "output test data rejected");
                    *latch.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(incorrect(&e.to_string()));
                    invoke_guarded("test data error handler", move || handler(e));
                }
            }
            let _ = finished_tx.send(());
        });

        let waiting = Arc::clone(&finished);
        let wait = EndActionObserver::new(Box::new(move |_| wait_finished(&waiting)));
        Self {
            inner: ObservedOutput::new(writer, wait, false),
            fault,
            finished,
        }
    }

    /// Bytes accepted so far
    pub fn written(&self) -> u64 {
        self.inner.observer().total()
    }

    fn check_fault(&self) -> Result<()> {
        let latched = self.fault.lock().unwrap_or_else(|e| e.into_inner()).take();
        latched.map_or(Ok(()), Err)
    }
}

fn validate(mut input: PipeReader) -> Result<u64> {
    let content_length = input.read_u64_le()?;
    let (actual, _) = (&mut input)
        .with_partial(content_length, true)
        .calculate_crc32(None)?;
    let expected = input.read_u32_le()?;
    if actual != expected {
        return Err(incorrect(&format!(
            "crc mismatch, expected {:08x} got {:08x}",
            expected, actual
        )));
    }
    if input.read_byte_opt()?.is_some() {
        return Err(incorrect("trailing bytes after the crc"));
    }
    Ok(content_length)
}

impl Dispose for OutputTestDataStream {
    fn dispose(&mut self) -> Result<()> {
        self.inner.dispose()
    }
}

impl SequentialOutput for OutputTestDataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.check_fault()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.check_fault()?;
        self.inner.flush()
    }
}

#[cfg(feature = "async")]
mod async_impls {
    use super::*;
    use crate::async_stream::{AsyncDispose, AsyncSequentialInput, AsyncSequentialOutput};

    impl AsyncDispose for InputTestDataStream {
        async fn dispose_async(&mut self) -> Result<()> {
            self.reader.dispose_async().await
        }
    }

    impl AsyncSequentialInput for InputTestDataStream {
        async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reader.read_async(buf).await
        }
    }

    impl AsyncDispose for OutputTestDataStream {
        async fn dispose_async(&mut self) -> Result<()> {
            // Taken first so the end action finds nothing to block on
            let finished = take_finished(&self.finished);
            let released = self.inner.dispose_async().await;
            if let Some(signal) = finished {
                let _ = signal.await;
            }
            released
        }
    }

    impl AsyncSequentialOutput for OutputTestDataStream {
        async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
            self.check_fault()?;
            self.inner.write_async(buf).await
        }

        async fn flush_async(&mut self) -> Result<()> {
            self.check_fault()?;
            self.inner.flush_async().await
        }
    }
}
