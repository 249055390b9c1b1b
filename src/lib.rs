//! # s-zip-io: Streaming Byte-Stream Foundation for ZIP Archives
//!
//! `s-zip-io` is the stream layer a ZIP reader or writer sits on. It describes
//! byte streams by what they can do (sequential or random access, input or
//! output), and lets you stack small filters on top of them without copying
//! data around.
//!
//! ## Features
//!
//! - **Capability Traits**: Sequential input/output, random-access input/output, typed positions
//! - **Windows**: Expose a bounded sub-range of a stream as a stream of its own
//! - **Buffering**: Read-ahead and write-behind caches with cache-aware seeking
//! - **Instrumentation**: CRC-32 / CRC-24, progress reporting and end-of-stream actions
//! - **Branching**: Duplicate writes into two outputs
//! - **Byte Scanning**: Lazy forward and backward byte sequences, stream comparison
//! - **Async Support**: Every capability also has an `async/await` surface (feature `async`)
//! - **Test Data**: Self-validating streams for exercising filters (feature `test-data`)
//!
//! ## Quick Start
//!
//! ### Reading a window with a CRC
//!
//! ```
//! use s_zip_io::{InputStreamExt, MemoryStream, RandomInputExt, Window};
//!
//! let data: Vec<u8> = (0..100u8).collect();
//! let base = MemoryStream::from_vec(data);
//!
//! // Bytes 10..30 of the base, read through a CRC-32 filter
//! let window = base.with_window(Window::bounded(10u64, 20), false)?;
//! let (crc, length) = window.with_crc32(None, false).calculate_crc32(None)?;
//! assert_eq!(length, 20);
//! assert_eq!(crc, s_zip_io::Crc32::checksum(&(10..30u8).collect::<Vec<_>>()));
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```
//!
//! ### Buffered writing to a file
//!
//! ```no_run
//! use s_zip_io::{CacheConfig, Dispose, IoStream, OutputStreamExt};
//!
//! let file = IoStream::create("output.bin")?;
//! let mut out = file.with_cache_output(CacheConfig::default(), false)?;
//! out.write_u32_le(0x04034b50)?;
//! out.write_all_bytes(b"payload")?;
//! out.dispose()?;
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```
//!
//! ### Scanning backwards
//!
//! ```
//! use s_zip_io::{MemoryStream, RandomInputExt};
//!
//! let tail = MemoryStream::from_vec(b"data PK\x05\x06 end".to_vec());
//! let position = tail
//!     .into_reverse_byte_sequence(false)?
//!     .position(|byte| matches!(byte, Ok(b'P')));
//! assert_eq!(position, Some(7));
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```
//!
//! ### Async
//!
//! ```no_run
//! # #[cfg(feature = "async")]
//! # async fn example() -> s_zip_io::Result<()> {
//! use s_zip_io::{AsyncInputStreamExt, AsyncIoStream, CacheConfig};
//!
//! let file = AsyncIoStream::open("archive.zip").await?;
//! let mut input = file.with_cache_async(CacheConfig::large(), false).await?;
//! let signature = input.read_u32_le_async().await?;
//! println!("signature {:08x}", signature);
//! # Ok(())
//! # }
//! ```

pub mod branch;
pub mod buffered;
pub mod crc;
pub mod error;
pub mod ext;
mod filter;
pub mod instrument;
pub mod partial;
pub mod position;
pub mod progress;
pub mod sequence;
pub mod source;
pub mod stream;

#[cfg(feature = "async")]
pub mod async_stream;

#[cfg(feature = "async")]
pub mod async_source;

#[cfg(feature = "async")]
mod async_partial;

#[cfg(feature = "async")]
mod async_buffered;

#[cfg(feature = "async")]
mod async_instrument;

#[cfg(feature = "async")]
pub mod async_ext;

#[cfg(feature = "async")]
pub mod async_sequence;

#[cfg(feature = "test-data")]
pub mod testing;

pub use branch::BranchOutput;
pub use buffered::{
    BufferedInput, BufferedOutput, BufferedRandomInput, CacheConfig, DEFAULT_CACHE_SIZE,
};
pub use crc::{Crc24, Crc32, CrcSession};
pub use error::{Result, StreamError};
pub use ext::{InputStreamExt, OutputStreamExt, RandomInputExt, RandomOutputExt};
pub use instrument::{
    Crc24Input, Crc24Output, CrcCallback, CrcInput, CrcObserver, CrcOutput, EndAction,
    EndActionInput, EndActionObserver, EndActionOutput, ObservedInput, ObservedOutput, Observer,
    ProgressInput, ProgressObserver, ProgressOutput,
};
pub use partial::{PartialInput, PartialOutput, PartialRandomInput, PartialRandomOutput, Window};
pub use position::{advance, distance, retreat, Position};
pub use progress::{ProgressCounter, ProgressFn, ResultHolder};
pub use sequence::{
    stream_bytes_equal, stream_bytes_equal_with_progress, ByteSequence, ReverseByteSequence,
    BULK_CHUNK_SIZE, SEQUENCE_CHUNK_SIZE,
};
pub use source::{IoStream, MemoryStream, SetLen, StdReader, StdWriter};
pub use stream::{
    Dispose, RandomAccess, RandomInput, RandomOutput, SequentialInput, SequentialOutput,
    StreamOrigin,
};

#[cfg(feature = "async")]
pub use async_ext::{
    AsyncInputStreamExt, AsyncOutputStreamExt, AsyncRandomInputExt, AsyncRandomOutputExt,
};

#[cfg(feature = "async")]
pub use async_sequence::{
    collect_bytes, stream_bytes_equal_async, stream_bytes_equal_with_progress_async,
};

#[cfg(feature = "async")]
pub use async_source::{AsyncIoStream, AsyncSetLen};

#[cfg(feature = "async")]
pub use async_stream::{
    AsyncDispose, AsyncRandomAccess, AsyncRandomInput, AsyncRandomOutput, AsyncSequentialInput,
    AsyncSequentialOutput,
};
