//! Test-data streams and an in-process pipe for exercising filters
//!
//! Available with the `test-data` feature (on by default).
//!
//! ```no_run
//! use s_zip_io::testing::InputTestDataStream;
//! use s_zip_io::InputStreamExt;
//!
//! let mut input = InputTestDataStream::create(1024 * 1024, None)?;
//! let content_length = input.read_u64_le()?;
//! let (crc, _) = (&mut input).with_partial(content_length, true).calculate_crc32(None)?;
//! assert_eq!(crc, input.read_u32_le()?);
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```

pub mod pipe;
pub mod test_data;

pub use pipe::{in_process_pipe, PipeReader, PipeWriter, PIPE_CAPACITY, PIPE_CHUNK_SIZE};
pub use test_data::{
    ByteFilter, InputTestDataStream, OutputTestDataStream, FRAMING_SIZE, MAX_CONTENT_CHUNK,
};
