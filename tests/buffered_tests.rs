//! Tests for read-ahead and write-behind caches
//!
//! Run with: cargo test --test buffered_tests

use s_zip_io::{
    CacheConfig, Dispose, InputStreamExt, IoStream, MemoryStream, OutputStreamExt, RandomAccess,
    RandomInputExt, RandomOutput, Result, SequentialInput, SequentialOutput, StreamError,
    StreamOrigin,
};
use tempfile::NamedTempFile;

/// Memory stream that counts the reads and writes reaching it
#[derive(Default)]
struct Tally {
    stream: MemoryStream,
    reads: usize,
    writes: usize,
}

impl Tally {
    fn new(data: Vec<u8>) -> Self {
        Self {
            stream: MemoryStream::from_vec(data),
            ..Self::default()
        }
    }
}

impl Dispose for Tally {
    fn dispose(&mut self) -> Result<()> {
        self.stream.dispose()
    }
}

impl SequentialInput for Tally {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reads += 1;
        self.stream.read(buf)
    }
}

impl SequentialOutput for Tally {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.writes += 1;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }
}

impl StreamOrigin<u64> for Tally {
    fn start_of_stream(&self) -> u64 {
        0
    }
}

impl RandomAccess<u64> for Tally {
    fn position(&mut self) -> Result<u64> {
        self.stream.position()
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.stream.seek(position)
    }

    fn length(&mut self) -> Result<u64> {
        self.stream.length()
    }
}

impl RandomOutput<u64> for Tally {
    fn set_length(&mut self, length: u64) -> Result<()> {
        self.stream.set_length(length)
    }
}

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 199) as u8).collect()
}

#[test]
fn test_zero_cache_size_is_rejected() {
    let mut base = MemoryStream::new();
    let err = (&mut base)
        .with_cache(CacheConfig::default().with_cache_size(0), false)
        .unwrap_err();
    assert!(matches!(err, StreamError::InvalidArgument(_)));
    assert!(base.is_disposed());
}

#[test]
fn test_empty_stream_through_small_cache() -> Result<()> {
    let mut input = MemoryStream::new().with_cache(CacheConfig::default().with_cache_size(64), false)?;
    let mut buf = [0u8; 16];
    assert_eq!(input.read(&mut buf)?, 0);
    assert_eq!(input.read(&mut buf)?, 0);
    Ok(())
}

#[test]
fn test_buffered_input_batches_small_reads() -> Result<()> {
    let data = sample(1000);
    let mut base = Tally::new(data.clone());
    let mut input = (&mut base).with_cache(CacheConfig::default().with_cache_size(256), true)?;
    let mut collected = Vec::new();
    while let Some(byte) = input.read_byte_opt()? {
        collected.push(byte);
    }
    input.dispose()?;
    assert_eq!(collected, data);
    // Three full caches, one partial, one at end-of-data
    assert_eq!(base.reads, 5);
    Ok(())
}

#[test]
fn test_random_cache_seek_inside_cached_range() -> Result<()> {
    let data = sample(4096);
    let mut base = Tally::new(data.clone());
    {
        let mut input = (&mut base).with_random_cache(CacheConfig::small(), true)?;
        assert_eq!(input.read_byte()?, data[0]);

        input.seek(3000)?;
        assert_eq!(input.read_byte()?, data[3000]);
        input.seek(10)?;
        assert_eq!(input.read_byte()?, data[10]);
        assert_eq!(input.position()?, 11);
        assert_eq!(input.length()?, 4096);
    }
    assert_eq!(base.reads, 1);
    Ok(())
}

#[test]
fn test_random_cache_seek_outside_cached_range() -> Result<()> {
    let data = sample(20_000);
    let mut input = MemoryStream::from_vec(data.clone())
        .with_random_cache(CacheConfig::small(), false)?;
    input.seek(15_000)?;
    let mut buf = [0u8; 100];
    input.read_exact_bytes(&mut buf)?;
    assert_eq!(&buf[..], &data[15_000..15_100]);
    input.seek(2)?;
    assert_eq!(input.read_bytes(3)?, &data[2..5]);
    Ok(())
}

#[test]
fn test_buffered_output_defers_writes() -> Result<()> {
    let mut base = Tally::new(Vec::new());
    {
        let mut output = (&mut base).with_cache_output(CacheConfig::default().with_cache_size(100), true)?;
        for chunk in b"the quick brown fox".chunks(3) {
            output.write_all_bytes(chunk)?;
        }
        assert_eq!(output.pending_len(), 19);
        assert_eq!(output.position()?, 19);
        assert_eq!(output.length()?, 19);
        output.dispose()?;
    }
    assert_eq!(base.writes, 1);
    assert_eq!(base.stream.as_slice(), b"the quick brown fox");
    Ok(())
}

#[test]
fn test_buffered_output_seek_drains_first() -> Result<()> {
    let mut base = MemoryStream::from_vec(vec![b'-'; 10]);
    {
        let mut output = (&mut base).with_cache_output(CacheConfig::small(), true)?;
        output.write_all_bytes(b"abc")?;
        output.seek(7)?;
        output.write_all_bytes(b"xyz")?;
        output.set_length(12)?;
        output.flush()?;
    }
    assert_eq!(base.as_slice(), b"abc----xyz\0\0");
    Ok(())
}

#[test]
fn test_buffered_output_into_inner_flushes() -> Result<()> {
    let mut output = MemoryStream::new().with_cache_output(CacheConfig::default(), false)?;
    output.write_u32_le(0x0403_4B50)?;
    let base = output.into_inner()?;
    assert_eq!(base.as_slice(), b"PK\x03\x04");
    Ok(())
}

#[test]
fn test_dropped_output_writes_pending_bytes() -> Result<()> {
    let mut base = Tally::new(Vec::new());
    {
        let mut output = (&mut base).with_cache_output(CacheConfig::default(), true)?;
        output.write_all_bytes(b"pending")?;
        assert_eq!(output.pending_len(), 7);
    }
    assert_eq!(base.writes, 1);
    assert_eq!(base.stream.as_slice(), b"pending");
    assert!(!base.stream.is_disposed());
    Ok(())
}

#[test]
fn test_dropped_output_survives_a_full_base() -> Result<()> {
    let mut base = MemoryStream::new();
    {
        let limited = (&mut base).with_partial_output(3, true);
        let mut output = limited.with_cache_output(CacheConfig::small(), false)?;
        output.write_all_bytes(b"pending")?;
    }
    assert_eq!(base.as_slice(), b"pen");
    Ok(())
}

#[test]
fn test_disposed_output_drop_writes_nothing_more() -> Result<()> {
    let mut base = Tally::new(Vec::new());
    {
        let mut output = (&mut base).with_cache_output(CacheConfig::default(), true)?;
        output.write_all_bytes(b"once")?;
        output.dispose()?;
    }
    assert_eq!(base.writes, 1);
    assert_eq!(base.stream.as_slice(), b"once");
    Ok(())
}

#[test]
fn test_random_cache_leaves_base_at_logical_position() -> Result<()> {
    let data = sample(4096);
    let mut base = MemoryStream::from_vec(data.clone());
    {
        let mut input = (&mut base).with_random_cache(CacheConfig::small(), true)?;
        assert_eq!(input.read_bytes(100)?, &data[..100]);
        input.seek(10)?;
        assert_eq!(input.read_byte()?, data[10]);
        input.dispose()?;
    }
    assert_eq!(base.position()?, 11);
    assert_eq!(base.read_byte()?, data[11]);

    base.seek(0)?;
    let mut input = (&mut base).with_random_cache(CacheConfig::small(), true)?;
    input.read_bytes(5)?;
    let base = input.into_inner()?;
    assert_eq!(base.position()?, 5);
    Ok(())
}

#[test]
fn test_large_writes_bypass_cache() -> Result<()> {
    let mut base = Tally::new(Vec::new());
    {
        let mut output = (&mut base).with_cache_output(CacheConfig::default().with_cache_size(16), true)?;
        output.write_all_bytes(b"ab")?;
        output.write_all_bytes(&[1u8; 64])?;
        assert_eq!(output.pending_len(), 0);
        output.dispose()?;
    }
    assert_eq!(base.writes, 2);
    assert_eq!(base.stream.as_slice().len(), 66);
    Ok(())
}

#[test]
fn test_file_round_trip_through_caches() -> Result<()> {
    let temp = NamedTempFile::new().unwrap();
    let data = sample(300_000);

    let mut output = IoStream::create(temp.path())?.with_cache_output(CacheConfig::default(), false)?;
    output.write_all_bytes(&data)?;
    output.write_u64_be(u64::MAX - 1)?;
    output.dispose()?;

    let mut input = IoStream::open(temp.path())?.with_random_cache(CacheConfig::large(), false)?;
    assert_eq!(input.length()?, data.len() as u64 + 8);
    input.seek(data.len() as u64)?;
    assert_eq!(input.read_u64_be()?, u64::MAX - 1);
    input.seek(0)?;
    assert_eq!(input.read_bytes(data.len())?, data);
    input.dispose()?;
    input.dispose()?;
    assert!(matches!(input.read_byte(), Err(StreamError::Disposed)));
    Ok(())
}

#[cfg(feature = "async")]
mod async_tests {
    use super::sample;
    use s_zip_io::{
        AsyncDispose, AsyncInputStreamExt, AsyncIoStream, AsyncOutputStreamExt, AsyncRandomAccess,
        AsyncRandomInputExt, AsyncSequentialOutput, CacheConfig, MemoryStream, Result,
    };
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_async_empty_stream_small_cache() -> Result<()> {
        let mut input = MemoryStream::new()
            .with_cache_async(CacheConfig::default().with_cache_size(64), false)
            .await?;
        let mut buf = [0u8; 8];
        assert_eq!(input.read_fill_async(&mut buf).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_async_file_round_trip() -> Result<()> {
        let temp = NamedTempFile::new().unwrap();
        let data = sample(150_000);

        let file = AsyncIoStream::create(temp.path()).await?;
        let mut output = file.with_cache_output_async(CacheConfig::default(), false).await?;
        output.write_all_bytes_async(&data).await?;
        output.flush_async().await?;
        output.dispose_async().await?;

        let file = AsyncIoStream::open(temp.path()).await?;
        let mut input = file.with_random_cache_async(CacheConfig::small(), false).await?;
        assert_eq!(input.length_async().await?, data.len() as u64);
        input.seek_async(100_000).await?;
        assert_eq!(input.read_bytes_async(10).await?, &data[100_000..100_010]);
        input.seek_async(100_002).await?;
        assert_eq!(input.read_byte_async().await?, data[100_002]);
        input.dispose_async().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_async_random_cache_leaves_base_at_logical_position() -> Result<()> {
        let data = sample(4096);
        let mut base = MemoryStream::from_vec(data.clone());
        {
            let mut input = (&mut base)
                .with_random_cache_async(CacheConfig::small(), true)
                .await?;
            assert_eq!(input.read_bytes_async(50).await?, &data[..50]);
            input.seek_async(20).await?;
            input.dispose_async().await?;
        }
        assert_eq!(base.position_async().await?, 20);
        Ok(())
    }
}
