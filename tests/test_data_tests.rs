//! Tests for the self-validating test data streams
//!
//! Run with: cargo test --features test-data --test test_data_tests

#![cfg(feature = "test-data")]

use s_zip_io::testing::{InputTestDataStream, OutputTestDataStream};
use s_zip_io::{
    CacheConfig, Crc32, Dispose, InputStreamExt, OutputStreamExt, ResultHolder, Result,
    SequentialOutput, StreamError,
};
use std::io;
use std::sync::mpsc;

const TEN_MIB: u64 = 10 * 1024 * 1024;

#[test]
fn test_embedded_crc_matches_content() -> Result<()> {
    let mut input = InputTestDataStream::create(TEN_MIB, None)?;
    let content_length = input.read_u64_le()?;
    assert_eq!(content_length, TEN_MIB - 12);

    let holder = ResultHolder::new();
    let sink = holder.clone();
    let mut content = (&mut input)
        .with_partial(content_length, true)
        .with_crc32(Some(Box::new(move |crc, len| sink.set((crc, len)))), false);
    let copied = content.copy_to(&mut s_zip_io::MemoryStream::new(), None)?;
    content.dispose()?;
    assert_eq!(copied, content_length);

    let embedded = input.read_u32_le()?;
    assert_eq!(holder.get(), Some((embedded, content_length)));
    assert_eq!(input.read_byte_opt()?, None);
    Ok(())
}

#[test]
fn test_round_trip_into_validator() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut output = OutputTestDataStream::create(move |e| {
        let _ = tx.send(e.to_string());
    })
    .with_cache_output(CacheConfig::default(), false)?;
    let mut input = InputTestDataStream::create(3 * 1024 * 1024 + 5, None)?;
    let copied = input.copy_to(&mut output, None)?;
    output.dispose()?;
    input.dispose()?;
    assert_eq!(copied, 3 * 1024 * 1024 + 5);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn test_filtered_content() -> Result<()> {
    let mut input = InputTestDataStream::create(4096, Some(Box::new(|b| b | 0x80)))?;
    let content_length = input.read_u64_le()?;
    let content = input.read_bytes(content_length as usize)?;
    assert!(content.iter().all(|&b| b >= 0x80));
    assert_eq!(input.read_u32_le()?, Crc32::checksum(&content));
    Ok(())
}

#[test]
fn test_validator_latches_failure_until_next_write() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut output = OutputTestDataStream::create(move |e| {
        let _ = tx.send(e.to_string());
    });
    output.write_u64_le(4)?;
    output.write_all_bytes(b"data")?;
    output.write_u32_le(Crc32::checksum(b"atad"))?;

    let reported = rx.recv().unwrap();
    assert!(reported.contains("crc mismatch"));

    match output.write(b"more") {
        Err(StreamError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
        other => panic!("expected latched failure, got {:?}", other),
    }
    output.dispose()?;
    Ok(())
}

#[test]
fn test_validator_rejects_trailing_bytes() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut output = OutputTestDataStream::create(move |e| {
        let _ = tx.send(e.to_string());
    });
    output.write_u64_le(1)?;
    output.write_byte(b'x')?;
    output.write_u32_le(Crc32::checksum(b"x"))?;
    output.write_byte(0)?;
    output.dispose()?;
    assert!(rx.recv().unwrap().contains("trailing"));
    Ok(())
}

#[test]
fn test_validator_reports_truncated_stream() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut output = OutputTestDataStream::create(move |e| {
        let _ = tx.send(e);
    });
    output.write_u64_le(100)?;
    output.write_all_bytes(&[0u8; 10])?;
    output.dispose()?;
    assert!(matches!(rx.recv().unwrap(), StreamError::UnexpectedEndOfData));
    Ok(())
}

#[cfg(feature = "async")]
mod async_tests {
    use s_zip_io::testing::{InputTestDataStream, OutputTestDataStream};
    use s_zip_io::{AsyncDispose, AsyncInputStreamExt, AsyncOutputStreamExt, Crc32, Result};
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_async_round_trip_into_validator() -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let mut output = OutputTestDataStream::create(move |e| {
            let _ = tx.send(e.to_string());
        });
        let mut input = InputTestDataStream::create(2 * 1024 * 1024, None)?;
        let copied = input.copy_to_async(&mut output, None).await?;
        output.dispose_async().await?;
        input.dispose_async().await?;
        assert_eq!(copied, 2 * 1024 * 1024);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_async_dispose_keeps_the_runtime_running() -> Result<()> {
        // The handler holds the validating thread until a task on this
        // runtime runs, which only happens while dispose_async is pending.
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (seen_tx, seen_rx) = mpsc::channel();
        let mut output = OutputTestDataStream::create(move |e| {
            let released = go_rx.recv_timeout(Duration::from_secs(5)).is_ok();
            let _ = seen_tx.send((e.to_string(), released));
        });
        output.write_u64_le_async(1).await?;
        output.write_byte_async(b'x').await?;
        output.write_u32_le_async(Crc32::checksum(b"x")).await?;
        output.write_all_bytes_async(b"extra").await?;

        tokio::spawn(async move {
            let _ = go_tx.send(());
        });
        output.dispose_async().await?;

        let (message, released) = seen_rx.try_recv().unwrap();
        assert!(message.contains("trailing"));
        assert!(released, "validation finished only after its handler timed out");
        Ok(())
    }

    #[tokio::test]
    async fn test_async_embedded_crc() -> Result<()> {
        let mut input = InputTestDataStream::create(100_000, None)?;
        let content_length = input.read_u64_le_async().await?;
        let content = input.read_bytes_async(content_length as usize).await?;
        let embedded = input.read_u32_le_async().await?;
        assert_eq!(embedded, s_zip_io::Crc32::checksum(&content));
        Ok(())
    }
}
