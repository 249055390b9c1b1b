//! Tests for forward/backward byte sequences and stream comparison
//!
//! Run with: cargo test --test sequence_tests

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use s_zip_io::{
    stream_bytes_equal, stream_bytes_equal_with_progress, ByteSequence, Dispose, InputStreamExt,
    MemoryStream, OutputStreamExt, ProgressCounter, RandomAccess, RandomInputExt, Result,
    ReverseByteSequence, StreamError, SEQUENCE_CHUNK_SIZE,
};
use std::sync::{Arc, Mutex};

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

#[test]
fn test_forward_sequence_yields_every_byte() -> Result<()> {
    let data = random_bytes(3 * SEQUENCE_CHUNK_SIZE + 17, 1);
    let collected: Result<Vec<u8>> = MemoryStream::from_vec(data.clone()).into_byte_sequence(false).collect();
    assert_eq!(collected?, data);
    Ok(())
}

#[test]
fn test_forward_sequence_disposes_at_end() {
    let mut base = MemoryStream::from_vec(vec![1, 2, 3]);
    let count = ByteSequence::new(&mut base, false).count();
    assert_eq!(count, 3);
    assert!(base.is_disposed());

    let mut kept = MemoryStream::from_vec(vec![1, 2, 3]);
    assert_eq!(ByteSequence::new(&mut kept, true).count(), 3);
    assert!(!kept.is_disposed());
}

#[test]
fn test_counted_sequence_reports_short_stream_once() {
    let mut sequence = ByteSequence::with_count(MemoryStream::from_vec(vec![9; 4]), 6, false);
    for _ in 0..4 {
        assert_eq!(sequence.next().unwrap().unwrap(), 9);
    }
    assert!(matches!(sequence.next(), Some(Err(StreamError::UnexpectedEndOfData))));
    assert!(sequence.next().is_none());
}

#[test]
fn test_reverse_sequence_is_forward_reversed() -> Result<()> {
    for len in [0, 1, SEQUENCE_CHUNK_SIZE - 1, SEQUENCE_CHUNK_SIZE, 5 * SEQUENCE_CHUNK_SIZE + 3] {
        let data = random_bytes(len, len as u64);
        let backward: Result<Vec<u8>> = MemoryStream::from_vec(data.clone())
            .into_reverse_byte_sequence(false)?
            .collect();
        let mut backward = backward?;
        backward.reverse();
        assert_eq!(backward, data, "length {}", len);
    }
    Ok(())
}

#[test]
fn test_reverse_sequence_over_range() -> Result<()> {
    let data: Vec<u8> = (0..=255u8).collect();
    let tail: Result<Vec<u8>> = ReverseByteSequence::with_range(MemoryStream::from_vec(data), 250u64, 6, false)?.collect();
    assert_eq!(tail?, vec![255, 254, 253, 252, 251, 250]);

    let err = ReverseByteSequence::with_range(MemoryStream::from_vec(vec![0; 10]), 8u64, 5, false).unwrap_err();
    assert!(matches!(err, StreamError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn test_reverse_sequence_finds_trailing_signature() -> Result<()> {
    let mut archive = random_bytes(40_000, 7);
    archive.retain(|&b| b != 0x50);
    archive.extend_from_slice(b"PK\x05\x06");
    archive.extend_from_slice(&[0u8; 18]);
    let total = archive.len();

    let from_end = ReverseByteSequence::<_, u64>::new(MemoryStream::from_vec(archive), false)?
        .position(|byte| matches!(byte, Ok(0x50)))
        .unwrap();
    assert_eq!(total - 1 - from_end, total - 22);
    Ok(())
}

#[test]
fn test_sequence_progress() {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let sequence = ByteSequence::new(MemoryStream::from_vec(vec![0; 20_000]), false)
        .with_progress(Box::new(move |n| sink.lock().unwrap().push(n)));
    assert_eq!(sequence.count(), 20_000);
    let reports = reports.lock().unwrap();
    assert_eq!(reports.last(), Some(&20_000));
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_compare_streams() -> Result<()> {
    let data = random_bytes(200_000, 3);
    assert!(stream_bytes_equal(
        MemoryStream::from_vec(data.clone()),
        MemoryStream::from_vec(data.clone()),
        false
    )?);

    let mut changed = data.clone();
    changed[150_000] ^= 1;
    assert!(!stream_bytes_equal(
        MemoryStream::from_vec(data.clone()),
        MemoryStream::from_vec(changed),
        false
    )?);

    let mut shorter = MemoryStream::from_vec(data[..1000].to_vec());
    let mut longer = MemoryStream::from_vec(data[..1001].to_vec());
    assert!(!stream_bytes_equal(&mut shorter, &mut longer, false)?);
    assert!(shorter.is_disposed() && longer.is_disposed());

    assert!(stream_bytes_equal(MemoryStream::new(), MemoryStream::new(), false)?);
    Ok(())
}

#[test]
fn test_compare_with_progress_and_leave_open() -> Result<()> {
    let data = random_bytes(100_000, 4);
    let mut first = MemoryStream::from_vec(data.clone());
    let mut second = MemoryStream::from_vec(data);
    let mut progress = ProgressCounter::silent();
    assert!(stream_bytes_equal_with_progress(&mut first, &mut second, Some(&mut progress), true)?);
    assert_eq!(progress.value(), 100_000);
    assert!(!first.is_disposed() && !second.is_disposed());
    Ok(())
}

#[test]
fn test_compare_disposed_stream_fails() {
    let mut gone = MemoryStream::from_vec(vec![1]);
    gone.dispose().unwrap();
    let mut other = MemoryStream::from_vec(vec![1]);
    let err = stream_bytes_equal(&mut gone, &mut other, false).unwrap_err();
    assert!(matches!(err, StreamError::Disposed));
    assert!(other.is_disposed());
}

#[test]
fn test_sequence_over_read_helpers() -> Result<()> {
    let mut base = MemoryStream::from_vec(b"\x03\x00abc".to_vec());
    let len = base.read_u16_le()?;
    let body: Result<Vec<u8>> = ByteSequence::with_count(&mut base, len as u64, true).collect();
    assert_eq!(body?, b"abc");
    Ok(())
}

#[test]
fn test_forward_sequence_over_range() -> Result<()> {
    let data = random_bytes(4 * SEQUENCE_CHUNK_SIZE, 21);
    let offset = SEQUENCE_CHUNK_SIZE + 100;
    let count = 2 * SEQUENCE_CHUNK_SIZE + 7;
    let mut base = MemoryStream::from_vec(data.clone());
    let range: Result<Vec<u8>> = ByteSequence::with_range(&mut base, offset as u64, count as u64, true)?.collect();
    assert_eq!(range?, &data[offset..offset + count]);
    assert_eq!(base.position()?, (offset + count) as u64);
    assert!(!base.is_disposed());

    let err = ByteSequence::with_range(MemoryStream::from_vec(vec![0; 10]), 11u64, 0, false).unwrap_err();
    assert!(matches!(err, StreamError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn test_reverse_sequence_written_back_out() -> Result<()> {
    let data = random_bytes(2 * SEQUENCE_CHUNK_SIZE + 3, 22);
    let backward: Vec<u8> = MemoryStream::from_vec(data.clone())
        .into_reverse_byte_sequence(false)?
        .collect::<Result<_>>()?;
    let mut out = MemoryStream::new();
    assert_eq!(out.write_byte_sequence(backward.into_iter().rev())?, data.len() as u64);
    assert_eq!(out.as_slice(), data.as_slice());
    Ok(())
}

#[cfg(feature = "async")]
mod async_tests {
    use super::random_bytes;
    use futures_util::StreamExt;
    use s_zip_io::{
        collect_bytes, stream_bytes_equal_async, AsyncInputStreamExt, AsyncOutputStreamExt,
        AsyncRandomAccess, ByteSequence, MemoryStream, Result, ReverseByteSequence,
    };

    #[tokio::test]
    async fn test_async_reverse_is_forward_reversed() -> Result<()> {
        let data = random_bytes(50_000, 11);
        let forward = collect_bytes(MemoryStream::from_vec(data.clone()).into_byte_stream(false)).await?;
        assert_eq!(forward, data);

        let reverse = ReverseByteSequence::<_, u64>::new_async(MemoryStream::from_vec(data.clone()), false).await?;
        let mut backward = collect_bytes(reverse.into_stream()).await?;
        backward.reverse();
        assert_eq!(backward, data);
        Ok(())
    }

    #[tokio::test]
    async fn test_async_next_and_stream_take() -> Result<()> {
        let mut sequence = ByteSequence::new(MemoryStream::from_vec(vec![4, 5, 6]), false);
        assert_eq!(sequence.next_async().await.transpose()?, Some(4));
        let rest: Vec<_> = sequence.into_stream().take(5).collect().await;
        assert_eq!(rest.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_async_float_codecs_and_byte_sequence() -> Result<()> {
        let mut stream = MemoryStream::new();
        stream.write_f64_be_async(-1.0e300).await?;
        stream.write_f32_le_async(f32::MIN_POSITIVE).await?;
        assert_eq!(stream.write_byte_sequence_async(b"tail".iter().copied()).await?, 4);
        stream.seek_async(0).await?;
        assert_eq!(stream.read_f64_be_async().await?, -1.0e300);
        assert_eq!(stream.read_f32_le_async().await?, f32::MIN_POSITIVE);
        assert_eq!(stream.read_all_bytes_async().await?, b"tail");
        Ok(())
    }

    #[tokio::test]
    async fn test_async_compare() -> Result<()> {
        let data = random_bytes(90_000, 12);
        assert!(
            stream_bytes_equal_async(
                MemoryStream::from_vec(data.clone()),
                MemoryStream::from_vec(data),
                false
            )
            .await?
        );
        Ok(())
    }
}
