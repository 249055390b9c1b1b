//! Async surface of the instrumentation and branch filters

use crate::async_ext::AsyncOutputStreamExt;
use crate::async_stream::{AsyncDispose, AsyncSequentialInput, AsyncSequentialOutput};
use crate::branch::BranchOutput;
use crate::error::Result;
use crate::instrument::{ObservedInput, ObservedOutput, Observer};

impl<S: AsyncSequentialInput, O: Observer> AsyncDispose for ObservedInput<S, O> {
    async fn dispose_async(&mut self) -> Result<()> {
        let Some((core, slot)) = self.teardown_parts() else {
            return Ok(());
        };
        let released = core.end_dispose_async().await;
        slot.finish();
        released
    }
}

impl<S: AsyncSequentialInput, O: Observer> AsyncSequentialInput for ObservedInput<S, O> {
    async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, slot) = self.parts()?;
        let n = inner.read_async(buf).await?;
        slot.transfer(&buf[..n]);
        Ok(n)
    }
}

impl<S: AsyncSequentialOutput, O: Observer> AsyncDispose for ObservedOutput<S, O> {
    async fn dispose_async(&mut self) -> Result<()> {
        let Some((core, slot)) = self.teardown_parts() else {
            return Ok(());
        };
        let released = core.end_dispose_async().await;
        slot.finish();
        released
    }
}

impl<S: AsyncSequentialOutput, O: Observer> AsyncSequentialOutput for ObservedOutput<S, O> {
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, slot) = self.parts()?;
        let n = inner.write_async(buf).await?;
        slot.transfer(&buf[..n]);
        Ok(n)
    }

    async fn flush_async(&mut self) -> Result<()> {
        self.parts()?.0.flush_async().await
    }
}

impl<S1: AsyncSequentialOutput, S2: AsyncSequentialOutput> AsyncDispose for BranchOutput<S1, S2> {
    async fn dispose_async(&mut self) -> Result<()> {
        let (first_core, second_core) = self.cores_mut();
        let first = if first_core.begin_dispose().is_some() {
            first_core.end_dispose_async().await
        } else {
            Ok(())
        };
        let second = if second_core.begin_dispose().is_some() {
            second_core.end_dispose_async().await
        } else {
            Ok(())
        };
        first.and(second)
    }
}

impl<S1: AsyncSequentialOutput, S2: AsyncSequentialOutput> AsyncSequentialOutput
    for BranchOutput<S1, S2>
{
    async fn write_async(&mut self, buf: &[u8]) -> Result<usize> {
        let (first, second) = self.parts()?;
        let n = first.write_async(buf).await?;
        second.write_all_bytes_async(&buf[..n]).await?;
        Ok(n)
    }

    async fn flush_async(&mut self) -> Result<()> {
        let (first, second) = self.parts()?;
        first.flush_async().await?;
        second.flush_async().await
    }
}
