//! Tee output: every write goes to two destinations, first one first

use crate::error::Result;
use crate::ext::OutputStreamExt;
use crate::filter::FilterCore;
use crate::stream::{Dispose, SequentialOutput};

/// Output forwarding every write to two streams.
///
/// `write` hands the buffer to the first destination, then writes exactly
/// the bytes it accepted to the second. If the first destination fails, the
/// second is not touched for that call.
#[derive(Debug)]
pub struct BranchOutput<S1, S2> {
    first: FilterCore<S1>,
    second: FilterCore<S2>,
}

impl<S1, S2> BranchOutput<S1, S2> {
    pub fn new(first: S1, second: S2, leave_open: bool) -> Self {
        Self {
            first: FilterCore::new(first, leave_open),
            second: FilterCore::new(second, leave_open),
        }
    }

    pub fn first_mut(&mut self) -> Result<&mut S1> {
        self.first.get()
    }

    pub fn second_mut(&mut self) -> Result<&mut S2> {
        self.second.get()
    }

    pub fn into_inner(self) -> (S1, S2) {
        (self.first.into_inner(), self.second.into_inner())
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S1, &mut S2)> {
        Ok((self.first.get()?, self.second.get()?))
    }

    pub(crate) fn cores_mut(&mut self) -> (&mut FilterCore<S1>, &mut FilterCore<S2>) {
        (&mut self.first, &mut self.second)
    }
}

impl<S1: SequentialOutput, S2: SequentialOutput> Dispose for BranchOutput<S1, S2> {
    fn dispose(&mut self) -> Result<()> {
        let first = if self.first.begin_dispose().is_some() {
            self.first.end_dispose()
        } else {
            Ok(())
        };
        let second = if self.second.begin_dispose().is_some() {
            self.second.end_dispose()
        } else {
            Ok(())
        };
        first.and(second)
    }
}

impl<S1: SequentialOutput, S2: SequentialOutput> SequentialOutput for BranchOutput<S1, S2> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (first, second) = self.parts()?;
        let n = first.write(buf)?;
        second.write_all_bytes(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        let (first, second) = self.parts()?;
        first.flush()?;
        second.flush()
    }
}
