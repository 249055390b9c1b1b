//! Position arithmetic for random-access streams
//!
//! A position is any ordered value that can be moved forwards or backwards by a
//! byte count and can measure the byte distance to another position. Plain
//! byte offsets use `u64`; composite addressing (for example a volume number
//! plus an offset inside that volume) can implement [`Position`] itself.

use crate::error::{Result, StreamError};
use std::fmt::Debug;

/// Arithmetic every stream position type must support.
///
/// All operations are checked: `None` means the result is not representable.
pub trait Position: Copy + Ord + Debug {
    /// `self + bytes`
    fn checked_add_bytes(self, bytes: u64) -> Option<Self>;

    /// `self - bytes`
    fn checked_sub_bytes(self, bytes: u64) -> Option<Self>;

    /// `self - earlier`, in bytes
    fn checked_distance(self, earlier: Self) -> Option<u64>;
}

impl Position for u64 {
    fn checked_add_bytes(self, bytes: u64) -> Option<Self> {
        self.checked_add(bytes)
    }

    fn checked_sub_bytes(self, bytes: u64) -> Option<Self> {
        self.checked_sub(bytes)
    }

    fn checked_distance(self, earlier: Self) -> Option<u64> {
        self.checked_sub(earlier)
    }
}

/// `position + bytes`, or `Overflow`
pub fn advance<P: Position>(position: P, bytes: u64) -> Result<P> {
    position
        .checked_add_bytes(bytes)
        .ok_or_else(|| StreamError::overflow(format!("{:?} + {}", position, bytes)))
}

/// `position - bytes`, or `Overflow`
pub fn retreat<P: Position>(position: P, bytes: u64) -> Result<P> {
    position
        .checked_sub_bytes(bytes)
        .ok_or_else(|| StreamError::overflow(format!("{:?} - {}", position, bytes)))
}

/// `later - earlier` in bytes, or `Overflow` when `later` precedes `earlier`
pub fn distance<P: Position>(later: P, earlier: P) -> Result<u64> {
    later
        .checked_distance(earlier)
        .ok_or_else(|| StreamError::overflow(format!("{:?} - {:?}", later, earlier)))
}

/// Checked `a + b` on byte counts
pub(crate) fn add_len(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| StreamError::overflow(format!("{} + {}", a, b)))
}
