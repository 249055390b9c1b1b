//! Windowing filters (partial streams)
//!
//! A window exposes `[offset, offset + size)` of a base stream as a stream of
//! its own. Random-access windows translate positions: the window's position
//! space starts at a caller-chosen zero value of type `P2`, while the base is
//! addressed with its own position type `P1`. Sequential windows cannot
//! translate anything; they only enforce a byte ceiling.
//!
//! Reading at the end of a window is end-of-data. A base stream that runs
//! dry before the window end fails with [`StreamError::UnexpectedEndOfData`].
//!
//! ```
//! use s_zip_io::{MemoryStream, PartialRandomInput, SequentialInput, Window};
//!
//! let base = MemoryStream::from_vec(b"headerPAYLOADtrailer".to_vec());
//! let mut window = PartialRandomInput::new(base, Window::bounded(6u64, 7), 0u64, false)?;
//! let mut buf = [0u8; 32];
//! let n = window.read(&mut buf)?;
//! assert_eq!(&buf[..n], b"PAYLOAD");
//! assert_eq!(window.read(&mut buf)?, 0);
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```

use crate::error::{Result, StreamError};
use crate::filter::{abandon, FilterCore};
use crate::position::{advance, distance, Position};
use crate::stream::{
    Dispose, RandomAccess, RandomInput, RandomOutput, SequentialInput, SequentialOutput,
    StreamOrigin,
};

/// Sub-range of a base stream.
///
/// `size == None` means the window runs to the end of the base stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<P> {
    pub offset: P,
    pub size: Option<u64>,
}

impl<P: Position> Window<P> {
    pub fn new(offset: P, size: Option<u64>) -> Self {
        Self { offset, size }
    }

    pub fn bounded(offset: P, size: u64) -> Self {
        Self::new(offset, Some(size))
    }

    pub fn unbounded(offset: P) -> Self {
        Self::new(offset, None)
    }

    /// Check the window against a base stream spanning `length` bytes from
    /// `start`.
    pub(crate) fn validate(&self, start: P, length: u64) -> Result<()> {
        let base_end = advance(start, length)?;
        if self.offset < start || self.offset > base_end {
            return Err(StreamError::invalid(format!(
                "window offset {:?} outside base stream [{:?}, {:?}]",
                self.offset, start, base_end
            )));
        }
        if let Some(size) = self.size {
            let end = advance(self.offset, size)?;
            if end > base_end {
                return Err(StreamError::invalid(format!(
                    "window end {:?} exceeds base stream end {:?}",
                    end, base_end
                )));
            }
        }
        Ok(())
    }
}

/// Position translation between a window and its base stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WindowMap<P1, P2> {
    pub(crate) offset: P1,
    pub(crate) size: Option<u64>,
    pub(crate) zero: P2,
    /// Bytes from the window start to the current position
    pub(crate) cursor: u64,
}

impl<P1: Position, P2: Position> WindowMap<P1, P2> {
    pub(crate) fn new(window: Window<P1>, zero: P2) -> Self {
        Self {
            offset: window.offset,
            size: window.size,
            zero,
            cursor: 0,
        }
    }

    pub(crate) fn logical_position(&self) -> Result<P2> {
        advance(self.zero, self.cursor)
    }

    /// Cursor for a logical position; positions before the window start are rejected.
    pub(crate) fn cursor_for(&self, position: P2) -> Result<u64> {
        if position < self.zero {
            return Err(StreamError::invalid(format!(
                "position {:?} precedes start of window {:?}",
                position, self.zero
            )));
        }
        distance(position, self.zero)
    }

    pub(crate) fn base_position(&self, cursor: u64) -> Result<P1> {
        advance(self.offset, cursor)
    }

    /// Window length given the base stream's current extent
    pub(crate) fn length(&self, base_start: P1, base_length: u64) -> Result<u64> {
        match self.size {
            Some(size) => Ok(size),
            None => {
                let base_end = advance(base_start, base_length)?;
                Ok(distance(base_end, self.offset).unwrap_or(0))
            }
        }
    }

    /// Largest request not crossing `limit`
    pub(crate) fn clip(&self, requested: usize, limit: u64) -> usize {
        let available = limit.saturating_sub(self.cursor);
        usize::try_from(available).map_or(requested, |a| a.min(requested))
    }

    pub(crate) fn check_seek(&self, cursor: u64, limit: Option<u64>) -> Result<()> {
        match limit {
            Some(limit) if cursor > limit => Err(StreamError::invalid(format!(
                "seek to {} bytes past window start, window holds {}",
                cursor, limit
            ))),
            _ => Ok(()),
        }
    }

    /// True when the window runs to the base end, so resizing it resizes the base
    pub(crate) fn ends_with_base(&self, base_start: P1, base_length: u64) -> Result<bool> {
        match self.size {
            Some(size) => Ok(advance(self.offset, size)? == advance(base_start, base_length)?),
            None => Ok(true),
        }
    }

    pub(crate) fn check_set_length(&self, length: u64) -> Result<()> {
        match self.size {
            Some(size) if length > size => Err(StreamError::invalid(format!(
                "length {} exceeds window size {}",
                length, size
            ))),
            _ => Ok(()),
        }
    }
}

/// Sequential input limited to `size` bytes of its base.
#[derive(Debug)]
pub struct PartialInput<S> {
    core: FilterCore<S>,
    remaining: u64,
}

impl<S: SequentialInput> PartialInput<S> {
    pub fn new(inner: S, size: u64, leave_open: bool) -> Self {
        Self {
            core: FilterCore::new(inner, leave_open),
            remaining: size,
        }
    }
}

impl<S> PartialInput<S> {
    /// Bytes left before the window end
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut u64)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.remaining))
    }

    pub(crate) fn core_mut(&mut self) -> &mut FilterCore<S> {
        &mut self.core
    }
}

pub(crate) fn clip_remaining(requested: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(requested, |r| r.min(requested))
}

impl<S: SequentialInput> Dispose for PartialInput<S> {
    fn dispose(&mut self) -> Result<()> {
        if self.core.begin_dispose().is_none() {
            return Ok(());
        }
        self.core.end_dispose()
    }
}

impl<S: SequentialInput> SequentialInput for PartialInput<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, remaining) = self.parts()?;
        let want = clip_remaining(buf.len(), *remaining);
        if want == 0 {
            return Ok(0);
        }
        let n = inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(StreamError::UnexpectedEndOfData);
        }
        *remaining -= n as u64;
        Ok(n)
    }
}

/// Sequential output accepting at most `size` bytes.
///
/// A write once the ceiling is reached fails with
/// [`StreamError::write_zero`].
#[derive(Debug)]
pub struct PartialOutput<S> {
    core: FilterCore<S>,
    remaining: u64,
}

impl<S: SequentialOutput> PartialOutput<S> {
    pub fn new(inner: S, size: u64, leave_open: bool) -> Self {
        Self {
            core: FilterCore::new(inner, leave_open),
            remaining: size,
        }
    }
}

impl<S> PartialOutput<S> {
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut u64)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.remaining))
    }

    pub(crate) fn core_mut(&mut self) -> &mut FilterCore<S> {
        &mut self.core
    }
}

impl<S: SequentialOutput> Dispose for PartialOutput<S> {
    fn dispose(&mut self) -> Result<()> {
        if self.core.begin_dispose().is_none() {
            return Ok(());
        }
        self.core.end_dispose()
    }
}

impl<S: SequentialOutput> SequentialOutput for PartialOutput<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, remaining) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let want = clip_remaining(buf.len(), *remaining);
        if want == 0 {
            return Err(StreamError::write_zero());
        }
        let n = inner.write(&buf[..want])?;
        *remaining -= n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.core.get()?.flush()
    }
}

/// Random-access input window over a base stream.
///
/// Positions run from `zero` (type `P2`) to `zero + window length`; the
/// base is addressed with `P1`.
#[derive(Debug)]
pub struct PartialRandomInput<S, P1 = u64, P2 = u64> {
    core: FilterCore<S>,
    map: WindowMap<P1, P2>,
}

impl<S: RandomInput<P1>, P1: Position, P2: Position> PartialRandomInput<S, P1, P2> {
    /// Expose `window` of `base` with logical positions starting at `zero`.
    ///
    /// Fails with `InvalidArgument` if the window does not fit inside the
    /// base stream; the base is disposed on failure unless `leave_open`.
    pub fn new(mut base: S, window: Window<P1>, zero: P2, leave_open: bool) -> Result<Self> {
        match prepare(&mut base, window) {
            Ok(()) => Ok(Self {
                core: FilterCore::new(base, leave_open),
                map: WindowMap::new(window, zero),
            }),
            Err(e) => Err(abandon(base, leave_open, e)),
        }
    }

    /// Window starting at the base stream's current position
    pub fn from_current(mut base: S, size: Option<u64>, zero: P2, leave_open: bool) -> Result<Self> {
        match base.position() {
            Ok(offset) => Self::new(base, Window::new(offset, size), zero, leave_open),
            Err(e) => Err(abandon(base, leave_open, e)),
        }
    }
}

fn prepare<S: RandomAccess<P>, P: Position>(base: &mut S, window: Window<P>) -> Result<()> {
    let length = base.length()?;
    window.validate(base.start_of_stream(), length)?;
    base.seek(window.offset)
}

impl<S, P1, P2> PartialRandomInput<S, P1, P2> {
    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut WindowMap<P1, P2>)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.map))
    }

    pub(crate) fn core_mut(&mut self) -> &mut FilterCore<S> {
        &mut self.core
    }

    pub(crate) fn from_parts(core: FilterCore<S>, map: WindowMap<P1, P2>) -> Self {
        Self { core, map }
    }
}

impl<S: RandomInput<P1>, P1: Position, P2: Position> Dispose for PartialRandomInput<S, P1, P2> {
    fn dispose(&mut self) -> Result<()> {
        if self.core.begin_dispose().is_none() {
            return Ok(());
        }
        self.core.end_dispose()
    }
}

impl<S: RandomInput<P1>, P1: Position, P2: Position> SequentialInput
    for PartialRandomInput<S, P1, P2>
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, map) = self.parts()?;
        let base_length = inner.length()?;
        let limit = map.length(inner.start_of_stream(), base_length)?;
        let want = map.clip(buf.len(), limit);
        if want == 0 {
            return Ok(0);
        }
        let n = inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(StreamError::UnexpectedEndOfData);
        }
        map.cursor += n as u64;
        Ok(n)
    }
}

impl<S, P1, P2: Position> StreamOrigin<P2> for PartialRandomInput<S, P1, P2> {
    fn start_of_stream(&self) -> P2 {
        self.map.zero
    }
}

impl<S: RandomInput<P1>, P1: Position, P2: Position> RandomAccess<P2>
    for PartialRandomInput<S, P1, P2>
{
    fn position(&mut self) -> Result<P2> {
        self.core.get()?;
        self.map.logical_position()
    }

    fn seek(&mut self, position: P2) -> Result<()> {
        let (inner, map) = self.parts()?;
        let cursor = map.cursor_for(position)?;
        let base_length = inner.length()?;
        map.check_seek(cursor, Some(map.length(inner.start_of_stream(), base_length)?))?;
        inner.seek(map.base_position(cursor)?)?;
        map.cursor = cursor;
        Ok(())
    }

    fn length(&mut self) -> Result<u64> {
        let (inner, map) = self.parts()?;
        let base_length = inner.length()?;
        map.length(inner.start_of_stream(), base_length)
    }
}

/// Random-access output window over a base stream.
///
/// A bounded window rejects writes past its end with
/// [`StreamError::write_zero`]; an unbounded one grows the base.
#[derive(Debug)]
pub struct PartialRandomOutput<S, P1 = u64, P2 = u64> {
    core: FilterCore<S>,
    map: WindowMap<P1, P2>,
}

impl<S: RandomOutput<P1>, P1: Position, P2: Position> PartialRandomOutput<S, P1, P2> {
    pub fn new(mut base: S, window: Window<P1>, zero: P2, leave_open: bool) -> Result<Self> {
        match prepare(&mut base, window) {
            Ok(()) => Ok(Self {
                core: FilterCore::new(base, leave_open),
                map: WindowMap::new(window, zero),
            }),
            Err(e) => Err(abandon(base, leave_open, e)),
        }
    }

    pub fn from_current(mut base: S, size: Option<u64>, zero: P2, leave_open: bool) -> Result<Self> {
        match base.position() {
            Ok(offset) => Self::new(base, Window::new(offset, size), zero, leave_open),
            Err(e) => Err(abandon(base, leave_open, e)),
        }
    }
}

impl<S, P1, P2> PartialRandomOutput<S, P1, P2> {
    pub fn into_inner(self) -> S {
        self.core.into_inner()
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut WindowMap<P1, P2>)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.map))
    }

    pub(crate) fn core_mut(&mut self) -> &mut FilterCore<S> {
        &mut self.core
    }

    pub(crate) fn from_parts(core: FilterCore<S>, map: WindowMap<P1, P2>) -> Self {
        Self { core, map }
    }
}

impl<S: RandomOutput<P1>, P1: Position, P2: Position> Dispose for PartialRandomOutput<S, P1, P2> {
    fn dispose(&mut self) -> Result<()> {
        if self.core.begin_dispose().is_none() {
            return Ok(());
        }
        self.core.end_dispose()
    }
}

impl<S: RandomOutput<P1>, P1: Position, P2: Position> SequentialOutput
    for PartialRandomOutput<S, P1, P2>
{
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, map) = self.parts()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let want = match map.size {
            Some(size) => map.clip(buf.len(), size),
            None => buf.len(),
        };
        if want == 0 {
            return Err(StreamError::write_zero());
        }
        let n = inner.write(&buf[..want])?;
        map.cursor += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.core.get()?.flush()
    }
}

impl<S, P1, P2: Position> StreamOrigin<P2> for PartialRandomOutput<S, P1, P2> {
    fn start_of_stream(&self) -> P2 {
        self.map.zero
    }
}

impl<S: RandomOutput<P1>, P1: Position, P2: Position> RandomAccess<P2>
    for PartialRandomOutput<S, P1, P2>
{
    fn position(&mut self) -> Result<P2> {
        self.core.get()?;
        self.map.logical_position()
    }

    fn seek(&mut self, position: P2) -> Result<()> {
        let (inner, map) = self.parts()?;
        let cursor = map.cursor_for(position)?;
        map.check_seek(cursor, map.size)?;
        inner.seek(map.base_position(cursor)?)?;
        map.cursor = cursor;
        Ok(())
    }

    fn length(&mut self) -> Result<u64> {
        let (inner, map) = self.parts()?;
        let base_length = inner.length()?;
        map.length(inner.start_of_stream(), base_length)
    }
}

impl<S: RandomOutput<P1>, P1: Position, P2: Position> RandomOutput<P2>
    for PartialRandomOutput<S, P1, P2>
{
    /// Resize the window.
    ///
    /// A bounded window shrinks to `length`; growing it past its size fails
    /// with `InvalidArgument`. The base is resized to `offset + length` only
    /// when the window runs to the base end. Base bytes past the end of a
    /// bounded window are left alone.
    fn set_length(&mut self, length: u64) -> Result<()> {
        let (inner, map) = self.parts()?;
        map.check_set_length(length)?;
        let start = inner.start_of_stream();
        let end = advance(map.offset, length)?;
        let base_length = inner.length()?;
        if map.ends_with_base(start, base_length)? {
            inner.set_length(distance(end, start)?)?;
        }
        if map.size.is_some() {
            map.size = Some(length);
        }
        if map.cursor > length {
            map.cursor = length;
            inner.seek(end)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStream;

    #[test]
    fn test_window_validation() {
        assert!(Window::bounded(2u64, 3).validate(0, 5).is_ok());
        assert!(Window::bounded(2u64, 4).validate(0, 5).is_err());
        assert!(Window::unbounded(5u64).validate(0, 5).is_ok());
        assert!(Window::unbounded(6u64).validate(0, 5).is_err());
        assert!(matches!(
            Window::bounded(3u64, u64::MAX).validate(0, 5),
            Err(StreamError::Overflow(_))
        ));
    }

    #[test]
    fn test_sequential_ceiling() {
        let mut input = PartialInput::new(MemoryStream::from_vec(b"abcdef".to_vec()), 4, false);
        let mut buf = [0u8; 10];
        assert_eq!(input.read(&mut buf).unwrap(), 4);
        assert_eq!(input.read(&mut buf).unwrap(), 0);
        assert_eq!(input.remaining(), 0);

        let mut output = PartialOutput::new(MemoryStream::new(), 3, false);
        assert_eq!(output.write(b"xyzw").unwrap(), 3);
        match output.write(b"w") {
            Err(StreamError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::WriteZero),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(output.into_inner().as_slice(), b"xyz");
    }

    #[test]
    fn test_sequential_early_end_of_data() {
        let mut input = PartialInput::new(MemoryStream::from_vec(b"ab".to_vec()), 4, false);
        let mut buf = [0u8; 4];
        assert_eq!(input.read(&mut buf).unwrap(), 2);
        assert!(matches!(input.read(&mut buf), Err(StreamError::UnexpectedEndOfData)));
    }

    #[test]
    fn test_random_input_translates_positions() {
        let base = MemoryStream::from_vec((0u8..100).collect());
        let mut window = PartialRandomInput::new(base, Window::bounded(10u64, 20), 1000u64, false).unwrap();
        assert_eq!(window.start_of_stream(), 1000);
        assert_eq!(window.length().unwrap(), 20);
        window.seek(1015).unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(window.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[25, 26, 27, 28, 29]);
        assert_eq!(window.position().unwrap(), 1020);
        assert!(matches!(window.seek(1021), Err(StreamError::InvalidArgument(_))));
        assert!(matches!(window.seek(999), Err(StreamError::InvalidArgument(_))));
    }

    #[test]
    fn test_failed_construction_disposes_base() {
        let mut base = MemoryStream::from_vec(vec![0u8; 4]);
        let err = PartialRandomInput::<_, u64, u64>::new(&mut base, Window::bounded(2, 8), 0, false)
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument(_)));
        assert!(base.is_disposed());

        let mut base = MemoryStream::from_vec(vec![0u8; 4]);
        assert!(PartialRandomInput::<_, u64, u64>::new(&mut base, Window::bounded(2, 8), 0, true).is_err());
        assert!(!base.is_disposed());
    }

    #[test]
    fn test_random_output_bounded_and_set_length() {
        let mut base = MemoryStream::from_vec(b"........".to_vec());
        {
            let mut window =
                PartialRandomOutput::<_, u64, u64>::new(&mut base, Window::bounded(2, 4), 0, true).unwrap();
            assert_eq!(window.write(b"WXYZQ").unwrap(), 4);
            assert!(window.write(b"Q").is_err());
            window.set_length(3).unwrap();
            assert_eq!(window.length().unwrap(), 3);
            assert_eq!(window.position().unwrap(), 3);
            assert!(matches!(window.set_length(4), Err(StreamError::InvalidArgument(_))));
            window.dispose().unwrap();
        }
        assert_eq!(base.as_slice(), b"..WXYZ..");
    }

    #[test]
    fn test_shrinking_window_at_base_end_truncates_base() {
        let mut base = MemoryStream::from_vec(b"..WXYZ".to_vec());
        {
            let mut window =
                PartialRandomOutput::<_, u64, u64>::new(&mut base, Window::bounded(2, 4), 0, true).unwrap();
            window.set_length(1).unwrap();
            assert_eq!(window.length().unwrap(), 1);
        }
        assert_eq!(base.as_slice(), b"..W");
    }

    #[test]
    fn test_unbounded_output_grows_base() {
        let base = MemoryStream::from_vec(b"head".to_vec());
        let mut window =
            PartialRandomOutput::<_, u64, u64>::new(base, Window::unbounded(4), 0, false).unwrap();
        window.write(b"tail").unwrap();
        assert_eq!(window.length().unwrap(), 4);
        assert_eq!(window.into_inner().as_slice(), b"headtail");
    }
}
