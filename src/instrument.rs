//! Instrumentation filters
//!
//! An [`ObservedInput`] or [`ObservedOutput`] passes bytes through unchanged
//! and shows every transferred chunk to an [`Observer`]. The observers
//! shipped here compute a CRC ([`CrcObserver`]), report progress
//! ([`ProgressObserver`]), or run an action with the final byte count
//! ([`EndActionObserver`]).
//!
//! An observer's end hook runs exactly once, after the inner stream has been
//! torn down, whether teardown succeeded or not. Dropping an undisposed
//! filter runs it too. Panics raised by user callbacks are caught and logged;
//! they never replace the outcome of the I/O call.
//!
//! ```
//! use s_zip_io::{Crc32, CrcObserver, MemoryStream, ObservedOutput, ResultHolder};
//! use s_zip_io::{Dispose, SequentialOutput};
//!
//! let crc = ResultHolder::new();
//! let sink = crc.clone();
//! let observer = CrcObserver::new(Crc32::new(), Some(Box::new(move |c, n| sink.set((c, n)))));
//! let mut output = ObservedOutput::new(MemoryStream::new(), observer, false);
//! output.write(b"123456789")?;
//! output.dispose()?;
//! assert_eq!(crc.get(), Some((0xCBF4_3926, 9)));
//! # Ok::<(), s_zip_io::StreamError>(())
//! ```

use crate::crc::{Crc24, Crc32, CrcSession};
use crate::error::Result;
use crate::filter::FilterCore;
use crate::progress::{invoke_guarded, ProgressCounter, ProgressFn};
use crate::stream::{Dispose, SequentialInput, SequentialOutput};

/// CRC completion callback receiving `(checksum, length)`
pub type CrcCallback = Box<dyn FnOnce(u32, u64) + Send>;

/// Action receiving the final byte count
pub type EndAction = Box<dyn FnOnce(u64) + Send>;

/// Hook into the bytes flowing through an instrumentation filter.
pub trait Observer {
    /// Called once when the filter is created.
    fn on_start(&mut self) {}

    /// Called with every chunk that actually passed through.
    fn on_transfer(&mut self, data: &[u8]);

    /// Called once after the inner stream has been torn down.
    fn on_end(&mut self);
}

/// Runs the end hook exactly once, on `finish` or on drop.
#[derive(Debug)]
pub(crate) struct ObserverSlot<O: Observer> {
    observer: O,
    ended: bool,
}

impl<O: Observer> ObserverSlot<O> {
    fn new(mut observer: O) -> Self {
        observer.on_start();
        Self {
            observer,
            ended: false,
        }
    }

    pub(crate) fn transfer(&mut self, data: &[u8]) {
        if !data.is_empty() {
            self.observer.on_transfer(data);
        }
    }

    pub(crate) fn finish(&mut self) {
        if !self.ended {
            self.ended = true;
            self.observer.on_end();
        }
    }
}

impl<O: Observer> Drop for ObserverSlot<O> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Sequential input reporting its traffic to an observer.
#[derive(Debug)]
pub struct ObservedInput<S, O: Observer> {
    // Declared first: on drop the inner stream goes before the end hook runs.
    core: FilterCore<S>,
    slot: ObserverSlot<O>,
}

impl<S, O: Observer> ObservedInput<S, O> {
    pub fn new(inner: S, observer: O, leave_open: bool) -> Self {
        Self {
            core: FilterCore::new(inner, leave_open),
            slot: ObserverSlot::new(observer),
        }
    }

    pub fn observer(&self) -> &O {
        &self.slot.observer
    }

    /// Hand back the inner stream; the end hook runs now if it has not yet.
    pub fn into_inner(self) -> S {
        let Self { core, mut slot } = self;
        let inner = core.into_inner();
        slot.finish();
        inner
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut ObserverSlot<O>)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.slot))
    }

    pub(crate) fn teardown_parts(&mut self) -> Option<(&mut FilterCore<S>, &mut ObserverSlot<O>)> {
        self.core.begin_dispose()?;
        Some((&mut self.core, &mut self.slot))
    }
}

impl<S: SequentialInput, O: Observer> Dispose for ObservedInput<S, O> {
    fn dispose(&mut self) -> Result<()> {
        let Some((core, slot)) = self.teardown_parts() else {
            return Ok(());
        };
        let released = core.end_dispose();
        slot.finish();
        released
    }
}

impl<S: SequentialInput, O: Observer> SequentialInput for ObservedInput<S, O> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (inner, slot) = self.parts()?;
        let n = inner.read(buf)?;
        slot.transfer(&buf[..n]);
        Ok(n)
    }
}

/// Sequential output reporting its traffic to an observer.
#[derive(Debug)]
pub struct ObservedOutput<S, O: Observer> {
    core: FilterCore<S>,
    slot: ObserverSlot<O>,
}

impl<S, O: Observer> ObservedOutput<S, O> {
    pub fn new(inner: S, observer: O, leave_open: bool) -> Self {
        Self {
            core: FilterCore::new(inner, leave_open),
            slot: ObserverSlot::new(observer),
        }
    }

    pub fn observer(&self) -> &O {
        &self.slot.observer
    }

    /// Hand back the inner stream; the end hook runs now if it has not yet.
    pub fn into_inner(self) -> S {
        let Self { core, mut slot } = self;
        let inner = core.into_inner();
        slot.finish();
        inner
    }

    pub(crate) fn parts(&mut self) -> Result<(&mut S, &mut ObserverSlot<O>)> {
        let inner = self.core.get()?;
        Ok((inner, &mut self.slot))
    }

    pub(crate) fn teardown_parts(&mut self) -> Option<(&mut FilterCore<S>, &mut ObserverSlot<O>)> {
        self.core.begin_dispose()?;
        Some((&mut self.core, &mut self.slot))
    }
}

impl<S: SequentialOutput, O: Observer> Dispose for ObservedOutput<S, O> {
    fn dispose(&mut self) -> Result<()> {
        let Some((core, slot)) = self.teardown_parts() else {
            return Ok(());
        };
        let released = core.end_dispose();
        slot.finish();
        released
    }
}

impl<S: SequentialOutput, O: Observer> SequentialOutput for ObservedOutput<S, O> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (inner, slot) = self.parts()?;
        let n = inner.write(buf)?;
        slot.transfer(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.parts()?.0.flush()
    }
}

/// Feeds every byte into a CRC session and reports the result at the end.
pub struct CrcObserver<C> {
    session: C,
    on_complete: Option<CrcCallback>,
}

impl<C: CrcSession> CrcObserver<C> {
    pub fn new(session: C, on_complete: Option<CrcCallback>) -> Self {
        Self {
            session,
            on_complete,
        }
    }

    /// `(checksum, length)` of the bytes seen so far
    pub fn result(&self) -> (u32, u64) {
        self.session.result()
    }
}

impl<C: CrcSession> Observer for CrcObserver<C> {
    fn on_transfer(&mut self, data: &[u8]) {
        self.session.put(data);
    }

    fn on_end(&mut self) {
        if let Some(callback) = self.on_complete.take() {
            let (crc, length) = self.session.result();
            invoke_guarded("crc", || callback(crc, length));
        }
    }
}

impl<C> std::fmt::Debug for CrcObserver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrcObserver")
            .field("pending_callback", &self.on_complete.is_some())
            .finish()
    }
}

/// Reports 0 at the start, the running total after every transfer, and the
/// final total at the end.
#[derive(Debug)]
pub struct ProgressObserver {
    counter: ProgressCounter,
}

impl ProgressObserver {
    pub fn new(report: ProgressFn) -> Self {
        Self {
            counter: ProgressCounter::new(Some(report)),
        }
    }

    pub fn total(&self) -> u64 {
        self.counter.value()
    }
}

impl Observer for ProgressObserver {
    fn on_start(&mut self) {
        self.counter.report();
    }

    fn on_transfer(&mut self, data: &[u8]) {
        self.counter.add(data.len() as u64);
        self.counter.report();
    }

    fn on_end(&mut self) {
        self.counter.report();
    }
}

/// Runs an action with the final byte count, exactly once.
pub struct EndActionObserver {
    total: u64,
    action: Option<EndAction>,
}

impl EndActionObserver {
    pub fn new(action: EndAction) -> Self {
        Self {
            total: 0,
            action: Some(action),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Observer for EndActionObserver {
    fn on_transfer(&mut self, data: &[u8]) {
        self.total = self.total.saturating_add(data.len() as u64);
    }

    fn on_end(&mut self) {
        if let Some(action) = self.action.take() {
            let total = self.total;
            invoke_guarded("end_action", || action(total));
        }
    }
}

impl std::fmt::Debug for EndActionObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndActionObserver")
            .field("total", &self.total)
            .field("pending_action", &self.action.is_some())
            .finish()
    }
}

pub type CrcInput<S, C = Crc32> = ObservedInput<S, CrcObserver<C>>;
pub type CrcOutput<S, C = Crc32> = ObservedOutput<S, CrcObserver<C>>;
pub type Crc24Input<S> = CrcInput<S, Crc24>;
pub type Crc24Output<S> = CrcOutput<S, Crc24>;
pub type ProgressInput<S> = ObservedInput<S, ProgressObserver>;
pub type ProgressOutput<S> = ObservedOutput<S, ProgressObserver>;
pub type EndActionInput<S> = ObservedInput<S, EndActionObserver>;
pub type EndActionOutput<S> = ObservedOutput<S, EndActionObserver>;
