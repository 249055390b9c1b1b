//! Progress counting and callback plumbing shared by the filters

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Progress callback receiving a monotonically increasing byte total
pub type ProgressFn = Box<dyn FnMut(u64) + Send>;

/// Run an instrumentation callback, swallowing any panic it raises.
///
/// Callbacks observe the I/O path; they never get to change its outcome.
pub(crate) fn invoke_guarded<F: FnOnce()>(callback: &'static str, f: F) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(callback, "stream callback panicked, ignoring");
    }
}

/// Running byte total with an optional report destination.
pub struct ProgressCounter {
    value: u64,
    report: Option<ProgressFn>,
}

impl ProgressCounter {
    pub fn new(report: Option<ProgressFn>) -> Self {
        Self { value: 0, report }
    }

    /// A counter that never reports
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn add(&mut self, bytes: u64) {
        self.value = self.value.saturating_add(bytes);
    }

    pub fn increment(&mut self) {
        self.add(1);
    }

    /// Send the current total to the callback, if any.
    pub fn report(&mut self) {
        let value = self.value;
        if let Some(report) = self.report.as_mut() {
            invoke_guarded("progress", || report(value));
        }
    }
}

impl std::fmt::Debug for ProgressCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCounter")
            .field("value", &self.value)
            .field("reports", &self.report.is_some())
            .finish()
    }
}

/// Shared slot that receives a value when a filter finishes.
///
/// Cloning shares the slot, so one clone can be moved into a completion
/// callback while the other is read afterwards.
#[derive(Debug)]
pub struct ResultHolder<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for ResultHolder<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ResultHolder<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Clone> ResultHolder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(value);
    }

    /// The stored value, or `None` if nothing has completed yet
    pub fn get(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_reports_running_total() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut counter = ProgressCounter::new(Some(Box::new(move |v| sink.lock().unwrap().push(v))));
        counter.report();
        counter.add(10);
        counter.increment();
        counter.report();
        assert_eq!(counter.value(), 11);
        assert_eq!(*seen.lock().unwrap(), vec![0, 11]);
    }

    #[test]
    fn test_panicking_callback_is_swallowed() {
        let mut counter = ProgressCounter::new(Some(Box::new(|_| panic!("boom"))));
        counter.add(3);
        counter.report();
        assert_eq!(counter.value(), 3);
    }

    #[test]
    fn test_result_holder_shares_slot() {
        let holder = ResultHolder::<(u32, u64)>::new();
        let writer = holder.clone();
        assert_eq!(holder.get(), None);
        writer.set((7, 8));
        assert_eq!(holder.get(), Some((7, 8)));
    }
}
