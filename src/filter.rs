//! Lifecycle plumbing shared by every filter
//!
//! A filter owns its inner stream by value. Passing `&mut stream` instead
//! lends it, and `leave_open` keeps disposal from reaching it: the filter
//! tears itself down and hands the stream back through `into_inner`.

use crate::error::{Result, StreamError};
use crate::stream::Dispose;

#[cfg(feature = "async")]
use crate::async_stream::AsyncDispose;

#[derive(Debug)]
pub(crate) struct FilterCore<S> {
    inner: S,
    leave_open: bool,
    disposed: bool,
}

impl<S> FilterCore<S> {
    pub(crate) fn new(inner: S, leave_open: bool) -> Self {
        Self {
            inner,
            leave_open,
            disposed: false,
        }
    }

    /// The inner stream, or `Disposed` once the filter has been torn down
    pub(crate) fn get(&mut self) -> Result<&mut S> {
        if self.disposed {
            Err(StreamError::Disposed)
        } else {
            Ok(&mut self.inner)
        }
    }

    pub(crate) fn get_ref(&self) -> &S {
        &self.inner
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn leaves_open(&self) -> bool {
        self.leave_open
    }

    /// Flag the filter disposed.
    ///
    /// Returns the inner stream for filter-specific teardown on the first
    /// call only; later calls get `None` and must do nothing.
    pub(crate) fn begin_dispose(&mut self) -> Option<&mut S> {
        if self.disposed {
            return None;
        }
        self.disposed = true;
        Some(&mut self.inner)
    }

    pub(crate) fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Dispose> FilterCore<S> {
    /// Dispose the inner stream unless it was left open.
    pub(crate) fn end_dispose(&mut self) -> Result<()> {
        if self.leave_open {
            Ok(())
        } else {
            self.inner.dispose()
        }
    }
}

#[cfg(feature = "async")]
impl<S: AsyncDispose> FilterCore<S> {
    pub(crate) async fn end_dispose_async(&mut self) -> Result<()> {
        if self.leave_open {
            Ok(())
        } else {
            self.inner.dispose_async().await
        }
    }
}

/// Release a base stream a failed constructor had taken over, then hand
/// back the construction error.
pub(crate) fn abandon<S: Dispose>(mut inner: S, leave_open: bool, err: StreamError) -> StreamError {
    if !leave_open {
        if let Err(dispose_err) = inner.dispose() {
            tracing::warn!(error = %dispose_err, "disposing base stream after failed construction");
        }
    }
    err
}

#[cfg(feature = "async")]
pub(crate) async fn abandon_async<S: AsyncDispose>(
    mut inner: S,
    leave_open: bool,
    err: StreamError,
) -> StreamError {
    if !leave_open {
        if let Err(dispose_err) = inner.dispose_async().await {
            tracing::warn!(error = %dispose_err, "disposing base stream after failed construction");
        }
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStream;

    #[test]
    fn test_begin_dispose_only_once() {
        let mut core = FilterCore::new(MemoryStream::new(), false);
        assert!(core.get().is_ok());
        assert!(core.begin_dispose().is_some());
        assert!(core.begin_dispose().is_none());
        assert!(matches!(core.get(), Err(StreamError::Disposed)));
        core.end_dispose().unwrap();
        assert!(core.into_inner().is_disposed());
    }

    #[test]
    fn test_leave_open_keeps_inner_alive() {
        let mut core = FilterCore::new(MemoryStream::new(), true);
        core.begin_dispose();
        core.end_dispose().unwrap();
        assert!(!core.get_ref().is_disposed());
    }

    #[test]
    fn test_abandon_disposes_unless_left_open() {
        let mut base = MemoryStream::new();
        let err = abandon(&mut base, true, StreamError::invalid("bad"));
        assert!(matches!(err, StreamError::InvalidArgument(_)));
        assert!(!base.is_disposed());
        abandon(&mut base, false, StreamError::invalid("bad"));
        assert!(base.is_disposed());
    }
}
