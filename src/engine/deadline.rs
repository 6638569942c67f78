//! Request deadlines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AnalysisError;

/// Point after which a request stops reading frames.
///
/// A deadline fires either when its instant passes or when its abort flag
/// is raised. It is checked before each frame is read, so a frame already
/// being processed is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    abort: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// A deadline that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fires once `timeout` has elapsed from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            abort: None,
        }
    }

    /// Fires at `instant`.
    pub fn at(instant: Instant) -> Self {
        Self {
            at: Some(instant),
            abort: None,
        }
    }

    /// `after(timeout)` when a timeout is configured, otherwise `none()`.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map(Self::after).unwrap_or_default()
    }

    /// Also fires as soon as `flag` is set.
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    /// True once the clock has passed the limit or the abort flag is set.
    pub fn is_expired(&self) -> bool {
        let aborted = self
            .abort
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst));
        aborted || self.at.map_or(false, |at| Instant::now() >= at)
    }

    /// Fails with `MediaTimeout` once the deadline has fired.
    pub fn check(&self, frames: u64) -> Result<(), AnalysisError> {
        if self.is_expired() {
            tracing::warn!(frames, "deadline reached, request aborted");
            return Err(AnalysisError::MediaTimeout { frames });
        }
        Ok(())
    }
}
