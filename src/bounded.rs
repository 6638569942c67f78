//! Per-frame time budget for blocking face capabilities.
//!
//! Landmark models and face analyzers are synchronous and may hang. A
//! [`TimeLimited`] runs one on a worker thread and bounds every call; a call
//! that overruns degrades only its own frame.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::landmarks::CapabilityError;
use crate::media::Frame;

/// Jobs a worker may hold before new calls are turned away.
const QUEUE_DEPTH: usize = 4;

/// Workers allowed to exist at once, including stalled ones still
/// finishing an abandoned call.
const MAX_WORKERS: usize = 4;

type Call<T> = dyn Fn(&Frame) -> Result<T, CapabilityError> + Send + Sync;

struct Job<T> {
    frame: Frame,
    reply: SyncSender<Result<T, CapabilityError>>,
    /// The caller stops waiting at this instant.
    expires: Option<Instant>,
}

impl<T> Job<T> {
    fn is_stale(&self) -> bool {
        self.expires.is_some_and(|at| Instant::now() >= at)
    }
}

struct Slot<T> {
    /// `None` once the capability has been declared unavailable.
    tx: Option<SyncSender<Job<T>>>,
    generation: u64,
}

/// Decrements the live-worker count when a worker thread ends, panics included.
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs a blocking capability on a worker thread and bounds every call.
///
/// - A call that exceeds the budget returns [`CapabilityError::Timeout`].
///   The stalled worker is abandoned to finish on its own and later calls
///   go to a fresh one, so a single slow frame does not delay the next.
/// - Jobs whose caller has already given up are skipped, never run.
/// - If the backend panics, every later call reports
///   [`CapabilityError::Unavailable`].
///
/// `T` is the capability's per-frame answer; see
/// [`TimeLimited::extractor`] and [`TimeLimited::analyzer`].
pub struct TimeLimited<T> {
    name: &'static str,
    call: Arc<Call<T>>,
    slot: Mutex<Slot<T>>,
    live_workers: Arc<AtomicUsize>,
    timeout: Duration,
}

impl<T: Send + 'static> TimeLimited<T> {
    /// Starts a worker thread named `name` that answers with `call`.
    pub fn spawn<F>(name: &'static str, timeout: Duration, call: F) -> Result<Self, CapabilityError>
    where
        F: Fn(&Frame) -> Result<T, CapabilityError> + Send + Sync + 'static,
    {
        let call: Arc<Call<T>> = Arc::new(call);
        let live_workers = Arc::new(AtomicUsize::new(0));
        let tx = start_worker(name, &call, &live_workers)?;

        Ok(Self {
            name,
            call,
            slot: Mutex::new(Slot {
                tx: Some(tx),
                generation: 0,
            }),
            live_workers,
            timeout,
        })
    }

    /// Returns the per-frame budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Worker threads currently alive, stalled ones included.
    pub fn active_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Runs the capability on `frame` within the budget.
    pub fn call(&self, frame: &Frame) -> Result<T, CapabilityError> {
        let sequence = frame.sequence();
        let (tx, generation) = {
            let slot = self.lock();
            match &slot.tx {
                Some(tx) => (tx.clone(), slot.generation),
                None => return Err(self.unavailable()),
            }
        };

        let expires = Instant::now().checked_add(self.timeout);
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job = Job {
            frame: frame.clone(),
            reply: reply_tx,
            expires,
        };

        match tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(sequence, worker = self.name, "worker backlog full, frame skipped");
                return Err(CapabilityError::Timeout { sequence });
            }
            Err(TrySendError::Disconnected(_)) => {
                self.mark_dead(generation);
                return Err(self.unavailable());
            }
        }

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    sequence,
                    worker = self.name,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "capability call timed out"
                );
                self.replace_stalled(generation);
                Err(CapabilityError::Timeout { sequence })
            }
            // The worker dropped a job it found already expired.
            Err(RecvTimeoutError::Disconnected) if expires.is_some_and(|at| Instant::now() >= at) => {
                Err(CapabilityError::Timeout { sequence })
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!(sequence, worker = self.name, "capability worker died");
                self.mark_dead(generation);
                Err(self.unavailable())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unavailable(&self) -> CapabilityError {
        CapabilityError::Unavailable(format!("{} exited", self.name))
    }

    fn mark_dead(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.tx = None;
        }
    }

    /// Swaps in a fresh worker unless another caller already did, or too
    /// many stalled workers are still running.
    fn replace_stalled(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.generation != generation || slot.tx.is_none() {
            return;
        }
        if self.active_workers() >= MAX_WORKERS {
            tracing::warn!(worker = self.name, "too many stalled workers, keeping current one");
            return;
        }

        match start_worker(self.name, &self.call, &self.live_workers) {
            Ok(tx) => {
                slot.tx = Some(tx);
                slot.generation += 1;
                tracing::debug!(worker = self.name, generation = slot.generation, "stalled worker replaced");
            }
            Err(e) => tracing::warn!(worker = self.name, error = %e, "cannot replace stalled worker"),
        }
    }
}

fn start_worker<T: Send + 'static>(
    name: &'static str,
    call: &Arc<Call<T>>,
    live_workers: &Arc<AtomicUsize>,
) -> Result<SyncSender<Job<T>>, CapabilityError> {
    let (tx, rx) = mpsc::sync_channel::<Job<T>>(QUEUE_DEPTH);
    let call = Arc::clone(call);
    let live = LiveWorker::enter(live_workers);

    std::thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let _live = live;
            tracing::debug!(worker = name, "capability worker started");
            while let Ok(job) = rx.recv() {
                if job.is_stale() {
                    tracing::trace!(sequence = job.frame.sequence(), "stale job skipped");
                    continue;
                }
                let result = (*call)(&job.frame);
                // The caller may have given up on this frame already.
                let _ = job.reply.send(result);
            }
            tracing::debug!(worker = name, "capability worker exiting");
        })
        .map_err(|e| CapabilityError::Unavailable(format!("cannot start {name}: {e}")))?;

    Ok(tx)
}

impl<T> std::fmt::Debug for TimeLimited<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLimited")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("live_workers", &self.live_workers.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
