//! Transfer Scheduler: admits items to the upload capability under a concurrency policy and
//! forwards every completed item to the sink.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::any::Any;
use std::fs::File;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;

use crate::error::ItemError;
use crate::upload::{SseCustomerKey, UploadError, UploadRequest, Uploader};
use crate::utils::config::WorkerLimits;
use crate::{ConcurrencyPolicy, ItemDescriptor, Opts, SchedulerStats};

/// Count of transfers currently running, with a wait-until-zero barrier.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    in_flight: Mutex<usize>,
    idle: Condvar,
    peak: AtomicUsize,
}

impl CompletionTracker {
    fn count(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> InFlight<'_> {
        let mut n = self.count();
        *n += 1;
        self.peak.fetch_max(*n, Ordering::Relaxed);
        InFlight(self)
    }

    fn finish(&self) {
        let mut n = self.count();
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until every begun transfer has finished.
    pub fn wait_idle(&self) {
        let mut n = self.count();
        while *n > 0 {
            n = self.idle.wait(n).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

/// Marks one transfer as running; finishing happens on drop, so a panicking transfer still
/// releases the barrier.
struct InFlight<'a>(&'a CompletionTracker);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Shared per-run state: counters and the first fatal upload error.
#[derive(Default)]
struct RunState {
    admitted: AtomicUsize,
    passed_through: AtomicUsize,
    fatal: OnceLock<String>,
}

impl RunState {
    fn aborted(&self) -> bool {
        self.fatal.get().is_some()
    }

    fn note_fatal(&self, item: &ItemDescriptor) {
        if let Some(ItemError::Transfer {
            source: UploadError::Misconfigured(msg),
            ..
        }) = &item.failure
            && self.fatal.set(msg.clone()).is_ok()
        {
            warn!("upload capability is unusable, no further transfers will be admitted");
        }
    }
}

pub struct Scheduler {
    uploader: Option<Arc<dyn Uploader>>,
    workers: usize,
    policy: ConcurrencyPolicy,
    dry_run: bool,
    sse: Option<SseCustomerKey>,
    tracker: Arc<CompletionTracker>,
}

impl Scheduler {
    /// Scheduler with `workers` concurrent transfers (clamped to the allowed range), lockstep
    /// burst policy, no uploader yet.
    pub fn new(workers: usize) -> Self {
        Self {
            uploader: None,
            workers: workers.clamp(WorkerLimits::MIN, WorkerLimits::MAX),
            policy: ConcurrencyPolicy::default(),
            dry_run: false,
            sse: None,
            tracker: Arc::new(CompletionTracker::default()),
        }
    }

    /// Policy, dry-run and encryption from `opts`. The uploader is attached separately.
    pub fn from_opts(opts: &Opts) -> Self {
        Self::new(opts.workers)
            .policy(opts.policy)
            .dry_run(opts.dry_run)
            .encryption(opts.sse.clone())
    }

    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn encryption(mut self, sse: Option<SseCustomerKey>) -> Self {
        self.sse = sse;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    /// Consume `items` until the channel closes (or a fatal upload error), sending every
    /// admitted or already-failed item to `completed` exactly once. Returns the fatal error, if
    /// any, after all in-flight transfers have been forwarded.
    pub fn run(
        &self,
        items: Receiver<ItemDescriptor>,
        completed: Sender<ItemDescriptor>,
    ) -> Result<SchedulerStats, UploadError> {
        if !self.dry_run && self.uploader.is_none() {
            return Err(UploadError::Misconfigured(
                "no upload target configured".to_string(),
            ));
        }
        let state = RunState::default();
        let barriers = match self.policy {
            ConcurrencyPolicy::LockstepBurst => self.run_lockstep(&items, &completed, &state),
            ConcurrencyPolicy::SteadyPool => {
                self.run_pool(&items, &completed, &state);
                0
            }
        };
        let stats = SchedulerStats {
            admitted: state.admitted.load(Ordering::Relaxed),
            passed_through: state.passed_through.load(Ordering::Relaxed),
            peak_in_flight: self.tracker.peak(),
            barriers,
        };
        debug!("scheduler: input closed, {:?}", stats);
        match state.fatal.into_inner() {
            Some(msg) => Err(UploadError::Misconfigured(msg)),
            None => Ok(stats),
        }
    }

    /// Up to N transfers per burst. After the Nth dispatch, wait until all have finished before
    /// taking another item, so nothing is held back from the sink when the run aborts.
    fn run_lockstep(
        &self,
        items: &Receiver<ItemDescriptor>,
        completed: &Sender<ItemDescriptor>,
        state: &RunState,
    ) -> usize {
        let mut barriers = 0;
        thread::scope(|s| {
            let mut in_burst = 0;
            while !state.aborted() {
                if in_burst == self.workers {
                    debug!("burst of {} dispatched, waiting for completion", in_burst);
                    self.tracker.wait_idle();
                    barriers += 1;
                    in_burst = 0;
                    continue;
                }
                let Ok(item) = items.recv() else { break };
                if let Some(item) = self.pass_through(item, completed, state) {
                    in_burst += 1;
                    state.admitted.fetch_add(1, Ordering::Relaxed);
                    let guard = self.tracker.begin();
                    let completed = completed.clone();
                    s.spawn(move || {
                        let _guard = guard;
                        let item = self.transfer(item);
                        state.note_fatal(&item);
                        let _ = completed.send(item);
                    });
                }
            }
        });
        barriers
    }

    /// N long-lived workers pulling from the shared input.
    fn run_pool(
        &self,
        items: &Receiver<ItemDescriptor>,
        completed: &Sender<ItemDescriptor>,
        state: &RunState,
    ) {
        thread::scope(|s| {
            for _ in 0..self.workers {
                s.spawn(|| {
                    while !state.aborted() {
                        let Ok(item) = items.recv() else { break };
                        if let Some(item) = self.pass_through(item, completed, state) {
                            state.admitted.fetch_add(1, Ordering::Relaxed);
                            let _guard = self.tracker.begin();
                            let item = self.transfer(item);
                            state.note_fatal(&item);
                            let _ = completed.send(item);
                        }
                    }
                });
            }
        });
    }

    /// Forward items that need no transfer: already-failed items, and everything in dry-run.
    /// Returns the item back when it must be uploaded.
    fn pass_through(
        &self,
        item: ItemDescriptor,
        completed: &Sender<ItemDescriptor>,
        state: &RunState,
    ) -> Option<ItemDescriptor> {
        if item.is_failed() {
            state.passed_through.fetch_add(1, Ordering::Relaxed);
        } else if self.dry_run {
            debug!("dry run: would upload {}", item.source_path.display());
            state.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            return Some(item);
        }
        let _ = completed.send(item);
        None
    }

    /// Open the source and hand it to the uploader. Failures (including a panic inside the
    /// uploader) are attached to the item.
    fn transfer(&self, mut item: ItemDescriptor) -> ItemDescriptor {
        let Some(uploader) = self.uploader.as_deref() else {
            return item;
        };
        let body = match File::open(&item.source_path) {
            Ok(f) => f,
            Err(source) => {
                item.failure = Some(ItemError::Open {
                    path: item.source_path.clone(),
                    source,
                });
                return item;
            }
        };
        let request = UploadRequest {
            body,
            key: &item.destination_key,
            size_hint: item.byte_size,
            encryption: self.sse.as_ref(),
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| uploader.upload(request)))
            .unwrap_or_else(|payload| {
                Err(UploadError::Rejected(format!(
                    "upload panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        match outcome {
            Ok(location) => {
                info!(
                    "successfully uploaded {} to {}",
                    item.source_path.display(),
                    location
                );
            }
            Err(source) => {
                warn!("upload of {} failed: {}", item.source_path.display(), source);
                item.failure = Some(ItemError::Transfer {
                    path: item.source_path.clone(),
                    source,
                });
            }
        }
        item
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
