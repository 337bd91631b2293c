//! A cooperative executor that runs every job on one dedicated thread.
//!
//! Jobs go into a FIFO queue behind a mutex, a condition variable wakes the
//! worker, and the worker runs each job to the end before taking the next.
//! Handed to a driver as its trampoline, it makes every resumption of a
//! coroutine chain run on the same thread, one at a time.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;
use std::thread::ThreadId;

use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::dispatch::Dispatch;
use crate::dispatch::Job;
use crate::dispatch::Trampoline;
use crate::error::Panicked;

/// Construction-time settings of a [`Scheduler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Stack size of the worker thread, or the platform default.
    pub stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            thread_name: "corun-scheduler".to_owned(),
            stack_size: None,
        }
    }
}

/// Where a [`Scheduler`] is in its life.
///
/// `Created → Idle → Running → Idle → … → Stopping → Stopped`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not started yet. Jobs can be queued but nothing runs them.
    Created,
    /// The worker is waiting for jobs.
    Idle,
    /// The worker is draining the queue.
    Running,
    /// A stop has been requested and the worker has not exited yet.
    Stopping,
    /// The worker has exited, or the scheduler was disposed unstarted.
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler was already started")]
    AlreadyStarted,
    #[error("scheduler is stopping or stopped")]
    Stopped,
    #[error("could not spawn the scheduler worker thread")]
    Spawn(#[source] io::Error),
}

/// Identifies a queued job, for [`Scheduler::dequeue()`] and
/// [`Scheduler::run_inline()`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

struct Queue {
    jobs: VecDeque<(JobId, Job)>,
    next_id: u64,
    phase: Phase,
    stop_requested: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    /// Wakes the worker when a job arrives or a stop is requested, and wakes
    /// `dispose()` when the worker acknowledges the stop.
    signal: Condvar,
    worker: OnceLock<ThreadId>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, job: Job) -> Result<JobId, SchedulerError> {
        let mut queue = self.lock();
        if queue.stop_requested {
            return Err(SchedulerError::Stopped);
        }
        let id = JobId(queue.next_id);
        queue.next_id += 1;
        queue.jobs.push_back((id, job));
        trace!(?id, queued = queue.jobs.len(), "job queued");
        self.signal.notify_all();
        Ok(id)
    }

    fn is_worker_thread(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }

    fn work(&self) {
        let _ = self.worker.set(thread::current().id());
        debug!("scheduler worker started");
        let mut queue = self.lock();
        loop {
            if queue.stop_requested {
                break;
            }
            match queue.jobs.pop_front() {
                Some((id, job)) => {
                    queue.phase = Phase::Running;
                    drop(queue);
                    trace!(?id, "running job");
                    execute(job);
                    queue = self.lock();
                }
                None => {
                    queue.phase = Phase::Idle;
                    queue = self
                        .signal
                        .wait(queue)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        let abandoned = mem::take(&mut queue.jobs);
        queue.phase = Phase::Stopped;
        drop(queue);
        self.signal.notify_all();
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "dropping jobs queued at stop");
        }
        drop(abandoned);
        debug!("scheduler worker stopped");
    }
}

fn execute(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let panicked = Panicked::from_payload(payload);
        error!(%panicked, "scheduled job panicked");
    }
}

/// A single-threaded, first-in first-out executor.
///
/// ```rust
/// use std::sync::mpsc;
///
/// use corun::Scheduler;
///
/// let scheduler = Scheduler::start_new().unwrap();
/// let (tx, rx) = mpsc::channel();
/// for i in 0..3 {
///     let tx = tx.clone();
///     scheduler.enqueue(Box::new(move || tx.send(i).unwrap())).unwrap();
/// }
/// let received: Vec<_> = rx.iter().take(3).collect();
/// assert_eq!(received, [0, 1, 2]);
/// scheduler.dispose();
/// ```
///
/// [`dispose()`](Scheduler::dispose) stops the worker after the job it is
/// running, drops anything still queued and joins the thread. Dropping the
/// scheduler disposes it.
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Scheduler {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    jobs: VecDeque::new(),
                    next_id: 0,
                    phase: Phase::Created,
                    stop_requested: false,
                }),
                signal: Condvar::new(),
                worker: OnceLock::new(),
            }),
            config,
            handle: Mutex::new(None),
        }
    }

    /// Creates a scheduler with the default configuration and starts it.
    pub fn start_new() -> Result<Self, SchedulerError> {
        let scheduler = Scheduler::new();
        scheduler.start()?;
        Ok(scheduler)
    }

    /// Spawns the worker thread. A scheduler can only be started once.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut handle = self.lock_handle();
        {
            let mut queue = self.shared.lock();
            if queue.stop_requested {
                return Err(SchedulerError::Stopped);
            }
            if queue.phase != Phase::Created {
                return Err(SchedulerError::AlreadyStarted);
            }
            queue.phase = Phase::Idle;
        }
        let mut builder =
            thread::Builder::new().name(self.config.thread_name.clone());
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let shared = Arc::clone(&self.shared);
        match builder.spawn(move || shared.work()) {
            Ok(spawned) => {
                *handle = Some(spawned);
                Ok(())
            }
            Err(e) => {
                let mut queue = self.shared.lock();
                queue.phase = if queue.stop_requested {
                    Phase::Stopped
                } else {
                    Phase::Created
                };
                drop(queue);
                self.shared.signal.notify_all();
                Err(SchedulerError::Spawn(e))
            }
        }
    }

    /// Queues a job behind all jobs queued before it.
    pub fn enqueue(&self, job: Job) -> Result<JobId, SchedulerError> {
        self.shared.enqueue(job)
    }

    /// Removes a job from the queue before it runs. Returns whether it was
    /// still queued.
    pub fn dequeue(&self, id: JobId) -> bool {
        let removed = {
            let mut queue = self.shared.lock();
            let index = queue.jobs.iter().position(|(queued, _)| *queued == id);
            index.and_then(|index| queue.jobs.remove(index))
        };
        removed.is_some()
    }

    /// Runs `job` right now, which is only allowed on the worker thread
    /// itself. Anywhere else the job is handed back.
    pub fn execute_inline(&self, job: Job) -> Result<(), Job> {
        if !self.shared.is_worker_thread() {
            return Err(job);
        }
        execute(job);
        Ok(())
    }

    /// Takes a queued job out of the queue and runs it right now, which is
    /// only allowed on the worker thread. Returns whether the job ran.
    pub fn run_inline(&self, id: JobId) -> bool {
        if !self.shared.is_worker_thread() {
            return false;
        }
        let removed = {
            let mut queue = self.shared.lock();
            let index = queue.jobs.iter().position(|(queued, _)| *queued == id);
            index.and_then(|index| queue.jobs.remove(index))
        };
        match removed {
            Some((_, job)) => {
                execute(job);
                true
            }
            None => false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// How many jobs are waiting to run.
    pub fn pending(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    pub fn is_worker_thread(&self) -> bool {
        self.shared.is_worker_thread()
    }

    /// A cloneable handle that can only queue jobs.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// This scheduler as a driver trampoline.
    pub fn trampoline(&self) -> Trampoline {
        Arc::new(self.handle())
    }

    /// Stops the worker and waits for its thread to exit.
    ///
    /// Nothing queued starts running once this has been called. Calling it
    /// again is harmless. Called from the worker thread (from inside a job),
    /// it only requests the stop, since the worker cannot wait for itself.
    pub fn dispose(&self) {
        let abandoned = {
            let mut queue = self.shared.lock();
            if !queue.stop_requested {
                debug!("scheduler stop requested");
                queue.stop_requested = true;
            }
            match queue.phase {
                Phase::Created => {
                    queue.phase = Phase::Stopped;
                    mem::take(&mut queue.jobs)
                }
                Phase::Idle | Phase::Running => {
                    queue.phase = Phase::Stopping;
                    VecDeque::new()
                }
                Phase::Stopping | Phase::Stopped => VecDeque::new(),
            }
        };
        drop(abandoned);
        self.shared.signal.notify_all();
        if self.shared.is_worker_thread() {
            warn!("scheduler disposed from its own worker; not waiting for it");
            return;
        }
        let mut queue = self.shared.lock();
        while queue.phase != Phase::Stopped {
            queue = self
                .shared
                .signal
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(queue);
        if let Some(handle) = self.lock_handle().take() {
            if handle.join().is_err() {
                error!("scheduler worker thread panicked");
            }
        }
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.lock();
        f.debug_struct("Scheduler")
            .field("phase", &queue.phase)
            .field("pending", &queue.jobs.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Queues jobs on a [`Scheduler`] without owning it.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    pub fn enqueue(&self, job: Job) -> Result<JobId, SchedulerError> {
        self.shared.enqueue(job)
    }
}

impl Dispatch for SchedulerHandle {
    fn dispatch(&self, job: Job) {
        if let Err(error) = self.shared.enqueue(job) {
            warn!(%error, "dropping a resumption the scheduler refused");
        }
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}
