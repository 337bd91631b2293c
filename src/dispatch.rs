use std::sync::Arc;

/// A unit of work handed to a [`Dispatch`]er.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that resumptions of a coroutine can be sent to.
///
/// When a driver is given a dispatcher, it never resumes a body on the
/// thread that completed the awaited work. It hands the resumption to the
/// dispatcher instead, which bounds stack growth and lets the dispatcher
/// decide where bodies run. A [`Scheduler`](crate::Scheduler) pins them all
/// to one thread.
///
/// Any `Fn(Job)` closure is a dispatcher:
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
///
/// use corun::Job;
/// use corun::Trampoline;
///
/// let on_new_thread: Trampoline = Arc::new(|job: Job| {
///     thread::spawn(job);
/// });
/// # let _ = on_new_thread;
/// ```
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, job: Job);
}

impl<F> Dispatch for F
where
    F: Fn(Job) + Send + Sync,
{
    fn dispatch(&self, job: Job) {
        self(job)
    }
}

/// A shared dispatcher, as accepted by the driver entry points.
pub type Trampoline = Arc<dyn Dispatch>;
