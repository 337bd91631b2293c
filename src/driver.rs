//! The trampoline loop that advances a body, suspends it on waiting steps
//! and resumes it when they complete.

use std::mem;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;
use tracing::trace;

use crate::body::Body;
use crate::continuation::Continuation;
use crate::dispatch::Trampoline;
use crate::error::BoxError;
use crate::error::Error;
use crate::error::Panicked;
use crate::step::Step;
use crate::suspend::Suspend::Return;
use crate::suspend::Suspend::Yield;

/// Where a driver reports the end of its body: `Ok(Some(value))` for a
/// result, `Ok(None)` for a body that ended without one, `Err` for a fault.
///
/// Dropping a sink without calling it means the chain was abandoned.
pub(crate) type Sink<T> = Box<dyn FnOnce(Result<Option<T>, Error>) + Send>;

/// Drives `body` until it produces a result, fails, or runs out of steps.
///
/// Exactly one of `on_result` and `on_failure` is called if the body yields
/// [`Step::Done`] or fails; neither is called if it runs out of steps
/// without an answer. In every case the body is dropped before the callback
/// runs, so anything it owned has been cleaned up by then.
///
/// Driving starts on the calling thread, which advances the body until its
/// first waiting step. After that, each resumption runs wherever the awaited
/// work completes, unless a `trampoline` is given, in which case every
/// resumption is dispatched to it.
///
/// ```rust
/// use std::sync::mpsc;
///
/// use corun::IntoBody;
/// use corun::Step;
/// use corun::drive;
///
/// let (tx, rx) = mpsc::channel();
/// let failed = tx.clone();
/// drive(
///     vec![Step::Continue, Step::Done("result"), Step::Continue].into_body(),
///     move |value| tx.send(Ok(value)).unwrap(),
///     move |error| failed.send(Err(error.to_string())).unwrap(),
///     None,
/// );
/// assert_eq!(rx.recv().unwrap(), Ok("result"));
/// ```
pub fn drive<T, B>(
    body: B,
    on_result: impl FnOnce(T) + Send + 'static,
    on_failure: impl FnOnce(Error) + Send + 'static,
    trampoline: Option<Trampoline>,
) where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    drive_with(
        body,
        Box::new(move |outcome| match outcome {
            Ok(Some(value)) => on_result(value),
            Ok(None) => {}
            Err(error) => on_failure(error),
        }),
        trampoline,
    )
}

pub(crate) fn drive_with<T, B>(
    body: B,
    sink: Sink<T>,
    trampoline: Option<Trampoline>,
) where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    Driver { sink, trampoline }.run(body)
}

struct Driver<T> {
    sink: Sink<T>,
    trampoline: Option<Trampoline>,
}

/// The hand-off between a driver that has started a waiting step and the
/// callback that resumes it. Whichever side gets here second carries on.
enum Gate<T, B> {
    Starting,
    Fired(Result<(), BoxError>),
    Parked(Driver<T>, B),
    Closed,
}

impl<T: Send + 'static> Driver<T> {
    fn run<B>(self, mut body: B)
    where
        B: Body<T> + Send + 'static,
    {
        let mut driver = self;
        loop {
            let (step, next) = match advance(body) {
                Ok(Some(advanced)) => advanced,
                Ok(None) => {
                    trace!("coroutine body ran out of steps without a result");
                    return (driver.sink)(Ok(None));
                }
                Err(error) => {
                    debug!(%error, "coroutine body failed");
                    return (driver.sink)(Err(Error::Body(error)));
                }
            };
            match step {
                Step::Continue => body = next,
                Step::Done(value) => return driver.finish(next, value),
                Step::Await(continuation) => {
                    match driver.suspend(next, continuation) {
                        Some((resumed, next)) => {
                            driver = resumed;
                            body = next;
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Runs the rest of the body after its answer, ignoring what it yields,
    /// then reports the answer.
    fn finish<B: Body<T>>(self, mut body: B, value: T) {
        trace!("coroutine body produced its result, draining");
        loop {
            match advance(body) {
                Ok(Some((_, next))) => body = next,
                Ok(None) => break,
                Err(error) => {
                    debug!(%error, "coroutine body failed after its result");
                    return (self.sink)(Err(Error::Body(error)));
                }
            }
        }
        (self.sink)(Ok(Some(value)))
    }

    /// Starts a waited-on continuation. Returns the driver and body back if
    /// the continuation already completed and the loop may just carry on.
    fn suspend<B>(
        self,
        body: B,
        continuation: Continuation<()>,
    ) -> Option<(Self, B)>
    where
        B: Body<T> + Send + 'static,
    {
        let gate = Arc::new(Mutex::new(Gate::<T, B>::Starting));
        let on_success = Arc::clone(&gate);
        let on_failure = Arc::clone(&gate);
        let started = panic::catch_unwind(AssertUnwindSafe(move || {
            continuation.invoke(
                move |()| resume(&on_success, Ok(())),
                move |error| resume(&on_failure, Err(error)),
            )
        }));
        let mut guard = lock(&gate);
        let gated = mem::replace(&mut *guard, Gate::Closed);
        if let Err(payload) = started {
            drop(guard);
            drop(body);
            let panicked = Panicked::from_payload(payload);
            debug!(%panicked, "starting a waited-on continuation panicked");
            (self.sink)(Err(Error::Dispatch(Box::new(panicked))));
            return None;
        }
        match gated {
            Gate::Starting => {
                trace!("coroutine suspended");
                *guard = Gate::Parked(self, body);
                None
            }
            Gate::Fired(outcome) => {
                drop(guard);
                trace!("waited-on continuation completed synchronously");
                self.resumed(body, outcome)
            }
            Gate::Parked(..) | Gate::Closed => None,
        }
    }

    /// Handles the outcome of a wait. With a trampoline, both outcomes are
    /// handled inside a dispatched job, so the body is only ever advanced,
    /// dropped or reported on from the dispatcher's context.
    fn resumed<B>(
        self,
        body: B,
        outcome: Result<(), BoxError>,
    ) -> Option<(Self, B)>
    where
        B: Body<T> + Send + 'static,
    {
        match self.trampoline.clone() {
            None => self.proceed(body, outcome),
            Some(trampoline) => {
                trampoline.dispatch(Box::new(move || {
                    if let Some((driver, body)) = self.proceed(body, outcome) {
                        driver.run(body)
                    }
                }));
                None
            }
        }
    }

    fn proceed<B>(
        self,
        body: B,
        outcome: Result<(), BoxError>,
    ) -> Option<(Self, B)>
    where
        B: Body<T> + Send + 'static,
    {
        match outcome {
            Ok(()) => Some((self, body)),
            Err(error) => {
                drop(body);
                debug!(%error, "waited-on operation failed");
                (self.sink)(Err(Error::Operation(error)));
                None
            }
        }
    }
}

fn resume<T, B>(gate: &Mutex<Gate<T, B>>, outcome: Result<(), BoxError>)
where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    let mut guard = lock(gate);
    match mem::replace(&mut *guard, Gate::Closed) {
        Gate::Starting => *guard = Gate::Fired(outcome),
        Gate::Parked(driver, body) => {
            drop(guard);
            trace!("coroutine resumed");
            if let Some((driver, body)) = driver.resumed(body, outcome) {
                driver.run(body)
            }
        }
        gated @ (Gate::Fired(_) | Gate::Closed) => {
            *guard = gated;
            trace!("ignoring completion of an abandoned wait");
        }
    }
}

/// Resumes the body once, catching panics as faults.
fn advance<T, B: Body<T>>(
    body: B,
) -> Result<Option<(Step<T>, B)>, BoxError> {
    match panic::catch_unwind(AssertUnwindSafe(move || body.resume())) {
        Ok(Yield(step, next)) => Ok(Some((step, next))),
        Ok(Return(Ok(()))) => Ok(None),
        Ok(Return(Err(error))) => Err(error),
        Err(payload) => Err(Box::new(Panicked::from_payload(payload))),
    }
}

fn lock<T, B>(gate: &Mutex<Gate<T, B>>) -> MutexGuard<'_, Gate<T, B>> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}
