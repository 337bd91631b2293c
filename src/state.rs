use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::trace;

use crate::continuation::Completer;
use crate::continuation::Continuation;
use crate::error::BoxError;
use crate::error::Error;

enum Slot<T> {
    Idle(Continuation<T>),
    Running(Vec<Completer<()>>),
    Settled(Result<T, BoxError>),
    Taken,
}

/// A continuation boxed together with the outcome it settles to.
///
/// A `CoroutineState` lets a body wait on some work as an ordinary step,
/// and read its outcome afterwards as a separate step, instead of the body
/// having to be the one that receives the callbacks:
///
/// ```rust
/// use corun::CoroutineState;
/// use corun::Step;
/// use corun::from_fn;
/// use corun::run_to_completion;
///
/// let inner = CoroutineState::new(corun::Continuation::ready(52));
/// let mut stage = 0;
/// let outer = from_fn(move || {
///     stage += 1;
///     Ok(match stage {
///         1 => Some(Step::on(&inner)),
///         2 => Some(Step::Done(inner.result()?)),
///         _ => None,
///     })
/// });
/// assert_eq!(run_to_completion(outer, None).wait().unwrap(), 52);
/// ```
///
/// The wrapped continuation is started the first time the state is waited
/// on, not when the state is created. Handles are cheap to clone and all
/// refer to the same state.
///
/// Failures never travel on their own: waiting on a state whose work failed
/// resumes the body normally, and the failure only surfaces when the body
/// calls [`result()`](CoroutineState::result). If nothing ever reads the
/// result, the failure is silently dropped with the state.
pub struct CoroutineState<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for CoroutineState<T> {
    fn clone(&self) -> Self {
        CoroutineState {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Send + 'static> CoroutineState<T> {
    pub fn new(continuation: Continuation<T>) -> Self {
        CoroutineState {
            slot: Arc::new(Mutex::new(Slot::Idle(continuation))),
        }
    }

    /// A continuation that completes once this state has settled. It never
    /// fails, whatever the outcome of the wrapped work.
    ///
    /// The first wait starts the wrapped continuation. Waiting again while
    /// it runs queues up behind it, and waiting on a settled state completes
    /// immediately.
    pub fn wait(&self) -> Continuation<()> {
        let slot = Arc::clone(&self.slot);
        Continuation::new(move |done| {
            let mut guard = lock(&slot);
            match mem::replace(&mut *guard, Slot::Taken) {
                Slot::Idle(continuation) => {
                    *guard = Slot::Running(vec![done]);
                    drop(guard);
                    trace!("starting coroutine state");
                    let on_failure = Arc::clone(&slot);
                    continuation.invoke(
                        move |value| settle(&slot, Ok(value)),
                        move |error| settle(&on_failure, Err(error)),
                    );
                }
                Slot::Running(mut waiters) => {
                    waiters.push(done);
                    *guard = Slot::Running(waiters);
                }
                settled => {
                    *guard = settled;
                    drop(guard);
                    done.succeed(());
                }
            }
        })
    }

    /// Takes the outcome of the wrapped work.
    ///
    /// Reading before the state has settled is an error, not a wait. A
    /// stored failure is returned as [`Error::Surfaced`] around the original
    /// cause. The outcome can be taken only once; later reads return
    /// [`Error::Taken`].
    pub fn result(&self) -> Result<T, Error> {
        let mut guard = lock(&self.slot);
        match &*guard {
            Slot::Idle(_) | Slot::Running(_) => return Err(Error::NotSettled),
            Slot::Taken => return Err(Error::Taken),
            Slot::Settled(_) => {}
        }
        match mem::replace(&mut *guard, Slot::Taken) {
            Slot::Settled(Ok(value)) => Ok(value),
            Slot::Settled(Err(error)) => Err(Error::Surfaced(error)),
            _ => Err(Error::NotSettled),
        }
    }
}

impl<T> CoroutineState<T> {
    pub fn is_settled(&self) -> bool {
        matches!(&*lock(&self.slot), Slot::Settled(_) | Slot::Taken)
    }

    /// Whether the state settled with a failure that has not been read yet.
    pub fn is_faulted(&self) -> bool {
        matches!(&*lock(&self.slot), Slot::Settled(Err(_)))
    }
}

impl<T> fmt::Debug for CoroutineState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match &*lock(&self.slot) {
            Slot::Idle(_) => "idle",
            Slot::Running(_) => "running",
            Slot::Settled(Ok(_)) => "succeeded",
            Slot::Settled(Err(_)) => "failed",
            Slot::Taken => "taken",
        };
        f.debug_struct("CoroutineState")
            .field("phase", &phase)
            .finish()
    }
}

fn settle<T>(slot: &Mutex<Slot<T>>, outcome: Result<T, BoxError>) {
    let waiters = {
        let mut guard = lock(slot);
        match mem::replace(&mut *guard, Slot::Settled(outcome)) {
            Slot::Running(waiters) => waiters,
            _ => Vec::new(),
        }
    };
    trace!(waiters = waiters.len(), "coroutine state settled");
    for waiter in waiters {
        waiter.succeed(());
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
