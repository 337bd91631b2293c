use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor;

use crate::body::Body;
use crate::dispatch::Trampoline;
use crate::driver;
use crate::error::Error;

/// The eventual outcome of a coroutine started by [`run_to_completion()`].
///
/// This is an ordinary [`Future`], so it can be awaited by async code that
/// knows nothing about bodies or drivers. Outside of async code, block on it
/// with [`wait()`](PendingResult::wait) or poll it with
/// [`try_result()`](PendingResult::try_result).
#[must_use = "a pending result does nothing unless observed"]
#[derive(Debug)]
pub struct PendingResult<T> {
    receiver: oneshot::Receiver<Result<T, Error>>,
}

impl<T> PendingResult<T> {
    /// Blocks the current thread until the coroutine finishes.
    ///
    /// Do not call this from a thread the coroutine needs in order to make
    /// progress, such as the worker of the scheduler it is dispatched to.
    pub fn wait(self) -> Result<T, Error> {
        executor::block_on(self)
    }

    /// Returns the outcome if the coroutine has already finished.
    pub fn try_result(&mut self) -> Option<Result<T, Error>> {
        match self.receiver.try_recv() {
            Ok(Some(outcome)) => Some(outcome),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(Error::Abandoned)),
        }
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(Error::Abandoned),
        })
    }
}

/// Starts driving `body` right away and returns a handle to its outcome.
///
/// The body is advanced on the calling thread until it first waits. A body
/// that ends without yielding [`Step::Done`](crate::Step::Done) settles the
/// result with [`Error::NoResult`]; one whose resumption was dropped before
/// it could finish (for example by a stopped scheduler) settles it with
/// [`Error::Abandoned`].
///
/// ```rust
/// use corun::IntoBody;
/// use corun::Step;
/// use corun::run_to_completion;
///
/// let pending = run_to_completion(vec![Step::Done(52)].into_body(), None);
/// assert_eq!(pending.wait().unwrap(), 52);
/// ```
pub fn run_to_completion<T, B>(
    body: B,
    trampoline: Option<Trampoline>,
) -> PendingResult<T>
where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    driver::drive_with(
        body,
        Box::new(move |outcome| {
            let outcome = outcome.and_then(|value| value.ok_or(Error::NoResult));
            // The receiver may have been dropped; nobody is listening then.
            let _ = sender.send(outcome);
        }),
        trampoline,
    );
    PendingResult { receiver }
}

/// Like [`run_to_completion()`], but the body does not start on the calling
/// thread. Its first step is handed to `trampoline` along with every
/// resumption after it, so all of the body's code runs in the dispatcher's
/// context. With a [`Scheduler`](crate::Scheduler) that is one thread.
///
/// If the dispatcher drops the first job, the result settles with
/// [`Error::Abandoned`].
///
/// ```rust
/// use corun::IntoBody;
/// use corun::Scheduler;
/// use corun::Step;
/// use corun::spawn_on;
///
/// let scheduler = Scheduler::start_new().unwrap();
/// let body = vec![Step::Done("started on the worker")].into_body();
/// let pending = spawn_on(body, scheduler.trampoline());
/// assert_eq!(pending.wait().unwrap(), "started on the worker");
/// ```
pub fn spawn_on<T, B>(body: B, trampoline: Trampoline) -> PendingResult<T>
where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let resumptions = Arc::clone(&trampoline);
    trampoline.dispatch(Box::new(move || {
        driver::drive_with(
            body,
            Box::new(move |outcome| {
                let outcome =
                    outcome.and_then(|value| value.ok_or(Error::NoResult));
                let _ = sender.send(outcome);
            }),
            Some(resumptions),
        )
    }));
    PendingResult { receiver }
}
