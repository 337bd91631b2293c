use std::fmt;
use std::future::Future;
use std::panic;
use std::panic::AssertUnwindSafe;

use futures::task::Spawn;
use futures::task::SpawnExt;
use tracing::warn;

use crate::error::BoxError;
use crate::error::Error;
use crate::error::Panicked;

type OnSuccess<T> = Box<dyn FnOnce(T) + Send>;
type OnFailure = Box<dyn FnOnce(BoxError) + Send>;

/// The completion callback handed to `begin` by [`wrap_async()`].
pub type AsyncCallback<H> = Box<dyn FnOnce(H) + Send>;

/// The two notification channels of a started [`Continuation`].
///
/// A `Completer` is consumed by `succeed()`, `fail()` or `complete()`, so it
/// is impossible to notify twice or to notify both channels. If it is dropped
/// without being used, the failure channel fires with [`Error::Abandoned`];
/// either way, exactly one channel fires exactly once.
pub struct Completer<T> {
    channels: Option<(OnSuccess<T>, OnFailure)>,
}

impl<T> Completer<T> {
    pub fn new(
        on_success: impl FnOnce(T) + Send + 'static,
        on_failure: impl FnOnce(BoxError) + Send + 'static,
    ) -> Self {
        Completer {
            channels: Some((Box::new(on_success), Box::new(on_failure))),
        }
    }

    pub fn succeed(mut self, value: T) {
        if let Some((on_success, _)) = self.channels.take() {
            on_success(value)
        }
    }

    pub fn fail(mut self, error: impl Into<BoxError>) {
        if let Some((_, on_failure)) = self.channels.take() {
            on_failure(error.into())
        }
    }

    pub fn complete<E>(self, result: Result<T, E>)
    where
        E: Into<BoxError>,
    {
        match result {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }

    /// Adapts this completer to accept a different success type, converting
    /// it with `f` on the way in. The failure channel is passed through.
    pub fn contramap<T2>(
        mut self,
        f: impl FnOnce(T2) -> T + Send + 'static,
    ) -> Completer<T2>
    where
        T: 'static,
    {
        let channels = self.channels.take().map(|(on_success, on_failure)| {
            let on_success: OnSuccess<T2> =
                Box::new(move |value| on_success(f(value)));
            (on_success, on_failure)
        });
        Completer { channels }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some((_, on_failure)) = self.channels.take() {
            on_failure(Box::new(Error::Abandoned))
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("fired", &self.channels.is_none())
            .finish()
    }
}

/// One pending asynchronous unit of work, described by how to start it.
///
/// A continuation is not "hot": nothing happens until it is started with a
/// [`Completer`], and starting consumes it. The work may complete
/// synchronously, before `start()` returns, or later from any thread; the
/// driver treats both the same way.
///
/// ```rust
/// use std::sync::mpsc;
///
/// use corun::Continuation;
///
/// let (tx, rx) = mpsc::channel();
/// let failed = tx.clone();
/// Continuation::ready(7)
///     .map(|n| n * 6)
///     .invoke(move |n| tx.send(Ok(n)).unwrap(), move |e| {
///         failed.send(Err(e.to_string())).unwrap()
///     });
/// assert_eq!(rx.recv().unwrap(), Ok(42));
/// ```
pub struct Continuation<T> {
    start: Box<dyn FnOnce(Completer<T>) + Send>,
}

impl<T: Send + 'static> Continuation<T> {
    pub fn new(start: impl FnOnce(Completer<T>) + Send + 'static) -> Self {
        Continuation {
            start: Box::new(start),
        }
    }

    /// A continuation that succeeds with `value` as soon as it is started.
    pub fn ready(value: T) -> Self {
        Continuation::new(move |done| done.succeed(value))
    }

    /// A continuation that fails with `error` as soon as it is started.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        let error = error.into();
        Continuation::new(move |done| done.fail(error))
    }

    /// Starts the work. Exactly one of the completer's channels will fire.
    pub fn start(self, completer: Completer<T>) {
        (self.start)(completer)
    }

    /// Starts the work with a pair of plain callbacks.
    pub fn invoke(
        self,
        on_success: impl FnOnce(T) + Send + 'static,
        on_failure: impl FnOnce(BoxError) + Send + 'static,
    ) {
        self.start(Completer::new(on_success, on_failure))
    }

    /// Transforms the success value once the work completes.
    pub fn map<U: Send + 'static>(
        self,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Continuation<U> {
        Continuation::new(move |done: Completer<U>| {
            self.start(done.contramap(f))
        })
    }

    /// Forgets the success value, keeping only "done" or "failed".
    pub fn discard(self) -> Continuation<()> {
        self.map(drop)
    }

    /// Adapts a begin/end style asynchronous operation.
    ///
    /// `begin` starts the operation and must eventually call the callback it
    /// is given with a handle `H`; `end` then turns that handle into the
    /// operation's outcome. A panic inside `end` is reported as a failure.
    pub fn from_async<H, E, B, F>(begin: B, end: F) -> Self
    where
        H: 'static,
        E: Into<BoxError>,
        B: FnOnce(AsyncCallback<H>) + Send + 'static,
        F: FnOnce(H) -> Result<T, E> + Send + 'static,
    {
        Continuation::new(move |done| {
            begin(Box::new(move |handle| {
                match panic::catch_unwind(AssertUnwindSafe(|| end(handle))) {
                    Ok(result) => done.complete(result),
                    Err(payload) => done.fail(Panicked::from_payload(payload)),
                }
            }))
        })
    }

    /// Adapts a future, which is spawned on `spawner` when the continuation
    /// is started.
    ///
    /// If the spawner refuses the future, the future is dropped along with
    /// its completer, which reports [`Error::Abandoned`].
    pub fn from_future<F, E, S>(future: F, spawner: S) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
        S: Spawn + Send + 'static,
    {
        Continuation::new(move |done| {
            let spawned = spawner.spawn(async move {
                done.complete(future.await);
            });
            if let Err(error) = spawned {
                warn!(%error, "could not spawn the future behind a continuation");
            }
        })
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}

/// Wraps a begin/end style asynchronous operation into a [`Continuation`].
///
/// See [`Continuation::from_async()`].
///
/// ```rust
/// use std::thread;
///
/// use corun::Step;
/// use corun::from_fn;
/// use corun::run_to_completion;
/// use corun::wrap_async;
///
/// let read = wrap_async(
///     |callback| {
///         thread::spawn(move || callback(b"hello".to_vec()));
///     },
///     |bytes: Vec<u8>| String::from_utf8(bytes),
/// );
/// let read = corun::CoroutineState::new(read);
/// let mut stage = 0;
/// let body = from_fn(move || {
///     stage += 1;
///     Ok(match stage {
///         1 => Some(Step::on(&read)),
///         2 => Some(Step::Done(read.result()?)),
///         _ => None,
///     })
/// });
/// assert_eq!(run_to_completion(body, None).wait().unwrap(), "hello");
/// ```
pub fn wrap_async<T, H, E, B, F>(begin: B, end: F) -> Continuation<T>
where
    T: Send + 'static,
    H: 'static,
    E: Into<BoxError>,
    B: FnOnce(AsyncCallback<H>) + Send + 'static,
    F: FnOnce(H) -> Result<T, E> + Send + 'static,
{
    Continuation::from_async(begin, end)
}
