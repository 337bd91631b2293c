use crate::continuation::Continuation;
use crate::dispatch::Trampoline;
use crate::driver;
use crate::error::BoxError;
use crate::error::Error;
use crate::pending::PendingResult;
use crate::state::CoroutineState;
use crate::step::Step;
use crate::suspend::Suspend;

/// What a body hands back from one call to `resume()`: either a step and
/// the body's next state, or the end of the body.
///
/// `Return(Ok(()))` means the body ran out of steps. `Return(Err(e))` means
/// its code failed with `e`.
pub type Advance<T, B> = Suspend<Step<T>, Result<(), BoxError>, B>;

/// The computation a coroutine runs: a lazy, single-pass sequence of
/// [`Step`]s, ending either normally or with a failure.
///
/// Like an iterator, a body is advanced one step at a time. Unlike an
/// iterator, `resume()` consumes the body and only hands it back if it
/// yielded. A body that has ended is gone, along with everything it owned,
/// so its cleanup (the `Drop` impls of whatever it holds) runs exactly once
/// and it is impossible to advance it again:
///
/// ```rust
/// use corun::Body;
/// use corun::BoxError;
/// use corun::Return;
/// use corun::Step;
/// use corun::Yield;
///
/// struct Countdown(u32);
///
/// impl Body<&'static str> for Countdown {
///     fn resume(self) -> corun::Advance<&'static str, Self> {
///         match self.0 {
///             0 => Return(Ok(())),
///             1 => Yield(Step::Done("liftoff"), Countdown(0)),
///             n if n > 10 => Return(Err(BoxError::from("too far away"))),
///             n => Yield(Step::Continue, Countdown(n - 1)),
///         }
///     }
/// }
///
/// assert_eq!(Countdown(3).run(None).wait().unwrap(), "liftoff");
/// ```
///
/// Real bodies tend to be built from closures with
/// [`from_fn()`](crate::from_fn) or from iterators with
/// [`IntoBody`](crate::IntoBody) rather than implemented by hand.
pub trait Body<T>: Sized {
    /// Advances the body by one step.
    fn resume(self) -> Advance<T, Self>;

    /// Drives this body with callbacks. See [`drive()`](crate::drive).
    fn drive(
        self,
        on_result: impl FnOnce(T) + Send + 'static,
        on_failure: impl FnOnce(Error) + Send + 'static,
        trampoline: Option<Trampoline>,
    ) where
        Self: Send + 'static,
        T: Send + 'static,
    {
        driver::drive(self, on_result, on_failure, trampoline)
    }

    /// Starts driving this body and returns its pending result. See
    /// [`run_to_completion()`](crate::run_to_completion).
    fn run(self, trampoline: Option<Trampoline>) -> PendingResult<T>
    where
        Self: Send + 'static,
        T: Send + 'static,
    {
        crate::pending::run_to_completion(self, trampoline)
    }

    /// A continuation that drives this body when started. A body that ends
    /// without a result fails the continuation with [`Error::NoResult`].
    fn into_continuation(
        self,
        trampoline: Option<Trampoline>,
    ) -> Continuation<T>
    where
        Self: Send + 'static,
        T: Send + 'static,
    {
        Continuation::new(move |done| {
            driver::drive_with(
                self,
                Box::new(move |outcome| match outcome {
                    Ok(Some(value)) => done.succeed(value),
                    Ok(None) => done.fail(Error::NoResult),
                    Err(error) => done.fail(error),
                }),
                trampoline,
            )
        })
    }

    /// Wraps this body in a [`CoroutineState`] that another body can wait
    /// on and read. See [`as_coroutine_state()`](crate::as_coroutine_state).
    fn into_state(self, trampoline: Option<Trampoline>) -> CoroutineState<T>
    where
        Self: Send + 'static,
        T: Send + 'static,
    {
        CoroutineState::new(self.into_continuation(trampoline))
    }
}

/// Wraps `body` in a [`CoroutineState`], for consumption by another body.
///
/// The body is not advanced until the state is first waited on. Its
/// failure, if any, is kept in the state until read:
///
/// ```rust
/// use corun::BoxError;
/// use corun::Error;
/// use corun::Step;
/// use corun::as_coroutine_state;
/// use corun::from_fn;
///
/// let inner = as_coroutine_state(
///     from_fn(|| -> Result<Option<Step<i32>>, BoxError> { Err("boo".into()) }),
///     None,
/// );
/// let mut stage = 0;
/// let outer = from_fn(move || {
///     stage += 1;
///     Ok(match stage {
///         1 => Some(Step::on(&inner)),
///         2 => Some(Step::Done(inner.result()?)),
///         _ => None,
///     })
/// });
/// let error = corun::run_to_completion(outer, None).wait().unwrap_err();
/// assert!(matches!(error, Error::Body(_)));
/// assert_eq!(error.root_cause().to_string(), "boo");
/// ```
pub fn as_coroutine_state<T, B>(
    body: B,
    trampoline: Option<Trampoline>,
) -> CoroutineState<T>
where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    body.into_state(trampoline)
}

/// Turns `body` into a [`Continuation`] that drives it when started.
pub fn into_continuation<T, B>(
    body: B,
    trampoline: Option<Trampoline>,
) -> Continuation<T>
where
    T: Send + 'static,
    B: Body<T> + Send + 'static,
{
    body.into_continuation(trampoline)
}
