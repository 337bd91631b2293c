use crate::continuation::Continuation;
use crate::state::CoroutineState;

/// A value yielded by a coroutine body, telling the driver what to do next.
///
/// The variants are explicit tags rather than shapes to be sniffed at run
/// time, so "no answer yet" and "the answer is nothing" can never be
/// confused: a body with `T = Option<U>` reports the latter as
/// `Done(None)`.
#[derive(Debug)]
pub enum Step<T> {
    /// No answer yet; advance the body again.
    Continue,
    /// Suspend until the continuation completes, then advance the body.
    ///
    /// If the continuation fails, the body is dropped and the failure is
    /// reported as [`Error::Operation`](crate::Error::Operation). Wait on a
    /// [`CoroutineState`] instead to keep the failure for a later read.
    Await(Continuation<()>),
    /// The final answer. The body is still advanced to its end (so code
    /// after this step runs), but everything it yields is ignored.
    Done(T),
}

impl<T> Step<T> {
    /// Waits on a bare continuation, ignoring its success value.
    pub fn wait<U: Send + 'static>(continuation: Continuation<U>) -> Self {
        Step::Await(continuation.discard())
    }

    /// Waits for `state` to settle. Its outcome is read back later with
    /// [`CoroutineState::result()`].
    pub fn on<U: Send + 'static>(state: &CoroutineState<U>) -> Self {
        Step::Await(state.wait())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }

    pub fn is_await(&self) -> bool {
        matches!(self, Step::Await(_))
    }

    /// Returns the final answer, if this is one.
    pub fn into_done(self) -> Option<T> {
        match self {
            Step::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the continuation to wait on, if this is a waiting step.
    pub fn into_await(self) -> Option<Continuation<()>> {
        match self {
            Step::Await(continuation) => Some(continuation),
            _ => None,
        }
    }
}

impl<T, U: Send + 'static> From<&CoroutineState<U>> for Step<T> {
    fn from(state: &CoroutineState<U>) -> Self {
        Step::on(state)
    }
}
