/// The state of a body after one call to `resume()` has finished.
///
/// After a call to `resume()` finishes, the body is in one of two states:
///
///   * `Yield(y, n)`: The body produced a value `y` and can be advanced
///     again. Its next state is `n`.
///   * `Return(r)`: The body has finished with `r`. It cannot be advanced
///     again, because the call to `resume()` consumed it without giving back
///     a state to resume, and everything the body owned has been dropped.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Suspend<Y, R, N> {
    Yield(Y, N),
    Return(R),
}

use Suspend::*;

impl<Y, R, N> Suspend<Y, R, N> {
    /// Returns the yielded value and the next state, if the body yielded.
    ///
    /// Compare to `Result::ok()` or `ControlFlow::continue_value()`.
    pub fn into_yield(self) -> Option<(Y, N)> {
        match self {
            Yield(y, n) => Some((y, n)),
            Return(_) => None,
        }
    }

    /// Returns the return value, if the body returned.
    ///
    /// Compare to `Result::err()` or `ControlFlow::break_value()`.
    pub fn into_return(self) -> Option<R> {
        match self {
            Yield(_, _) => None,
            Return(r) => Some(r),
        }
    }

    /// Wraps the next state of a yielding body, leaving a return untouched.
    ///
    /// Useful for bodies that delegate to an inner body and need to carry
    /// their own wrapper around the inner body's next state.
    pub fn map_next<N2>(self, f: impl FnOnce(N) -> N2) -> Suspend<Y, R, N2> {
        match self {
            Yield(y, n) => Yield(y, f(n)),
            Return(r) => Return(r),
        }
    }
}
