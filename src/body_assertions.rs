use core::fmt::Debug;

use crate::body::Body;
use crate::continuation::Continuation;
use crate::error::BoxError;
use crate::step::Step;
use crate::suspend::Suspend::Return;
use crate::suspend::Suspend::Yield;

/// Extension trait providing assertion methods for testing bodies.
///
/// Each assertion advances the body by exactly one step, without a driver,
/// and hands back the next state so assertions can be chained:
///
/// ```rust
/// use corun::BodyAssertions;
/// use corun::Continuation;
/// use corun::IntoBody;
/// use corun::Step;
///
/// let (_continuation, rest) = vec![
///     Step::Continue,
///     Step::wait(Continuation::ready(())),
///     Step::Done('x'),
/// ]
/// .into_body()
/// .assert_continues()
/// .assert_awaits();
/// rest.assert_done('x').assert_exhausted();
/// ```
pub trait BodyAssertions<T>: Body<T> {
    /// Advances the body and asserts that it yielded [`Step::Continue`].
    fn assert_continues(self) -> Self
    where
        T: Debug,
    {
        match self.resume() {
            Yield(Step::Continue, next) => next,
            Yield(actual, _) => {
                panic!("expected Yield(Continue), got Yield({actual:?})")
            }
            Return(actual) => {
                panic!("expected Yield(Continue), got Return({actual:?})")
            }
        }
    }

    /// Advances the body and asserts that it yielded [`Step::Await`]. Returns
    /// the awaited continuation, unstarted, along with the next state.
    fn assert_awaits(self) -> (Continuation<()>, Self)
    where
        T: Debug,
    {
        match self.resume() {
            Yield(Step::Await(continuation), next) => (continuation, next),
            Yield(actual, _) => {
                panic!("expected Yield(Await(..)), got Yield({actual:?})")
            }
            Return(actual) => {
                panic!("expected Yield(Await(..)), got Return({actual:?})")
            }
        }
    }

    /// Advances the body and asserts that it yielded [`Step::Done`] with the
    /// expected value.
    fn assert_done(self, expected: T) -> Self
    where
        T: PartialEq + Debug,
    {
        match self.resume() {
            Yield(Step::Done(actual), next) => {
                assert_eq!(
                    actual, expected,
                    "expected Yield(Done({expected:?})), got Yield(Done({actual:?}))"
                );
                next
            }
            Yield(actual, _) => {
                panic!("expected Yield(Done({expected:?})), got Yield({actual:?})")
            }
            Return(actual) => {
                panic!("expected Yield(Done({expected:?})), got Return({actual:?})")
            }
        }
    }

    /// Advances the body and asserts that it ended normally.
    fn assert_exhausted(self)
    where
        T: Debug,
    {
        match self.resume() {
            Return(Ok(())) => {}
            Yield(actual, _) => {
                panic!("expected Return(Ok(())), got Yield({actual:?})")
            }
            Return(Err(error)) => {
                panic!("expected Return(Ok(())), got Return(Err({error:?}))")
            }
        }
    }

    /// Advances the body and asserts that it failed. Returns the failure.
    fn assert_faults(self) -> BoxError
    where
        T: Debug,
    {
        match self.resume() {
            Return(Err(error)) => error,
            Yield(actual, _) => {
                panic!("expected Return(Err(..)), got Yield({actual:?})")
            }
            Return(Ok(())) => {
                panic!("expected Return(Err(..)), got Return(Ok(()))")
            }
        }
    }
}

/// Blanket implementation of [`BodyAssertions`] for all types implementing
/// [`Body`].
impl<T, B> BodyAssertions<T> for B where B: Body<T> {}
