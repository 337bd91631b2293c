use crate::body::Advance;
use crate::body::Body;
use crate::error::BoxError;
use crate::step::Step;
use crate::suspend::Suspend::Return;
use crate::suspend::Suspend::Yield;

#[derive(Clone, Debug)]
pub struct FromFn<F>(F);

impl<T, F> Body<T> for FromFn<F>
where
    F: FnMut() -> Result<Option<Step<T>>, BoxError>,
{
    fn resume(mut self) -> Advance<T, Self> {
        match (self.0)() {
            Ok(Some(step)) => Yield(step, self),
            Ok(None) => Return(Ok(())),
            Err(error) => Return(Err(error)),
        }
    }
}

/// Creates a body from a closure that is called once per step.
///
/// The closure returns `Ok(Some(step))` to yield a step, `Ok(None)` when the
/// body has nothing more to do, and `Err` to fail. The closure is dropped as
/// soon as it returns anything but a step, so whatever it captured is
/// cleaned up before the driver reports the outcome.
///
/// This is the most direct way to write a body without implementing the
/// [`Body`] trait for a type of your own. Keep the position of the body in
/// captured state:
///
/// ```rust
/// use corun::BodyAssertions;
/// use corun::Step;
/// use corun::from_fn;
///
/// let mut remaining = 2;
/// from_fn(move || {
///     Ok(match remaining {
///         0 => None,
///         1 => {
///             remaining = 0;
///             Some(Step::Done("liftoff"))
///         }
///         _ => {
///             remaining -= 1;
///             Some(Step::Continue)
///         }
///     })
/// })
/// .assert_continues()
/// .assert_done("liftoff")
/// .assert_exhausted();
/// ```
pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: FnMut() -> Result<Option<Step<T>>, BoxError>,
{
    FromFn(f)
}
