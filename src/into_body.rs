use crate::body::Advance;
use crate::body::Body;
use crate::error::BoxError;
use crate::step::Step;
use crate::suspend::Suspend::Return;
use crate::suspend::Suspend::Yield;

/// Implemented by types that can be converted into a body.
///
/// Notably, everything that implements `IntoIterator` over [`Step`]s can be
/// converted into a body that yields the elements of the iterator and ends
/// normally once the iterator is exhausted.
///
/// ```rust
/// use corun::BodyAssertions;
/// use corun::IntoBody;
/// use corun::Step;
///
/// vec![Step::Continue, Step::Done(3)]
///     .into_body()
///     .assert_continues()
///     .assert_done(3)
///     .assert_exhausted();
/// ```
pub trait IntoBody<T> {
    type IntoBody: Body<T>;
    fn into_body(self) -> Self::IntoBody;
}

impl<T, I: IntoIterator<Item = Step<T>>> IntoBody<T> for I {
    type IntoBody = IteratorBody<I::IntoIter>;
    fn into_body(self) -> Self::IntoBody {
        IteratorBody(self.into_iter())
    }
}

#[derive(Clone, Debug)]
pub struct IteratorBody<I>(I);

impl<T, I: Iterator<Item = Step<T>>> Body<T> for IteratorBody<I> {
    fn resume(mut self) -> Advance<T, Self> {
        match self.0.next() {
            Some(step) => Yield(step, self),
            None => Return(Ok(())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TryIteratorBody<I>(I);

impl<T, E, I> Body<T> for TryIteratorBody<I>
where
    I: Iterator<Item = Result<Step<T>, E>>,
    E: Into<BoxError>,
{
    fn resume(mut self) -> Advance<T, Self> {
        match self.0.next() {
            Some(Ok(step)) => Yield(step, self),
            Some(Err(error)) => Return(Err(error.into())),
            None => Return(Ok(())),
        }
    }
}

/// Creates a body from an iterator whose items may be failures. The body
/// fails with the first `Err` it meets, without pulling further items.
///
/// ```rust
/// use corun::BodyAssertions;
/// use corun::Step;
/// use corun::try_body;
///
/// let error = try_body(vec![Ok(Step::<()>::Continue), Err("bad input")])
///     .assert_continues()
///     .assert_faults();
/// assert_eq!(error.to_string(), "bad input");
/// ```
pub fn try_body<T, E, I>(iter: I) -> TryIteratorBody<I::IntoIter>
where
    I: IntoIterator<Item = Result<Step<T>, E>>,
    E: Into<BoxError>,
{
    TryIteratorBody(iter.into_iter())
}
