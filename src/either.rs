use either::Either;
use Either::Left;
use Either::Right;

use crate::body::Advance;
use crate::body::Body;

/// Implement the `Body` trait for the `Either` type when both variants are
/// themselves bodies with the same result type.
///
/// This lets a function pick one of two differently typed bodies at runtime
/// and still return a single concrete type.
impl<T, A, B> Body<T> for Either<A, B>
where
    A: Body<T>,
    B: Body<T>,
{
    fn resume(self) -> Advance<T, Self> {
        match self {
            Left(a) => a.resume().map_next(Left),
            Right(b) => b.resume().map_next(Right),
        }
    }
}
