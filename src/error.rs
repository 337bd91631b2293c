use std::any::Any;

/// The opaque failure value carried by continuations and bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The ways a coroutine chain can fail.
///
/// The first three variants are the faults a driver reports to its failure
/// channel. Each of them nests the original failure, which is reachable
/// through [`std::error::Error::source`] or, all the way down, through
/// [`Error::root_cause`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The body's own code failed (or panicked) while being advanced.
    #[error("fault while advancing coroutine body")]
    Body(#[source] BoxError),

    /// Starting a waited-on continuation panicked.
    #[error("fault while handling a step yielded by coroutine body")]
    Dispatch(#[source] BoxError),

    /// A bare continuation the body waited on reported a failure.
    #[error("awaited operation failed")]
    Operation(#[source] BoxError),

    /// A failure stored in a `CoroutineState`, surfaced by reading it.
    #[error("coroutine failed")]
    Surfaced(#[source] BoxError),

    /// The result of a `CoroutineState` was read before it settled.
    #[error("coroutine result read before it settled")]
    NotSettled,

    /// The result of a `CoroutineState` was already read.
    #[error("coroutine result was already taken")]
    Taken,

    /// The body ran to its end without ever yielding `Step::Done`.
    #[error("coroutine completed without producing a result")]
    NoResult,

    /// A continuation or coroutine chain was dropped before it completed.
    #[error("continuation was dropped before completing")]
    Abandoned,
}

impl Error {
    /// Follows the chain of sources down to the failure that started it.
    ///
    /// ```rust
    /// use corun::Error;
    ///
    /// let io = std::io::Error::other("disk on fire");
    /// let error = Error::Body(Box::new(Error::Surfaced(Box::new(io))));
    /// assert_eq!(error.root_cause().to_string(), "disk on fire");
    /// ```
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut cause: &(dyn std::error::Error + 'static) = self;
        while let Some(source) = cause.source() {
            cause = source;
        }
        cause
    }
}

/// A panic caught while running coroutine code, turned into an error value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panicked: {message}")]
pub struct Panicked {
    message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_owned(),
            Err(payload) => match payload.downcast::<String>() {
                Ok(s) => *s,
                Err(_) => "<non-string panic payload>".to_owned(),
            },
        };
        Panicked { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
