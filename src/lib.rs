//! The `corun` crate runs *coroutines* written as step-by-step state machines
//! on top of callback-style asynchronous operations.
//!
//! A coroutine's code is a *body*: a lazy sequence of [`Step`]s. Each step
//! either says "keep going", or "wait for this operation", or "here is my
//! answer". A *driver* advances the body, suspends it whenever it waits, and
//! resumes it once the awaited operation calls back. Nothing here uses
//! `async`/`await`; bodies are plain values and every wait is an explicit
//! step.
//!
//! In this crate, the core body trait looks like:
//!
//! ```rust
//! # use corun::{BoxError, Step, Suspend};
//! pub trait Body<T>: Sized {
//!     fn resume(self) -> Suspend<Step<T>, Result<(), BoxError>, Self>;
//! }
//! ```
//!
//! Note the following about this trait:
//!
//!   * The `resume` method takes `self` by value. A body that has ended is
//!     gone, so everything it owned is dropped exactly once, at the moment
//!     it ends, and it cannot be advanced again.
//!   * A body is its own next state. Yielding hands back `Self`, so the
//!     driver can hold a body of a single concrete type across suspensions.
//!   * Failures are values. A body ends with `Return(Err(e))` instead of
//!     unwinding, and a body that does panic has the panic caught and
//!     reported the same way.
//!
//! The values of the [`Suspend`] enum are imported into the crate's root
//! namespace, so they can be used without the `Suspend::` prefix:
//!
//! ```rust
//! pub enum Suspend<Y, R, N> {
//!     Yield(Y, N),
//!     Return(R),
//! }
//! ```
//!
//! The operations a body waits on are [`Continuation`]s: work that, once
//! started, reports a success or a failure exactly once through a
//! [`Completer`]. Wrapping a finished or failed continuation in a
//! [`CoroutineState`] keeps its outcome around, so a body can wait on the
//! work in one step and read the outcome in the next. A failure stored in a
//! state does not end the waiting body; it only surfaces when the body reads
//! it.
//!
//! By default a suspended body is resumed on whatever thread its operation
//! completes on. A [`Trampoline`] changes that: every resumption is handed to
//! it instead. The [`Scheduler`] is a trampoline that runs everything on one
//! dedicated thread, in order.
//!
//! # Examples
//!
//! ## Waiting on an operation
//!
//! This body waits on an operation that completes on another thread, then
//! produces an answer:
//!
//! ```rust
//! use std::thread;
//!
//! use corun::Continuation;
//! use corun::Step;
//! use corun::from_fn;
//! use corun::run_to_completion;
//!
//! let operation = Continuation::new(|done| {
//!     thread::spawn(move || done.succeed(()));
//! });
//! let mut steps = vec![Step::Done("finished"), Step::wait(operation)];
//! let body = from_fn(move || Ok(steps.pop()));
//! assert_eq!(run_to_completion(body, None).wait().unwrap(), "finished");
//! ```
//!
//! ## Nesting coroutines
//!
//! A body can run another coroutine by waiting on its state and reading its
//! result:
//!
//! ```rust
//! use corun::IntoBody;
//! use corun::Step;
//! use corun::as_coroutine_state;
//! use corun::from_fn;
//! use corun::run_to_completion;
//!
//! let inner = as_coroutine_state(vec![Step::Done(21)].into_body(), None);
//! let mut stage = 0;
//! let outer = from_fn(move || {
//!     stage += 1;
//!     Ok(match stage {
//!         1 => Some(Step::on(&inner)),
//!         2 => Some(Step::Done(inner.result()? * 2)),
//!         _ => None,
//!     })
//! });
//! assert_eq!(run_to_completion(outer, None).wait().unwrap(), 42);
//! ```
//!
//! ## Cleaning up
//!
//! Because the driver drops a body before it reports the body's outcome, a
//! guard owned by the body is released before anyone hears the result:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::atomic::Ordering;
//!
//! use corun::Step;
//! use corun::from_fn;
//! use corun::run_to_completion;
//!
//! struct Guard(Arc<AtomicBool>);
//! impl Drop for Guard {
//!     fn drop(&mut self) {
//!         self.0.store(true, Ordering::SeqCst);
//!     }
//! }
//!
//! let released = Arc::new(AtomicBool::new(false));
//! let guard = Guard(Arc::clone(&released));
//! let mut answered = false;
//! let body = from_fn(move || {
//!     let _held = &guard;
//!     if answered {
//!         return Ok(None);
//!     }
//!     answered = true;
//!     Ok(Some(Step::Done(7)))
//! });
//! let pending = run_to_completion(body, None);
//! assert!(released.load(Ordering::SeqCst));
//! assert_eq!(pending.wait().unwrap(), 7);
//! ```
//!
//! ## Running on a scheduler
//!
//! ```rust
//! use corun::Continuation;
//! use corun::IntoBody;
//! use corun::Scheduler;
//! use corun::Step;
//! use corun::run_to_completion;
//!
//! let scheduler = Scheduler::start_new().unwrap();
//! let body = vec![
//!     Step::wait(Continuation::ready(())),
//!     Step::Done("resumed on the worker"),
//! ]
//! .into_body();
//! let pending = run_to_completion(body, Some(scheduler.trampoline()));
//! assert_eq!(pending.wait().unwrap(), "resumed on the worker");
//! ```

mod body;
mod body_assertions;
mod continuation;
mod dispatch;
mod driver;
mod either;
mod error;
mod from_fn;
mod into_body;
mod pending;
mod scheduler;
mod state;
mod step;
mod suspend;

pub use body::Advance;
pub use body::Body;
pub use body::as_coroutine_state;
pub use body::into_continuation;
pub use body_assertions::BodyAssertions;
pub use continuation::AsyncCallback;
pub use continuation::Completer;
pub use continuation::Continuation;
pub use continuation::wrap_async;
pub use dispatch::Dispatch;
pub use dispatch::Job;
pub use dispatch::Trampoline;
pub use driver::drive;
pub use error::BoxError;
pub use error::Error;
pub use error::Panicked;
pub use from_fn::FromFn;
pub use from_fn::from_fn;
pub use into_body::IntoBody;
pub use into_body::IteratorBody;
pub use into_body::TryIteratorBody;
pub use into_body::try_body;
pub use pending::PendingResult;
pub use pending::run_to_completion;
pub use pending::spawn_on;
pub use scheduler::JobId;
pub use scheduler::Phase;
pub use scheduler::Scheduler;
pub use scheduler::SchedulerConfig;
pub use scheduler::SchedulerError;
pub use scheduler::SchedulerHandle;
pub use state::CoroutineState;
pub use step::Step;
pub use suspend::Suspend;

// Re-export the values of the `Suspend` enum so that they can be used without
// the `Suspend::` prefix.
pub use Suspend::{Return, Yield};

#[cfg(test)]
mod test;
