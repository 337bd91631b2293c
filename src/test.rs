use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;

use crate::*;

fn record<T: Send + 'static>(
    continuation: Continuation<T>,
) -> mpsc::Receiver<Result<T, String>> {
    let (tx, rx) = mpsc::channel();
    let failed = tx.clone();
    continuation.invoke(
        move |value| tx.send(Ok(value)).unwrap(),
        move |error| failed.send(Err(error.to_string())).unwrap(),
    );
    rx
}

#[test]
fn iterator_body_steps_then_exhausts() {
    vec![Step::Continue, Step::Continue, Step::Done(10)]
        .into_body()
        .assert_continues()
        .assert_continues()
        .assert_done(10)
        .assert_exhausted();
}

#[test]
fn empty_iterator_body_is_exhausted() {
    Vec::<Step<()>>::new().into_body().assert_exhausted();
}

#[test]
#[should_panic(expected = "expected Yield(Done(2)), got Yield(Done(1))")]
fn assert_done_rejects_wrong_value() {
    vec![Step::Done(1)].into_body().assert_done(2);
}

#[test]
#[should_panic(expected = "expected Yield(Continue), got Return(Ok(()))")]
fn assert_continues_rejects_exhausted_body() {
    Vec::<Step<()>>::new().into_body().assert_continues();
}

#[test]
fn from_fn_fault_ends_body() {
    let mut calls = 0;
    let error = from_fn(move || {
        calls += 1;
        if calls == 2 {
            return Err("second call".into());
        }
        Ok(Some(Step::<()>::Continue))
    })
    .assert_continues()
    .assert_faults();
    assert_eq!(error.to_string(), "second call");
}

#[test]
fn try_body_stops_at_first_error() {
    let error = try_body([Ok(Step::Done(1)), Err("nope"), Ok(Step::Done(2))])
        .assert_done(1)
        .assert_faults();
    assert_eq!(error.to_string(), "nope");
}

#[test]
fn either_body_delegates_to_active_side() {
    type Side = ::either::Either<
        IteratorBody<std::vec::IntoIter<Step<i32>>>,
        FromFn<Box<dyn FnMut() -> Result<Option<Step<i32>>, BoxError>>>,
    >;
    let left: Side = ::either::Left(vec![Step::Done(1)].into_body());
    left.assert_done(1).assert_exhausted();
    let fails: Box<dyn FnMut() -> Result<Option<Step<i32>>, BoxError>> =
        Box::new(|| Err("right".into()));
    let right: Side = ::either::Right(from_fn(fails));
    assert_eq!(right.assert_faults().to_string(), "right");
}

#[test]
fn suspend_accessors() {
    let yielded: Suspend<i32, &str, ()> = Yield(1, ());
    assert_eq!(yielded.into_yield(), Some((1, ())));
    assert_eq!(yielded.into_return(), None);
    let returned: Suspend<i32, &str, ()> = Return("end");
    assert_eq!(returned.into_return(), Some("end"));
    assert_eq!(returned.map_next(|()| 5), Return("end"));
}

#[test]
fn step_helpers() {
    let done = Step::Done(3);
    assert!(done.is_done());
    assert!(!done.is_await());
    assert_eq!(done.into_done(), Some(3));
    let waiting = Step::<i32>::wait(Continuation::ready("ignored"));
    assert!(waiting.is_await());
    let continuation = waiting.into_await().unwrap();
    assert_eq!(record(continuation).recv().unwrap(), Ok(()));
    assert!(Step::<i32>::Continue.into_await().is_none());
}

#[test]
fn completer_fires_success_once() {
    let (tx, rx) = mpsc::channel();
    let failed = tx.clone();
    let completer = Completer::new(
        move |n: i32| tx.send(format!("ok {n}")).unwrap(),
        move |e| failed.send(format!("err {e}")).unwrap(),
    );
    completer.succeed(4);
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), ["ok 4"]);
}

#[test]
fn dropped_completer_reports_abandoned() {
    let (tx, rx) = mpsc::channel();
    let completer = Completer::new(
        |_: ()| panic!("must not succeed"),
        move |e| tx.send(e.to_string()).unwrap(),
    );
    drop(completer);
    assert_eq!(rx.recv().unwrap(), Error::Abandoned.to_string());
}

#[test]
fn completer_contramap_converts_success() {
    let (tx, rx) = mpsc::channel();
    let completer = Completer::new(
        move |s: String| tx.send(s).unwrap(),
        |_| panic!("must not fail"),
    );
    completer.contramap(|n: u8| n.to_string()).succeed(9);
    assert_eq!(rx.recv().unwrap(), "9");
}

#[test]
fn continuation_map_and_failed() {
    assert_eq!(
        record(Continuation::ready(2).map(|n| n + 1)).recv().unwrap(),
        Ok(3)
    );
    assert_eq!(
        record(Continuation::<()>::failed("broken")).recv().unwrap(),
        Err("broken".to_owned())
    );
}

#[test]
fn continuation_that_drops_completer_is_abandoned() {
    let continuation = Continuation::<()>::new(drop);
    assert_eq!(
        record(continuation).recv().unwrap(),
        Err(Error::Abandoned.to_string())
    );
}

#[test]
fn from_async_reports_panic_in_end() {
    let continuation = Continuation::<()>::from_async(
        |callback: AsyncCallback<()>| callback(()),
        |()| -> Result<(), BoxError> { panic!("end blew up") },
    );
    assert_eq!(
        record(continuation).recv().unwrap(),
        Err("panicked: end blew up".to_owned())
    );
}

#[test]
fn coroutine_state_starts_lazily() {
    let started = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&started);
    let state = CoroutineState::new(Continuation::new(move |done| {
        *flag.lock().unwrap() = true;
        done.succeed(1);
    }));
    assert!(!*started.lock().unwrap());
    assert!(matches!(state.result(), Err(Error::NotSettled)));
    assert_eq!(record(state.wait()).recv().unwrap(), Ok(()));
    assert!(*started.lock().unwrap());
    assert!(state.is_settled());
    assert_eq!(state.result().unwrap(), 1);
    assert!(matches!(state.result(), Err(Error::Taken)));
}

#[test]
fn coroutine_state_wait_never_fails() {
    let state = CoroutineState::<()>::new(Continuation::failed("inner"));
    assert_eq!(record(state.wait()).recv().unwrap(), Ok(()));
    assert!(state.is_faulted());
    match state.result() {
        Err(Error::Surfaced(cause)) => assert_eq!(cause.to_string(), "inner"),
        other => panic!("expected a surfaced failure, got {other:?}"),
    }
    assert!(!state.is_faulted());
}

#[test]
fn coroutine_state_wakes_every_waiter_once() {
    let (start_tx, start_rx) = mpsc::channel::<Completer<i32>>();
    let start_tx = Mutex::new(start_tx);
    let state = CoroutineState::new(Continuation::new(move |done| {
        start_tx.lock().unwrap().send(done).unwrap();
    }));
    let first = record(state.wait());
    let second = record(state.wait());
    assert!(first.try_recv().is_err());
    assert!(second.try_recv().is_err());
    start_rx.recv().unwrap().succeed(5);
    assert_eq!(first.recv().unwrap(), Ok(()));
    assert_eq!(second.recv().unwrap(), Ok(()));
    assert_eq!(record(state.wait()).recv().unwrap(), Ok(()));
    assert_eq!(state.result().unwrap(), 5);
}

#[test]
fn synchronous_waits_do_not_grow_the_stack() {
    let mut remaining: u32 = 200_000;
    let body = from_fn(move || {
        Ok(match remaining {
            0 => None,
            1 => {
                remaining = 0;
                Some(Step::Done("deep"))
            }
            _ => {
                remaining -= 1;
                Some(Step::wait(Continuation::ready(())))
            }
        })
    });
    assert_eq!(run_to_completion(body, None).wait().unwrap(), "deep");
}

#[test]
fn body_panic_becomes_body_fault() {
    let body = from_fn(|| -> Result<Option<Step<()>>, BoxError> {
        panic!("inside body")
    });
    let error = run_to_completion(body, None).wait().unwrap_err();
    assert!(matches!(error, Error::Body(_)));
    assert_eq!(error.root_cause().to_string(), "panicked: inside body");
}

#[test]
fn exhausted_body_settles_no_result() {
    let error = run_to_completion(vec![Step::<()>::Continue].into_body(), None)
        .wait()
        .unwrap_err();
    assert!(matches!(error, Error::NoResult));
}

#[test]
fn into_continuation_without_result_fails() {
    let continuation = into_continuation(Vec::<Step<u8>>::new().into_body(), None);
    assert_eq!(
        record(continuation).recv().unwrap(),
        Err(Error::NoResult.to_string())
    );
}

#[test]
fn pending_result_is_ready_after_synchronous_run() {
    let mut pending = vec![Step::Done(8)].into_body().run(None);
    assert_eq!(pending.try_result().unwrap().unwrap(), 8);
}

#[test]
fn pending_result_not_ready_while_suspended() {
    let (start_tx, start_rx) = mpsc::channel::<Completer<()>>();
    let start_tx = Mutex::new(start_tx);
    let operation = Continuation::new(move |done| {
        start_tx.lock().unwrap().send(done).unwrap();
    });
    let mut pending =
        vec![Step::Await(operation), Step::Done(1)].into_body().run(None);
    assert!(pending.try_result().is_none());
    start_rx.recv().unwrap().succeed(());
    assert_eq!(pending.try_result().unwrap().unwrap(), 1);
}

#[test]
fn dropped_resumption_is_abandoned() {
    let discard: Trampoline = Arc::new(drop::<Job>);
    let body = vec![Step::wait(Continuation::ready(())), Step::Done(1)]
        .into_body();
    let error = run_to_completion(body, Some(discard)).wait().unwrap_err();
    assert!(matches!(error, Error::Abandoned));
}

#[test]
fn panicked_message_from_payloads() {
    let from_str = Panicked::from_payload(Box::new("static"));
    assert_eq!(from_str.message(), "static");
    let from_string = Panicked::from_payload(Box::new(String::from("owned")));
    assert_eq!(from_string.message(), "owned");
    let opaque = Panicked::from_payload(Box::new(17_u32));
    assert_eq!(opaque.message(), "<non-string panic payload>");
}
