// Integration tests for the public API of corun.
//
// These drive bodies end to end: through the driver, across threads, and
// through the adapters, observing only what a user of the crate can see.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use corun::*;
use futures::executor::ThreadPool;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Shared, ordered record of what happened during a test.
#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Something a body owns whose release is observable.
struct Resource {
    name: &'static str,
    events: Events,
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.events.push(format!("dispose {}", self.name));
    }
}

/// Runs `body` with callbacks that record into `events`, and blocks until
/// one of them has been called or the chain has been dropped.
fn drive_recorded<T, B>(body: B, events: &Events, trampoline: Option<Trampoline>)
where
    T: std::fmt::Debug + Send + 'static,
    B: Body<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<()>();
    let on_result = events.clone();
    let on_failure = events.clone();
    let failed = tx.clone();
    drive(
        body,
        move |value| {
            on_result.push(format!("result {value:?}"));
            tx.send(()).unwrap();
        },
        move |error| {
            on_failure.push(format!("failure {}", error.root_cause()));
            failed.send(()).unwrap();
        },
        trampoline,
    );
    // Neither callback fires for a body without a result, and the senders
    // are dropped along with the chain.
    let _ = rx.recv_timeout(Duration::from_secs(10));
}

/// A continuation that completes on a fresh thread after a short pause.
fn later(outcome: Result<(), &'static str>) -> Continuation<()> {
    Continuation::new(move |done| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            done.complete(outcome);
        });
    })
}

#[test]
fn body_without_result_calls_no_callback() {
    init_tracing();
    let events = Events::default();
    let resource = Resource {
        name: "file",
        events: events.clone(),
    };
    let mut steps = vec![Step::<i32>::Continue, Step::wait(later(Ok(())))];
    let body = from_fn(move || {
        let _held = &resource;
        Ok(steps.pop())
    });
    drive_recorded(body, &events, None);
    assert_eq!(events.take(), ["dispose file"]);
}

#[test]
fn cleanup_runs_after_result_and_before_callback() {
    init_tracing();
    let events = Events::default();
    let resource = Resource {
        name: "connection",
        events: events.clone(),
    };
    let log = events.clone();
    let mut stage = 0;
    let body = from_fn(move || {
        let _held = &resource;
        stage += 1;
        Ok(match stage {
            1 => Some(Step::wait(later(Ok(())))),
            2 => Some(Step::Done("answer")),
            3 => {
                log.push("cleanup");
                Some(Step::Continue)
            }
            _ => None,
        })
    });
    drive_recorded(body, &events, None);
    assert_eq!(
        events.take(),
        ["cleanup", "dispose connection", "result \"answer\""]
    );
}

#[test]
fn immediate_fault_reports_body_failure() {
    init_tracing();
    let events = Events::default();
    let resource = Resource {
        name: "lock",
        events: events.clone(),
    };
    let body = from_fn(move || -> Result<Option<Step<()>>, BoxError> {
        let _held = &resource;
        Err("invalid operation".into())
    });
    let error = run_to_completion(body, None).wait().unwrap_err();
    assert!(matches!(error, Error::Body(_)));
    assert_eq!(error.root_cause().to_string(), "invalid operation");
    assert_eq!(events.take(), ["dispose lock"]);
}

#[test]
fn fault_after_result_replaces_result() {
    init_tracing();
    let mut stage = 0;
    let body = from_fn(move || {
        stage += 1;
        match stage {
            1 => Ok(Some(Step::Done(1))),
            _ => Err("cleanup failed".into()),
        }
    });
    let error = run_to_completion(body, None).wait().unwrap_err();
    assert_eq!(error.root_cause().to_string(), "cleanup failed");
}

#[test]
fn deferred_operation_failure_is_reported_once() {
    init_tracing();
    let events = Events::default();
    let resource = Resource {
        name: "socket",
        events: events.clone(),
    };
    let read = wrap_async(
        |callback: AsyncCallback<Vec<u8>>| {
            thread::spawn(move || callback(vec![0xff, 0xfe]));
        },
        String::from_utf8,
    );
    let mut steps = vec![Step::<String>::Done("unreachable".into()), Step::wait(read)];
    let body = from_fn(move || {
        let _held = &resource;
        Ok(steps.pop())
    });
    drive_recorded(body, &events, None);
    let recorded = events.take();
    assert_eq!(recorded.len(), 2, "{recorded:?}");
    assert_eq!(recorded[0], "dispose socket");
    assert!(recorded[1].starts_with("failure invalid utf-8"), "{recorded:?}");
}

#[test]
fn operation_failure_is_an_operation_error() {
    init_tracing();
    let body = vec![Step::wait(later(Err("timed out"))), Step::Done(())].into_body();
    let error = run_to_completion(body, None).wait().unwrap_err();
    assert!(matches!(error, Error::Operation(_)));
    assert_eq!(error.root_cause().to_string(), "timed out");
}

#[test]
fn state_failure_surfaces_only_when_read() {
    init_tracing();
    let state = CoroutineState::<u8>::new(later(Err("disk full")).map(|()| 0));
    let observed = state.clone();
    let mut stage = 0;
    let body = from_fn(move || {
        stage += 1;
        Ok(match stage {
            1 => Some(Step::on(&observed)),
            2 => {
                assert!(observed.is_faulted());
                Some(Step::Done("kept going"))
            }
            _ => None,
        })
    });
    assert_eq!(run_to_completion(body, None).wait().unwrap(), "kept going");
    let error = state.result().unwrap_err();
    assert!(matches!(error, Error::Surfaced(_)));
    assert_eq!(error.root_cause().to_string(), "disk full");
}

fn nested(depth: u32) -> CoroutineState<u32> {
    if depth == 0 {
        return as_coroutine_state(
            vec![Step::wait(later(Ok(()))), Step::Done(0)].into_body(),
            None,
        );
    }
    let mut inner = None;
    let mut stage = 0;
    as_coroutine_state(
        from_fn(move || {
            stage += 1;
            Ok(match stage {
                1 => Some(Step::on(inner.insert(nested(depth - 1)))),
                2 => {
                    let value = inner.as_ref().map(CoroutineState::result);
                    Some(Step::Done(value.ok_or("no inner state")?? + 1))
                }
                _ => None,
            })
        }),
        None,
    )
}

#[test]
fn nested_coroutines_propagate_results() {
    init_tracing();
    let outer = nested(52);
    let mut stage = 0;
    let waiter = outer.clone();
    let body = from_fn(move || {
        stage += 1;
        Ok(match stage {
            1 => Some(Step::on(&waiter)),
            2 => Some(Step::Done(waiter.result()?)),
            _ => None,
        })
    });
    assert_eq!(run_to_completion(body, None).wait().unwrap(), 52);
}

#[test]
fn nested_failure_keeps_root_cause() {
    init_tracing();
    let innermost = as_coroutine_state(
        from_fn(|| -> Result<Option<Step<u8>>, BoxError> {
            Err(Box::new(std::io::Error::other("not found")))
        }),
        None,
    );
    let mut stage = 0;
    let middle = as_coroutine_state(
        from_fn(move || {
            stage += 1;
            Ok(match stage {
                1 => Some(Step::on(&innermost)),
                2 => Some(Step::Done(innermost.result()?)),
                _ => None,
            })
        }),
        None,
    );
    let mut stage = 0;
    let outer = from_fn(move || {
        stage += 1;
        Ok(match stage {
            1 => Some(Step::on(&middle)),
            2 => Some(Step::Done(middle.result()?)),
            _ => None,
        })
    });
    let error = run_to_completion(outer, None).wait().unwrap_err();
    assert!(matches!(error, Error::Body(_)));
    assert_eq!(error.root_cause().to_string(), "not found");
}

#[test]
fn trampoline_receives_every_resumption() {
    init_tracing();
    let dispatched = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&dispatched);
    let trampoline: Trampoline = Arc::new(move |job: Job| {
        *counter.lock().unwrap() += 1;
        thread::spawn(job);
    });
    let body = vec![
        Step::wait(Continuation::ready(())),
        Step::Continue,
        Step::wait(later(Ok(()))),
        Step::Done("bounced"),
    ]
    .into_body();
    let pending = run_to_completion(body, Some(trampoline));
    assert_eq!(pending.wait().unwrap(), "bounced");
    assert_eq!(*dispatched.lock().unwrap(), 2);
}

#[test]
fn panicking_continuation_is_a_dispatch_fault() {
    init_tracing();
    let events = Events::default();
    let resource = Resource {
        name: "buffer",
        events: events.clone(),
    };
    let exploding = Continuation::<()>::new(|_| panic!("cannot start"));
    let mut steps = vec![Step::<()>::Done(()), Step::Await(exploding)];
    let body = from_fn(move || {
        let _held = &resource;
        Ok(steps.pop())
    });
    let error = run_to_completion(body, None).wait().unwrap_err();
    assert!(matches!(error, Error::Dispatch(_)));
    assert_eq!(error.root_cause().to_string(), "panicked: cannot start");
    assert_eq!(events.take(), ["dispose buffer"]);
}

#[test]
fn future_continuation_runs_on_thread_pool() {
    init_tracing();
    let pool = ThreadPool::new().unwrap();
    let fetched = CoroutineState::new(Continuation::from_future(
        async { Ok::<_, BoxError>(40) },
        pool.clone(),
    ));
    let failing = CoroutineState::<u8>::new(Continuation::from_future(
        async { Err::<u8, _>("refused") },
        pool,
    ));
    let mut stage = 0;
    let body = from_fn(move || {
        stage += 1;
        Ok(match stage {
            1 => Some(Step::on(&fetched)),
            2 => Some(Step::on(&failing)),
            3 => {
                let refused = failing.result().unwrap_err();
                assert_eq!(refused.root_cause().to_string(), "refused");
                Some(Step::Done(fetched.result()? + 2))
            }
            _ => None,
        })
    });
    let answer = futures::executor::block_on(run_to_completion(body, None));
    assert_eq!(answer.unwrap(), 42);
}

#[test]
fn either_picks_a_body_at_runtime() {
    init_tracing();
    fn choose(fast: bool) -> impl Body<&'static str> + Send + 'static {
        if fast {
            either::Left(vec![Step::Done("fast")].into_body())
        } else {
            either::Right(
                vec![Step::wait(later(Ok(()))), Step::Done("slow")].into_body(),
            )
        }
    }
    assert_eq!(choose(true).run(None).wait().unwrap(), "fast");
    assert_eq!(choose(false).run(None).wait().unwrap(), "slow");
}

#[test]
fn body_continuation_composes_with_state() {
    init_tracing();
    let state = vec![Step::Continue, Step::Done('z')]
        .into_body()
        .into_state(None);
    assert!(!state.is_settled());
    let (tx, rx) = mpsc::channel();
    state.wait().invoke(move |()| tx.send(()).unwrap(), |e| panic!("{e}"));
    rx.recv().unwrap();
    assert_eq!(state.result().unwrap(), 'z');
}
