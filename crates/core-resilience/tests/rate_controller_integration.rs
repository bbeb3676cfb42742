use cpio_core_async::errors::SC_UNKNOWN;
use cpio_core_async::{AsyncContext, AsyncOperation, ExecutionResult, FnOperation};
use cpio_core_resilience::prelude::*;
use cpio_core_resilience::{SC_DISPATCHER_EXHAUSTED_RETRIES, SC_RATE_CONTROLLER_THROTTLED};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

type Ctx = AsyncContext<String, String>;
type Parked = Arc<Mutex<Vec<Ctx>>>;

/// Provider that keeps every context it receives without finishing it
fn parking_provider(parked: &Parked) -> impl AsyncOperation<String, String> {
    let sink = Arc::clone(parked);
    FnOperation::new(move |ctx: Ctx| {
        sink.lock().unwrap().push(ctx);
        ExecutionResult::success()
    })
}

/// Slots are released just after the caller's callback returns, so a caller
/// woken by that callback can observe the counter before it drops.
fn wait_until_idle<Op>(controller: &RateController<Op>) -> usize {
    for _ in 0..1_000 {
        if controller.outstanding() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    controller.outstanding()
}

#[test]
fn test_k_never_completing_contexts_then_throttle() {
    let k = 5;
    let parked = Parked::default();
    let controller =
        RateController::new("params", parking_provider(&parked), RateControllerConfig::with_max(k))
            .unwrap();

    for i in 0..k {
        let result = controller.submit(Ctx::new(Arc::new(format!("req-{i}")), |_| {}));
        assert!(result.successful(), "submit {} was not accepted", i);
    }

    let invoked = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&invoked);
    let rejected = controller.submit(Ctx::new(Arc::new("overflow".into()), move |_| {
        flag.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(rejected, ExecutionResult::retry(SC_RATE_CONTROLLER_THROTTLED));
    // the rejection is synchronous only; the callback never fires
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    // completing one in-flight context frees a slot
    let ctx = parked.lock().unwrap().remove(0);
    ctx.finish_with_response("done".into());
    assert!(controller
        .submit(Ctx::new(Arc::new("after".into()), |_| {}))
        .successful());
    assert_eq!(controller.outstanding(), k);
}

#[test]
fn test_passthrough_of_result_and_response() {
    let parked = Parked::default();
    let controller =
        RateController::new("params", parking_provider(&parked), RateControllerConfig::with_max(4))
            .unwrap();

    let (tx, rx) = mpsc::channel();
    for name in ["ok", "retry", "fail"] {
        let tx = tx.clone();
        controller.submit(Ctx::new(Arc::new(name.to_string()), move |ctx| {
            tx.send((ctx.request.to_string(), ctx.result, ctx.response.clone()))
                .unwrap();
        }));
    }

    let contexts: Vec<Ctx> = parked.lock().unwrap().drain(..).collect();
    for mut ctx in contexts {
        match ctx.request.as_str() {
            "ok" => ctx.finish_with_response("value".into()),
            "retry" => {
                ctx.response = Some(Arc::new("partial".into()));
                ctx.finish_with(ExecutionResult::retry(SC_UNKNOWN));
            }
            _ => ctx.finish_with(ExecutionResult::failure(SC_UNKNOWN)),
        }
    }

    let mut seen: Vec<_> = rx.try_iter().collect();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(seen.len(), 3);

    assert_eq!(seen[0].0, "fail");
    assert_eq!(seen[0].1, ExecutionResult::failure(SC_UNKNOWN));
    assert!(seen[0].2.is_none());

    assert_eq!(seen[1].0, "ok");
    assert!(seen[1].1.successful());
    assert_eq!(seen[1].2.as_deref().map(String::as_str), Some("value"));

    assert_eq!(seen[2].0, "retry");
    assert_eq!(seen[2].1, ExecutionResult::retry(SC_UNKNOWN));
    assert_eq!(seen[2].2.as_deref().map(String::as_str), Some("partial"));

    assert_eq!(controller.outstanding(), 0);
}

#[test]
fn test_completion_on_worker_threads_releases_all_slots() {
    let controller = Arc::new(
        RateController::new(
            "threads",
            FnOperation::new(|ctx: Ctx| {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(2));
                    let reply = ctx.request.to_uppercase();
                    ctx.finish_with_response(reply);
                });
                ExecutionResult::success()
            }),
            RateControllerConfig::with_max(64),
        )
        .unwrap(),
    );

    let completions: Vec<_> = (0..32)
        .map(|i| {
            let (ctx, completion) = Ctx::with_completion(Arc::new(format!("p{i}")));
            assert!(controller.submit(ctx).successful());
            completion
        })
        .collect();

    for (i, completion) in completions.into_iter().enumerate() {
        let done = completion.wait().unwrap();
        assert_eq!(
            done.response.as_deref().map(String::as_str),
            Some(format!("P{i}").as_str())
        );
    }
    assert_eq!(wait_until_idle(&controller), 0);
    assert_eq!(controller.state().admitted_total, 32);
}

#[test]
fn test_best_effort_overshoot_is_bounded_by_racers() {
    let racers = 8;
    let max = 2;
    let parked = Parked::default();
    let controller = Arc::new(
        RateController::new("race", parking_provider(&parked), RateControllerConfig::with_max(max))
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(racers));

    let handles: Vec<_> = (0..racers)
        .map(|i| {
            let controller = Arc::clone(&controller);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                controller.submit(Ctx::new(Arc::new(i.to_string()), |_| {}))
            })
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.successful())
        .count();

    assert!(accepted >= max);
    assert!(accepted <= racers);
    assert_eq!(controller.outstanding(), accepted);
    assert_eq!(parked.lock().unwrap().len(), accepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatcher_retries_throttled_submits() {
    let controller = Arc::new(
        RateController::new(
            "dispatch",
            FnOperation::new(|ctx: Ctx| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let reply = format!("{}!", ctx.request);
                    ctx.finish_with_response(reply);
                });
                ExecutionResult::success()
            }),
            RateControllerConfig::with_max(2),
        )
        .unwrap(),
    );
    let dispatcher = OperationDispatcher::current(
        RetryStrategy::new(BackoffKind::Linear, Duration::from_millis(5), 50)
            .with_max_delay(Duration::from_millis(20)),
    )
    .unwrap();

    let completions: Vec<_> = (0..10)
        .map(|i| {
            let (ctx, completion) = Ctx::with_completion(Arc::new(format!("n{i}")));
            dispatcher.dispatch(ctx, Arc::clone(&controller));
            completion
        })
        .collect();

    let mut retried = 0;
    for (i, completion) in completions.into_iter().enumerate() {
        let done = completion.await.unwrap();
        assert!(done.result.successful(), "{}", done.result);
        assert_eq!(
            done.response.as_deref().map(String::as_str),
            Some(format!("n{i}!").as_str())
        );
        retried += done.retry_count;
    }

    assert!(retried > 0, "saturation should have forced retries");
    assert_eq!(wait_until_idle(&controller), 0);
    assert!(controller.state().throttled_total > 0);
}

#[tokio::test]
async fn test_dispatcher_gives_up_when_never_admitted() {
    let parked = Parked::default();
    let controller = Arc::new(
        RateController::new("stuck", parking_provider(&parked), RateControllerConfig::with_max(1))
            .unwrap(),
    );
    let dispatcher = OperationDispatcher::current(RetryStrategy::new(
        BackoffKind::Linear,
        Duration::from_millis(1),
        3,
    ))
    .unwrap();

    // occupy the only slot forever
    assert!(controller
        .submit(Ctx::new(Arc::new("holder".into()), |_| {}))
        .successful());

    let (ctx, completion) = Ctx::with_completion(Arc::new("waiter".into()));
    dispatcher.dispatch(ctx, Arc::clone(&controller));

    let done = completion.await.unwrap();
    assert_eq!(
        done.result,
        ExecutionResult::failure(SC_DISPATCHER_EXHAUSTED_RETRIES)
    );
    assert_eq!(done.retry_count, 3);
    assert_eq!(controller.state().throttled_total, 4);
}
