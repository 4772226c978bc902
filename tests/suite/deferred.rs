//! Deferred settlement and stage ordering tests

use std::time::Duration;

use later_core::{Deferred, Failure, SettleError, UnhandledFailures};

use crate::common::{Log, settle_after, virtual_reactor};

#[test]
fn second_settlement_fails_and_keeps_first_result() {
    let log = Log::new();
    let d = Deferred::new();
    d.add_callback(log.passthrough("seen"));

    d.settle_success("first".to_string()).unwrap();
    assert_eq!(
        d.settle_success("second".to_string()),
        Err(SettleError::AlreadySettled)
    );
    assert_eq!(d.settle_failure("late"), Err(SettleError::AlreadySettled));

    assert_eq!(log.entries(), vec!["seen:first"]);
    assert_eq!(d.result(), Some(Ok("first".to_string())));
}

#[test]
fn chain_built_before_settlement_feeds_each_stage_the_prior_output() {
    let log = Log::new();
    let d = Deferred::<u32>::new();
    d.add_callback(|n| Ok(n + 1))
        .add_callback(log.passthrough("a"))
        .add_callback(|n| Ok(n * 10))
        .add_callback(log.passthrough("b"));

    d.settle_success(1).unwrap();
    assert_eq!(log.entries(), vec!["a:2", "b:20"]);
}

#[test]
fn stages_attached_after_settlement_run_synchronously_in_order() {
    let log = Log::new();
    let d = Deferred::succeeded(5_u32);

    d.add_callback(log.passthrough("first"));
    assert_eq!(log.entries(), vec!["first:5"]);

    d.add_callback(|n| Ok(n + 1));
    d.add_callback(log.passthrough("second"));
    assert_eq!(log.entries(), vec!["first:5", "second:6"]);
}

#[test]
fn only_the_matching_handler_of_each_stage_runs() {
    let log = Log::new();
    let d = Deferred::<String>::new();
    let (ok_log, err_log) = (log.clone(), log.clone());
    d.add_callbacks(
        move |v| {
            ok_log.push("success");
            Ok(v)
        },
        move |f| {
            err_log.push("failure");
            Err(f)
        },
    );
    let (ok_log, err_log) = (log.clone(), log.clone());
    d.attach(
        Some(Box::new(move |v| {
            ok_log.push("success-2");
            Ok(v)
        })),
        Some(Box::new(move |_| {
            err_log.push("recovered");
            Ok("fallback".to_string())
        })),
    );
    d.add_callback(log.passthrough("after"));

    d.settle_failure("boom").unwrap();
    assert_eq!(log.entries(), vec!["failure", "recovered", "after:fallback"]);
}

#[test]
fn unhandled_failure_at_end_of_chain_is_not_dropped_silently() {
    let unhandled = UnhandledFailures::capture();
    let reactor = virtual_reactor();
    {
        let d = Deferred::<u32>::new();
        d.add_callback(|n| Ok(n + 1));
        let target = d.clone();
        reactor.schedule_after(Duration::from_secs(1), move || {
            target.settle_failure(Failure::new("lost")).unwrap();
        });
    }
    reactor.run().unwrap();

    let failures = unhandled.take();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason(), "lost");
}

#[test]
fn failures_do_not_stop_the_reactor() {
    let _unhandled = UnhandledFailures::capture();
    let reactor = virtual_reactor();
    let log = Log::new();

    let failing = Deferred::<String>::new();
    let target = failing.clone();
    reactor.schedule_after(Duration::from_secs(1), move || {
        target.settle_failure("first chain failed").unwrap();
    });
    drop(failing);

    let healthy = Deferred::new();
    healthy.add_callback(log.passthrough("healthy"));
    settle_after(&reactor, Duration::from_secs(2), &healthy, "ok".to_string());

    reactor.run().unwrap();
    assert_eq!(log.entries(), vec!["healthy:ok"]);
}
