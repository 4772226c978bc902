//! Reactor timer ordering tests

use std::time::Duration;

use later_core::{RunOutcome, defer_later};

use crate::common::{Log, virtual_reactor};

#[test]
fn shorter_delay_runs_strictly_first() {
    let reactor = virtual_reactor();
    let log = Log::new();
    let (slow, fast) = (log.clone(), log.clone());
    reactor.schedule_after(Duration::from_millis(20), move || slow.push("d2"));
    reactor.schedule_after(Duration::from_millis(10), move || fast.push("d1"));

    assert_eq!(reactor.run(), Ok(RunOutcome::Idle));
    assert_eq!(log.entries(), vec!["d1", "d2"]);
}

#[test]
fn settlement_drain_completes_before_next_timer() {
    let reactor = virtual_reactor();
    let log = Log::new();

    let d = defer_later(&reactor, Duration::from_secs(1), || Ok(1_u32));
    d.add_callback(log.passthrough("stage-1"));
    d.add_callback(log.passthrough("stage-2"));

    let other = log.clone();
    reactor.schedule_after(Duration::from_secs(1), move || other.push("next-timer"));

    reactor.run().unwrap();
    assert_eq!(log.entries(), vec!["stage-1:1", "stage-2:1", "next-timer"]);
}

#[test]
fn real_clock_honours_minimum_delay() {
    let reactor = later_core::Reactor::new();
    let d = defer_later(&reactor, Duration::from_millis(15), || Ok(()));
    let started = std::time::Instant::now();
    reactor.run().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(15));
    assert!(d.is_settled());
}
