//! End-to-end runs of the demo routines on a virtual clock

use std::time::Duration;

use insta::assert_snapshot;
use later_config::{BuildUpWorkConfig, FetchConfig, LaterConfig, PrintLaterConfig};
use later_core::{Deferred, RunOutcome, SettleError, UnhandledFailures};
use later_engine::{Fetcher, PageStore, ResourceState, ScriptedFetcher, request_page};
use later_cli::{Transcript, build_reactor, demos};

use crate::common::{Log, virtual_reactor};

#[test]
fn print_later_prints_once_after_delay_and_goes_idle() {
    let reactor = virtual_reactor();
    let transcript = Transcript::captured();

    let outcome = demos::print_later(&reactor, &PrintLaterConfig::default(), &transcript).unwrap();

    assert_eq!(outcome, RunOutcome::Idle);
    assert_eq!(reactor.now(), Duration::from_secs(1));
    assert_snapshot!(transcript.text(), @"The future is now!");
}

#[test]
fn print_later_twice_prints_message_twice_in_order() {
    let reactor = virtual_reactor();
    let transcript = Transcript::captured();
    let config = PrintLaterConfig {
        message: "X".to_string(),
        delay_ms: 250,
    };

    let deferred = demos::print_later_twice(&reactor, &config, &transcript).unwrap();

    assert_eq!(transcript.lines(), vec!["X", "X"]);
    assert_eq!(deferred.result(), Some(Ok("X".to_string())));
    assert_eq!(reactor.now(), Duration::from_millis(250));
}

#[test]
fn build_up_work_delivers_once_after_initialization() {
    let reactor = virtual_reactor();
    let transcript = Transcript::captured();

    let database =
        demos::build_up_work(&reactor, &BuildUpWorkConfig::default(), &transcript).unwrap();

    assert_eq!(database.state(), ResourceState::Ready);
    assert_eq!(reactor.now(), Duration::from_secs(3));
    assert_snapshot!(transcript.text(), @r"
    Database update scheduled.
    Starting reactor.
    Done updating.
    db_result
    ");
}

#[test]
fn settling_twice_is_rejected_without_side_effects() {
    let log = Log::new();
    let d = Deferred::new();
    d.add_callback(log.passthrough("stage"));

    assert_eq!(d.settle_success("once".to_string()), Ok(()));
    assert_eq!(
        d.settle_success("twice".to_string()),
        Err(SettleError::AlreadySettled)
    );

    assert_eq!(log.entries(), vec!["stage:once"]);
    assert_eq!(d.result(), Some(Ok("once".to_string())));
}

#[test]
fn failing_fetch_runs_only_the_failure_path() {
    let reactor = virtual_reactor();
    let fetcher = ScriptedFetcher::new(&reactor, Duration::from_millis(100));
    let store = PageStore::new();
    let transcript = Transcript::captured();

    let d = request_page(&fetcher, "a_bad_url", &store, &transcript.notify());
    reactor.run().unwrap();

    assert_snapshot!(transcript.text(), @"Failed to download `a_bad_url`.");
    assert_eq!(store.get("a_bad_url"), Some(None));
    assert_eq!(d.result(), Some(Ok(None)));
}

#[test]
fn fetch_failure_without_a_handler_is_reported() {
    let unhandled = UnhandledFailures::capture();
    let reactor = virtual_reactor();
    let fetcher = ScriptedFetcher::new(&reactor, Duration::ZERO).failing("http://down.test/");

    drop(fetcher.fetch("http://down.test/"));
    reactor.run().unwrap();

    let failures = unhandled.take();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].reason().contains("refused"));
}

#[test]
fn fetch_pages_reports_every_url_and_stops() {
    let reactor = virtual_reactor();
    let transcript = Transcript::captured();

    let store = demos::fetch_pages(&reactor, &FetchConfig::default(), &transcript).unwrap();

    assert_eq!(store.len(), 6);
    assert_eq!(store.downloaded(), 5);
    assert!(!reactor.is_running());
    assert_snapshot!(transcript.text(), @r"
    Successfully downloaded `http://www.google.com`.
    Successfully downloaded `http://www.twitter.com`.
    Successfully downloaded `http://www.facebook.com`.
    Successfully downloaded `http://www.apple.com`.
    Successfully downloaded `http://www.oracle.com`.
    Failed to download `a_bad_url`.
    Downloaded 5 of 6 pages.
    ");
}

#[test]
fn configured_virtual_clock_drives_demos() {
    let config = LaterConfig::parse(
        r#"
        [reactor]
        clock = "virtual"

        [fetch]
        urls = ["http://one.test/", "http://two.test/"]
        failing = ["http://two.test/"]
        latency_ms = 5000
        "#,
    )
    .unwrap();
    let reactor = build_reactor(&config);
    let transcript = Transcript::captured();

    let store = demos::fetch_pages(&reactor, &config.fetch(), &transcript).unwrap();

    assert_eq!(reactor.now(), Duration::from_secs(5));
    assert_eq!(store.downloaded(), 1);
    assert_snapshot!(transcript.text(), @r"
    Successfully downloaded `http://one.test/`.
    Failed to download `http://two.test/`.
    Downloaded 1 of 2 pages.
    ");
}
