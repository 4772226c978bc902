//! The four demo routines.
//!
//! Each one wires deferreds onto the given reactor, runs it, and writes what
//! it observes to a [`Transcript`].

use anyhow::Result;

use later_config::{BuildUpWorkConfig, FetchConfig, PrintLaterConfig};
use later_core::{Deferred, Outcome, Reactor, RunOutcome, defer_later};
use later_engine::{LazyResource, PageStore, ScriptedFetcher, request_pages};

use crate::Transcript;

/// Print the configured message once, after the configured delay.
///
/// Nothing stops the reactor; it returns once the timer has fired and no
/// work is left.
pub fn print_later(
    reactor: &Reactor,
    config: &PrintLaterConfig,
    transcript: &Transcript,
) -> Result<RunOutcome> {
    let message = config.message.clone();
    let out = transcript.clone();
    defer_later(reactor, config.delay(), move || {
        out.line(message);
        Ok(())
    });

    Ok(reactor.run()?)
}

fn print_and_passthrough(
    transcript: &Transcript,
) -> impl FnOnce(String) -> Outcome<String> + use<> {
    let transcript = transcript.clone();
    move |value| {
        transcript.line(value.clone());
        Ok(value)
    }
}

/// Attach two print-and-passthrough stages, then settle with the message
/// after the delay: the message is printed twice, in order.
pub fn print_later_twice(
    reactor: &Reactor,
    config: &PrintLaterConfig,
    transcript: &Transcript,
) -> Result<Deferred<String>> {
    let deferred = Deferred::new();
    deferred.add_callback(print_and_passthrough(transcript));
    deferred.add_callback(print_and_passthrough(transcript));

    let target = deferred.clone();
    let message = config.message.clone();
    reactor.schedule_after(config.delay(), move || {
        if let Err(err) = target.settle_success(message) {
            tracing::error!(%err, "Message deferred settled twice");
        }
    });

    reactor.run()?;
    Ok(deferred)
}

/// Queue work against a database that only becomes available after the
/// configured delay.
///
/// Expected transcript:
///
/// ```text
/// Database update scheduled.
/// Starting reactor.
/// Done updating.
/// db_result
/// ```
pub fn build_up_work(
    reactor: &Reactor,
    config: &BuildUpWorkConfig,
    transcript: &Transcript,
) -> Result<LazyResource<String>> {
    let update = Deferred::new();
    let target = update.clone();
    let value = config.value.clone();
    reactor.schedule_after(config.init_delay(), move || {
        if let Err(err) = target.settle_success(value) {
            tracing::error!(%err, "Database update settled twice");
        }
    });

    let out = transcript.clone();
    update.add_callback(move |value| {
        out.line("Done updating.");
        Ok(value)
    });
    let database = LazyResource::from_deferred("database", &update);
    transcript.line("Database update scheduled.");

    // Requested before the database exists; delivered once it does.
    database
        .get_value()
        .add_callback(print_and_passthrough(transcript));

    transcript.line("Starting reactor.");
    reactor.run()?;
    Ok(database)
}

/// Request every configured URL and stop the reactor once all of them have
/// settled.
pub fn fetch_pages(
    reactor: &Reactor,
    config: &FetchConfig,
    transcript: &Transcript,
) -> Result<PageStore> {
    let fetcher = config
        .failing
        .iter()
        .fold(ScriptedFetcher::new(reactor, config.latency()), |fetcher, url| {
            fetcher.failing(url.clone())
        });
    let store = PageStore::new();

    let all = request_pages(&fetcher, &config.urls, &store, &transcript.notify());
    let stopper = reactor.clone();
    all.observe(move |_| stopper.stop());

    let outcome = reactor.run()?;
    tracing::debug!(?outcome, pages = store.len(), "Fetch run finished");

    transcript.line(format!(
        "Downloaded {} of {} pages.",
        store.downloaded(),
        config.urls.len()
    ));
    Ok(store)
}
