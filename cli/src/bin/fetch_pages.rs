//! Request a batch of pages and report which downloads succeeded.

use anyhow::Result;

use later_cli::{Transcript, build_reactor, demos, init_tracing, load_config};

fn main() -> Result<()> {
    init_tracing();
    let config = load_config()?;
    let reactor = build_reactor(&config);

    let store = demos::fetch_pages(&reactor, &config.fetch(), &Transcript::stdout())?;
    for (url, page) in store.snapshot() {
        match page {
            Some(page) => tracing::info!(%url, bytes = page.body.len(), "Stored page"),
            None => tracing::info!(%url, "No page stored"),
        }
    }
    Ok(())
}
