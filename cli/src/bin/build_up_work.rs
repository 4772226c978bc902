//! Queue work against a resource that is still initializing.

use anyhow::Result;

use later_cli::{Transcript, build_reactor, demos, init_tracing, load_config};

fn main() -> Result<()> {
    init_tracing();
    let config = load_config()?;
    let reactor = build_reactor(&config);

    let database = demos::build_up_work(&reactor, &config.build_up_work(), &Transcript::stdout())?;
    tracing::info!(state = ?database.state(), "Reactor returned");
    Ok(())
}
