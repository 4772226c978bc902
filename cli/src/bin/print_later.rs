//! Print a message once, one second from now.

use anyhow::Result;

use later_cli::{Transcript, build_reactor, demos, init_tracing, load_config};

fn main() -> Result<()> {
    init_tracing();
    let config = load_config()?;
    let reactor = build_reactor(&config);

    let outcome = demos::print_later(&reactor, &config.print_later(), &Transcript::stdout())?;
    tracing::debug!(?outcome, "Reactor returned");
    Ok(())
}
