//! Print a message twice through two chained stages, one second from now.

use anyhow::Result;

use later_cli::{Transcript, build_reactor, demos, init_tracing, load_config};

fn main() -> Result<()> {
    init_tracing();
    let config = load_config()?;
    let reactor = build_reactor(&config);

    demos::print_later_twice(&reactor, &config.print_later(), &Transcript::stdout())?;
    Ok(())
}
