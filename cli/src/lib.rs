//! Shared plumbing for the later demo binaries.
//!
//! # Architecture
//!
//! Each binary is a thin `main` over one routine in [`demos`]:
//!
//! ```text
//! main() -> init_tracing() -> load_config() -> build_reactor() -> demos::*()
//!                                                                   |
//!                                                                   v
//!                                                   Transcript (stdout lines)
//! ```
//!
//! Logs go to stderr through `tracing`; the demo transcript goes to stdout.
//! Tests run the same routines on a virtual clock with a captured transcript.

pub mod demos;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use later_config::{ClockMode, LaterConfig};
use later_core::Reactor;
use later_engine::Notify;

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// Load the optional config file; a missing file means defaults.
pub fn load_config() -> Result<LaterConfig> {
    let config = LaterConfig::load().context("failed to load later config")?;
    if config.is_none() {
        tracing::debug!("Using default configuration");
    }
    Ok(config.unwrap_or_default())
}

#[must_use]
pub fn build_reactor(config: &LaterConfig) -> Reactor {
    match config.clock() {
        ClockMode::System => Reactor::new(),
        ClockMode::Virtual => Reactor::with_virtual_clock(),
    }
}

/// Lines a demo prints, in order.
///
/// An echoing transcript also writes each line to stdout as it is produced;
/// a captured one only records.
#[derive(Debug, Clone)]
pub struct Transcript {
    lines: Rc<RefCell<Vec<String>>>,
    echo: bool,
}

impl Transcript {
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            lines: Rc::default(),
            echo: true,
        }
    }

    #[must_use]
    pub fn captured() -> Self {
        Self {
            lines: Rc::default(),
            echo: false,
        }
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            println!("{line}");
        }
        self.lines.borrow_mut().push(line);
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// The transcript joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.borrow().join("\n")
    }

    #[must_use]
    pub fn notify(&self) -> Notify {
        let transcript = self.clone();
        Rc::new(move |line| transcript.line(line))
    }
}
