//! Logging setup for programs and tests that run the trivalent passes.
//!
//! The passes only emit events through [tracing] macros and never install a subscriber. A host
//! flattens [`Options`] into its own `clap` parser and calls [`Options::init`] once; tests call
//! [`init_test_logging`].

use clap::{Args, ValueEnum};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod error;
pub use error::Error;

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One abbreviated line per event
    Compact,
    /// One line per event, with every enclosing span's fields
    Full,
    /// Multi-line, human-oriented output
    Pretty,
    /// Newline-delimited JSON objects
    Json,
}

#[derive(Debug, Clone, Args)]
#[group(id = "logging")]
pub struct Options {
    /// Rendering of log lines
    #[arg(long, env = "LOG_FORMAT", default_value = "full", value_enum)]
    pub log_format: LogFormat,

    /// Never emit ANSI color codes
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Which spans and events to keep, as comma-separated [`EnvFilter`] directives.
    ///
    /// `info` keeps everything at INFO and above. `warn,trivalent_passes=trace` additionally shows
    /// the tree after every pass.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Full,
            no_color: false,
            log_level: "info".to_owned(),
        }
    }
}

impl Options {
    /// Builds the [`EnvFilter`] described by `log_level`.
    pub fn env_filter(&self) -> Result<EnvFilter, Error> {
        Ok(EnvFilter::builder().parse(&self.log_level)?)
    }

    /// Install a global subscriber configured by these options.
    ///
    /// Fails if the filter directives don't parse, or if a global subscriber has already been
    /// installed in this process.
    pub fn init(&self) -> Result<(), Error> {
        let registry = tracing_subscriber::registry().with(self.env_filter()?);
        let ansi = !self.no_color;
        match self.log_format {
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_ansi(ansi))
                .try_init()?,
            LogFormat::Full => registry.with(fmt::layer().with_ansi(ansi)).try_init()?,
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_ansi(ansi))
                .try_init()?,
            LogFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true))
                .try_init()?,
        }
        debug!(log_format = ?self.log_format, log_level = %self.log_level, "Logging initialized");
        Ok(())
    }
}

/// Send log output to the test harness, filtered by `LOG_LEVEL`. Safe to call repeatedly.
pub fn init_test_logging() {
    // Every test calls this, and only the first one in the process can install a subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("LOG_LEVEL"))
        .with_test_writer()
        .try_init();
}
