//! Centralised tracing initialisation for the trakr binary.
//!
//! Call [`init_tracing`] once at program start. It installs:
//!
//! - a console layer on stderr (plain or JSON), and
//! - an optional audit layer appending plain lines to a log file.
//!
//! Both layers share one `EnvFilter`. Safe to call more than once;
//! subsequent calls are silently ignored (the global subscriber can only be
//! set once per process).

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON on the console.
/// * `level`: default verbosity when `RUST_LOG` is not set.
/// * `audit_log`: file that receives one line per event, opened in append mode.
///
/// Returns an error only when the audit log cannot be opened.
pub fn init_tracing(json: bool, level: Level, audit_log: Option<&Path>) -> std::io::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let audit_layer = match audit_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(audit_layer)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(audit_layer)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
    Ok(())
}
