//! Tracing setup for the sidecar.
//!
//! stdout carries the JSON protocol, so logs always go to stderr.
//! - `BULLETIND_LOG` sets the filter (default `info`).
//! - `BULLETIND_LOG_FORMAT=json` switches to JSON lines.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "BULLETIND_LOG";
pub const LOG_FORMAT_ENV: &str = "BULLETIND_LOG_FORMAT";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
