use anyhow::Context;
use bulletind::{config, ipc, telemetry};
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let state = ipc::AppState::new(config::load_from_env()?);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bulletind ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request");
                let resp = ipc::rejected(ipc::ErrorCode::BadJson, e.to_string());
                writeln!(stdout, "{}", resp).context("write response")?;
                stdout.flush().context("flush response")?;
                continue;
            }
        };

        let resp = ipc::handle_request(&state, req);
        writeln!(stdout, "{}", resp).context("write response")?;
        stdout.flush().context("flush response")?;
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
