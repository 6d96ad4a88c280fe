//! Replay a recorded input trace and print every interaction event as one
//! JSON line.
//!
//! Usage: `markwell-replay <trace.json>`. Set `RUST_LOG=debug` to see the
//! engine's diagnostics on stderr.

mod trace;

use std::io::Write;
use std::process::ExitCode;
use trace::{Replay, ReplayError, ReplayResult, Trace};

fn run(path: &str) -> ReplayResult<()> {
    let trace = Trace::load(path)?;
    let mut replay = Replay::new(&trace)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;
    replay.run(&trace.steps, |event| {
        if write_error.is_some() {
            return;
        }
        let line = serde_json::to_string(event).map_err(ReplayError::from).and_then(|json| {
            writeln!(out, "{json}").map_err(ReplayError::from)
        });
        if let Err(e) = line {
            write_error = Some(e);
        }
    })?;
    if let Some(e) = write_error {
        return Err(e);
    }

    let engine = replay.engine();
    log::info!(
        "Replay finished: {} annotations, {} selected, {} locked",
        engine.store().len(),
        engine.selection().count(),
        engine.locks().count_locked()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: markwell-replay <trace.json>");
        return ExitCode::from(2);
    };

    log::info!("Replaying {path}");
    match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Replay failed: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
