//! Gate a live helper's frame stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use motiongate_common::clock::SystemClock;
use motiongate_common::config::AppConfig;
use motiongate_core::MotionEngine;
use motiongate_process::{HelperPipes, HelperProcess};

use super::drive;

pub async fn run(config: AppConfig, helper: Vec<String>, all: bool) -> anyhow::Result<()> {
    let argv = if helper.is_empty() {
        config.capture.command.clone()
    } else {
        helper
    };
    if argv.is_empty() {
        anyhow::bail!("No helper command: pass one after `--` or set capture.command");
    }

    let mut process = HelperProcess::spawn(
        argv.as_slice(),
        HelperPipes::frame_source(config.capture.show_helper_stderr),
    )?;
    let stdout = process
        .take_stdout()
        .ok_or_else(|| anyhow::anyhow!("Helper stdout is not piped"))?;

    let clock = SystemClock::start();
    let mut engine =
        MotionEngine::with_clock(config.motion.clone(), stdout, Box::new(clock.clone()))?;

    eprintln!("# watching {} (started {})", process.program(), clock.epoch_wall());

    // Ctrl-C stops the helper; its stdout closes and the engine loop ends.
    let interrupted = Arc::new(AtomicBool::new(false));
    let terminator = process.terminator();
    let signal_task = {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(pid = terminator.pid(), "Interrupted, stopping helper");
                interrupted.store(true, Ordering::SeqCst);
                terminator.terminate();
            }
        })
    };

    let summary = tokio::task::spawn_blocking(move || {
        let mut out = std::io::stdout().lock();
        drive(&mut engine, &mut out, all, |_| {}, |now_ns| {
            Some(clock.wall_at(now_ns).to_rfc3339())
        })
    })
    .await??;
    signal_task.abort();
    summary.log();

    let code = tokio::task::spawn_blocking(move || process.wait()).await??;
    if interrupted.load(Ordering::SeqCst) {
        eprintln!("# helper stopped (exit code {code})");
    } else if code == 0 {
        eprintln!("# helper finished");
    } else {
        tracing::warn!(code, "Helper exited with an error");
        eprintln!("# helper failed (exit code {code})");
    }

    Ok(())
}
