//! Gate a recorded file of concatenated raw frames.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use motiongate_common::clock::{secs_to_ns, ManualClock};
use motiongate_common::config::AppConfig;
use motiongate_core::MotionEngine;

use super::drive;

pub fn run(config: AppConfig, path: PathBuf, fps: f64, all: bool) -> anyhow::Result<()> {
    if !fps.is_finite() || fps <= 0.0 {
        anyhow::bail!("--fps must be a positive number, got {fps}");
    }

    let file =
        File::open(&path).map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
    let frame_len = config.motion.frame_len() as u64;
    if let Ok(meta) = file.metadata() {
        if frame_len > 0 && meta.len() % frame_len != 0 {
            tracing::warn!(
                bytes = meta.len(),
                frame_len,
                "File is not a whole number of frames; the tail will be ignored"
            );
        }
    }

    // Stream time, not wall time, so the stop delay means the same on every replay.
    let clock = ManualClock::new();
    let frame_interval_ns = secs_to_ns(1.0 / fps);
    let mut engine = MotionEngine::with_clock(
        config.motion.clone(),
        BufReader::new(file),
        Box::new(clock.clone()),
    )?;

    let mut out = std::io::stdout().lock();
    let summary = drive(
        &mut engine,
        &mut out,
        all,
        |index| clock.set_ns(index.saturating_mul(frame_interval_ns)),
        |_| None,
    )?;
    summary.log();

    eprintln!(
        "# {} frames, {} starts, {} stops{}",
        summary.frames,
        summary.starts,
        summary.stops,
        if summary.ended_active {
            ", motion still active at end"
        } else {
            ""
        }
    );
    Ok(())
}
