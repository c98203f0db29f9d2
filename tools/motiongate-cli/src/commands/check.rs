//! Check delta kernels and configuration.

use std::path::Path;

use motiongate_common::config::{config_file_path, AppConfig};
use motiongate_core::DeltaKernel;

/// `explicit` is the file given with `--config`, if any.
pub fn run(config: &AppConfig, explicit: Option<&Path>) -> anyhow::Result<()> {
    println!("motiongate System Check");
    println!("{}", "=".repeat(50));

    // Delta kernels
    let selected = DeltaKernel::detect();
    println!("[OK] Delta kernel: {selected}");
    for kernel in [DeltaKernel::Scalar, DeltaKernel::Sse2, DeltaKernel::Neon] {
        let mark = if kernel.is_available() { "yes" } else { "no" };
        println!("     {:<8} available: {mark}", kernel.name());
    }

    // Configuration
    println!();
    println!("{}", config_file_line(explicit));

    let motion = &config.motion;
    match motion.validate() {
        Ok(()) => {
            println!(
                "[OK] Detector: {}x{} ({} bytes/frame), history {}, threshold {}",
                motion.width,
                motion.height,
                motion.frame_len(),
                motion.history_len,
                motion.active_threshold
            );
            println!(
                "     start after {} frames, stop {}s after {} still frames{}",
                motion.start_frames,
                motion.full_stop_delay_secs,
                motion.prestop_low_full,
                if motion.resume_hysteresis {
                    " (resume hysteresis on)"
                } else {
                    ""
                }
            );
        }
        Err(e) => {
            println!("[FAIL] Detector configuration: {e}");
            anyhow::bail!("Invalid configuration");
        }
    }

    if config.capture.command.is_empty() {
        println!("[--] Capture helper: not configured (pass one to `watch` after `--`)");
    } else {
        println!("[OK] Capture helper: {}", config.capture.command.join(" "));
    }

    println!();
    println!("motiongate is ready.");
    Ok(())
}

fn config_file_line(explicit: Option<&Path>) -> String {
    match explicit {
        Some(path) => format!("[OK] Config file: {} (from --config)", path.display()),
        None => {
            let path = config_file_path();
            if path.exists() {
                format!("[OK] Config file: {}", path.display())
            } else {
                format!("[--] Config file: {} (not present, using defaults)", path.display())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_path_is_reported() {
        let line = config_file_line(Some(Path::new("/srv/gate/custom.json")));
        assert!(line.contains("/srv/gate/custom.json"), "{line}");
        assert!(line.contains("--config"));
    }

    #[test]
    fn standard_location_is_reported_without_explicit_path() {
        let line = config_file_line(None);
        assert!(line.contains(&config_file_path().display().to_string()), "{line}");
    }
}
