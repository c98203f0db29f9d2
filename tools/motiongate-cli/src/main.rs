//! motiongate CLI: frame-difference motion gating from the command line.
//!
//! Usage:
//!   motiongate watch [OPTIONS] -- <HELPER>...   Gate a live helper's frame stream
//!   motiongate replay <FILE>                    Gate a recorded raw frame file
//!   motiongate check                            Check kernels and configuration
//!   motiongate config                           Show the effective configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use motiongate_common::config::{AppConfig, MotionConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "motiongate",
    about = "Decide when to start and stop recording from raw video frames",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to the standard location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn a capture helper and gate its stdout frame stream
    Watch {
        #[command(flatten)]
        motion: MotionArgs,

        /// Print every tick, not only start/stop
        #[arg(long)]
        all: bool,

        /// Discard the helper's stderr
        #[arg(long)]
        quiet_helper: bool,

        /// Helper command line (falls back to capture.command)
        #[arg(last = true)]
        helper: Vec<String>,
    },

    /// Gate a file of concatenated raw frames
    Replay {
        /// Path to the frame file
        path: PathBuf,

        #[command(flatten)]
        motion: MotionArgs,

        /// Nominal frame rate used to time the stop delay
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Print every tick, not only start/stop
        #[arg(long)]
        all: bool,
    },

    /// Check delta kernels and validate the configuration
    Check {
        #[command(flatten)]
        motion: MotionArgs,
    },

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        motion: MotionArgs,

        /// Write it to the standard configuration location
        #[arg(long)]
        save: bool,
    },
}

/// Detector overrides layered over the configuration file.
#[derive(Args, Debug, Default)]
struct MotionArgs {
    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Number of deltas averaged
    #[arg(long)]
    history: Option<usize>,

    /// Smoothed delta that counts as motion
    #[arg(long)]
    threshold: Option<f64>,

    /// Consecutive moving frames needed to start
    #[arg(long)]
    start_frames: Option<u32>,

    /// Seconds of confirmed stillness before stop
    #[arg(long)]
    stop_delay: Option<f64>,

    /// Disable resume hysteresis
    #[arg(long)]
    no_resume: bool,
}

impl MotionArgs {
    fn apply(&self, motion: &mut MotionConfig) {
        if let Some(width) = self.width {
            motion.width = width;
        }
        if let Some(height) = self.height {
            motion.height = height;
        }
        if let Some(history) = self.history {
            motion.history_len = history;
        }
        if let Some(threshold) = self.threshold {
            motion.active_threshold = threshold;
        }
        if let Some(start_frames) = self.start_frames {
            motion.start_frames = start_frames;
        }
        if let Some(delay) = self.stop_delay {
            motion.full_stop_delay_secs = delay;
        }
        if self.no_resume {
            motion.resume_hysteresis = false;
        }
    }
}

fn load_config(path: Option<&PathBuf>, motion: &MotionArgs) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };
    motion.apply(&mut config.motion);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let motion = match &cli.command {
        Commands::Watch { motion, .. }
        | Commands::Replay { motion, .. }
        | Commands::Check { motion }
        | Commands::Config { motion, .. } => motion,
    };
    let mut config = load_config(cli.config.as_ref(), motion)?;

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    config.logging.json |= cli.json_logs;
    motiongate_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Watch {
            all,
            quiet_helper,
            helper,
            ..
        } => {
            if quiet_helper {
                config.capture.show_helper_stderr = false;
            }
            commands::watch::run(config, helper, all).await
        }
        Commands::Replay { path, fps, all, .. } => commands::replay::run(config, path, fps, all),
        Commands::Check { .. } => commands::check::run(&config, cli.config.as_deref()),
        Commands::Config { save, .. } => commands::config::run(&config, save),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let args = MotionArgs {
            width: Some(64),
            threshold: Some(0.05),
            no_resume: true,
            ..MotionArgs::default()
        };
        let mut motion = MotionConfig::default();
        args.apply(&mut motion);

        assert_eq!(motion.width, 64);
        assert_eq!(motion.height, MotionConfig::default().height);
        assert_eq!(motion.active_threshold, 0.05);
        assert!(!motion.resume_hysteresis);
    }

    #[test]
    fn helper_argv_follows_double_dash() {
        let cli = Cli::try_parse_from([
            "motiongate",
            "watch",
            "--width",
            "320",
            "--",
            "ffmpeg",
            "-i",
            "/dev/video0",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch { motion, helper, .. } => {
                assert_eq!(motion.width, Some(320));
                assert_eq!(helper, vec!["ffmpeg", "-i", "/dev/video0"]);
            }
            _ => panic!("expected watch"),
        }
    }
}
