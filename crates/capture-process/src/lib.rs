//! motiongate Capture Process
//!
//! A thin lifecycle wrapper around the external helper that produces raw
//! frames (a camera tool, `ffmpeg`, a test generator). The detector never
//! spawns anything itself; it only reads the helper's stdout through the
//! pipe handed out here.
//!
//! Stopping a blocked detector is done from the outside: [`Terminator`]
//! sends SIGTERM to the helper, its stdout closes, and the pending read
//! returns end-of-stream.

pub mod helper;

pub use helper::{HelperPipes, HelperProcess, StreamMode, Terminator};
