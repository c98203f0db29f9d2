//! motiongate Core: the motion gate
//!
//! Turns a stream of raw grayscale frames into a START / KEEP / STOP signal
//! suitable for gating a recorder or an alert:
//! - **Delta:** normalized mean absolute difference between consecutive frames
//! - **History:** rolling mean over the last N deltas to absorb single-frame noise
//! - **State machine:** hysteretic INACTIVE → ACTIVE → PRESTOP transitions
//! - **Engine:** owns the frame buffers and assembles frames from a byte source
//!
//! ```text
//!  byte source ──► MotionEngine ──► DeltaKernel ──► DeltaHistory ──► MotionStateMachine ──► MotionEvent
//!                 (frame assembly)   (|a-b| sum)     (rolling mean)     (hysteresis)
//! ```
//!
//! Everything here is synchronous and single-owner. The only I/O is the
//! blocking read performed by [`MotionEngine::feed_from_source`].

pub mod delta;
pub mod engine;
pub mod history;
pub mod state;

pub use delta::{frame_delta, DeltaKernel};
pub use engine::{IngestStatus, MotionEngine};
pub use history::DeltaHistory;
pub use state::{MotionEvent, MotionPhase, MotionStateMachine, RunCounters};
