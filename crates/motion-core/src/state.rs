//! Hysteretic motion state machine.
//!
//! Consumes one smoothed delta per frame and decides whether motion has
//! started, is continuing, or has stopped.
//!
//! # Phases
//!
//! 1. **Inactive:** waits for `start_frames` consecutive frames above the
//!    threshold, then emits START.
//! 2. **Active:** counts still frames. A run of `prestop_low_full` still
//!    frames arms prestop. A partial run that reached the
//!    `[prestop_low_min, prestop_low_max]` window survives up to
//!    `prestop_high_max` moving frames and, once still frames resume, arms
//!    prestop as soon as the run gets back to `prestop_low_min`.
//! 3. **Prestop armed:** `cancel_prestop_frames` moving frames drop back to
//!    plain Active; otherwise the first still frame at least
//!    `full_stop_delay` after arming emits STOP.
//!
//! Time is passed in by the caller, so equal `(avg, now)` sequences always
//! produce equal event sequences.

use motiongate_common::clock::{ns_to_secs, secs_to_ns};
use motiongate_common::config::MotionConfig;
use serde::{Deserialize, Serialize};

/// The per-frame output of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionEvent {
    /// Motion began on this frame.
    Start,
    /// No transition.
    Keep,
    /// Motion ended on this frame.
    Stop,
}

impl MotionEvent {
    /// Numeric code: 1 for START, 0 for KEEP, -1 for STOP.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Start => 1,
            Self::Keep => 0,
            Self::Stop => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Keep => "keep",
            Self::Stop => "stop",
        }
    }

    /// Whether this event changes the recording state.
    pub fn is_transition(self) -> bool {
        !matches!(self, Self::Keep)
    }
}

impl std::fmt::Display for MotionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPhase {
    Inactive,
    Active,
    /// Active, with a pending stop waiting out the confirmation delay.
    PrestopArmed,
}

/// Snapshot of the run counters, for logging and inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub hi_run: u32,
    pub lo_run: u32,
    pub mid_hi_run: u32,
    pub mid_lo_seen: bool,
}

/// The START/KEEP/STOP state machine.
#[derive(Debug, Clone)]
pub struct MotionStateMachine {
    active_threshold: f64,
    start_frames: u32,
    prestop_low_min: u32,
    prestop_low_max: u32,
    prestop_low_full: u32,
    prestop_high_max: u32,
    cancel_prestop_frames: u32,
    full_stop_delay_ns: u64,
    resume_hysteresis: bool,

    active: bool,
    runs: RunCounters,
    /// Monotonic reading at which prestop was armed.
    prestop_at_ns: Option<u64>,
}

impl MotionStateMachine {
    /// Create an inactive state machine from detector settings.
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            active_threshold: config.active_threshold,
            start_frames: config.start_frames,
            prestop_low_min: config.prestop_low_min,
            prestop_low_max: config.prestop_low_max,
            prestop_low_full: config.prestop_low_full,
            prestop_high_max: config.prestop_high_max,
            cancel_prestop_frames: config.cancel_prestop_frames,
            full_stop_delay_ns: secs_to_ns(config.full_stop_delay_secs),
            resume_hysteresis: config.resume_hysteresis,
            active: false,
            runs: RunCounters::default(),
            prestop_at_ns: None,
        }
    }

    /// Advance one frame with smoothed delta `avg` observed at `now_ns`.
    pub fn step(&mut self, avg: f64, now_ns: u64) -> MotionEvent {
        let moving = avg > self.active_threshold;

        if !self.active {
            return self.step_inactive(moving);
        }

        match self.prestop_at_ns {
            None => {
                if self.resume_hysteresis {
                    self.step_recording_resumable(moving, now_ns);
                } else {
                    self.step_recording_plain(moving, now_ns);
                }
                MotionEvent::Keep
            }
            Some(armed_at) => self.step_prestop(moving, now_ns, armed_at),
        }
    }

    pub fn phase(&self) -> MotionPhase {
        match (self.active, self.prestop_at_ns) {
            (false, _) => MotionPhase::Inactive,
            (true, None) => MotionPhase::Active,
            (true, Some(_)) => MotionPhase::PrestopArmed,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn counters(&self) -> RunCounters {
        self.runs
    }

    /// Monotonic reading at which the pending stop was armed, if any.
    pub fn prestop_armed_at_ns(&self) -> Option<u64> {
        self.prestop_at_ns
    }

    fn step_inactive(&mut self, moving: bool) -> MotionEvent {
        if moving {
            self.runs.hi_run = self.runs.hi_run.saturating_add(1);
        } else {
            self.runs.hi_run = 0;
        }

        if self.runs.hi_run >= self.start_frames {
            self.active = true;
            self.prestop_at_ns = None;
            self.reset_runs();
            return MotionEvent::Start;
        }
        MotionEvent::Keep
    }

    fn step_recording_resumable(&mut self, moving: bool, now_ns: u64) {
        if !moving {
            self.runs.lo_run = self.runs.lo_run.saturating_add(1);

            if (self.prestop_low_min..=self.prestop_low_max).contains(&self.runs.lo_run) {
                self.runs.mid_lo_seen = true;
            }
            if self.runs.lo_run >= self.prestop_low_full {
                self.arm_prestop(now_ns);
            }
        } else {
            if self.runs.mid_lo_seen {
                self.runs.mid_hi_run = self.runs.mid_hi_run.saturating_add(1);
                if self.runs.mid_hi_run > self.prestop_high_max {
                    // The blip lasted too long; the partial low run is abandoned.
                    self.runs.mid_hi_run = 0;
                    self.runs.mid_lo_seen = false;
                }
            }
            self.runs.lo_run = 0;
        }

        // Resume a near-complete low run that a short blip interrupted.
        if self.runs.mid_lo_seen && self.runs.mid_hi_run > 0 && !moving {
            self.runs.lo_run = self.runs.lo_run.saturating_add(1);
            if self.runs.lo_run >= self.prestop_low_min {
                self.arm_prestop(now_ns);
            }
        }
    }

    fn step_recording_plain(&mut self, moving: bool, now_ns: u64) {
        if moving {
            self.runs.lo_run = 0;
            return;
        }
        self.runs.lo_run = self.runs.lo_run.saturating_add(1);
        if self.runs.lo_run >= self.prestop_low_full {
            self.arm_prestop(now_ns);
        }
    }

    fn step_prestop(&mut self, moving: bool, now_ns: u64, armed_at: u64) -> MotionEvent {
        if moving {
            self.runs.hi_run = self.runs.hi_run.saturating_add(1);
            if self.runs.hi_run >= self.cancel_prestop_frames {
                tracing::debug!(hi_run = self.runs.hi_run, "prestop cancelled by renewed motion");
                self.prestop_at_ns = None;
                self.reset_runs();
            }
            return MotionEvent::Keep;
        }

        let waited_ns = now_ns.saturating_sub(armed_at);
        if waited_ns >= self.full_stop_delay_ns {
            self.active = false;
            self.prestop_at_ns = None;
            self.reset_runs();
            return MotionEvent::Stop;
        }

        tracing::trace!(waited_secs = ns_to_secs(waited_ns), "prestop confirming");
        MotionEvent::Keep
    }

    fn arm_prestop(&mut self, now_ns: u64) {
        if self.prestop_at_ns.is_none() {
            tracing::debug!(
                lo_run = self.runs.lo_run,
                mid_hi_run = self.runs.mid_hi_run,
                "prestop armed"
            );
        }
        self.prestop_at_ns = Some(now_ns);
    }

    fn reset_runs(&mut self) {
        self.runs = RunCounters::default();
    }
}
