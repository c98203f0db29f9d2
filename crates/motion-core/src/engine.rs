//! The motion engine: frame buffers, frame assembly, and the per-frame pipeline.

use std::io::{ErrorKind, Read};

use motiongate_common::clock::{MonotonicClock, SystemClock};
use motiongate_common::config::MotionConfig;
use motiongate_common::error::{MotionError, MotionResult};

use crate::delta::DeltaKernel;
use crate::history::DeltaHistory;
use crate::state::{MotionEvent, MotionPhase, MotionStateMachine};

/// Outcome of the most recent attempt to read a frame from the source.
///
/// Ingestion failures never change the event contract (they yield KEEP);
/// this is the side channel for callers that want to know why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// No read has been attempted yet.
    Idle,
    /// A full frame was assembled.
    Complete,
    /// The source ended after `received` bytes of the frame.
    EndOfStream { received: usize },
    /// The source failed after `received` bytes of the frame.
    ReadFailed { received: usize, kind: ErrorKind },
}

impl IngestStatus {
    /// Whether the source can no longer deliver frames.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::EndOfStream { .. } | Self::ReadFailed { .. })
    }
}

/// Single-owner motion detector bound to a byte source.
///
/// Holds two frame buffers of exactly `width * height` bytes each. The
/// "previous" buffer starts zeroed, so the very first frame is compared
/// against black.
pub struct MotionEngine<R> {
    config: MotionConfig,
    source: R,
    previous: Vec<u8>,
    current: Vec<u8>,
    history: DeltaHistory,
    machine: MotionStateMachine,
    kernel: DeltaKernel,
    clock: Box<dyn MonotonicClock>,
    frames_fed: u64,
    last_ingest: IngestStatus,
}

impl<R> MotionEngine<R> {
    /// Build an engine timed by the system monotonic clock.
    pub fn new(config: MotionConfig, source: R) -> MotionResult<Self> {
        Self::with_clock(config, source, Box::new(SystemClock::start()))
    }

    /// Build an engine with an explicit clock.
    ///
    /// Either every buffer is allocated or nothing is returned.
    pub fn with_clock(
        config: MotionConfig,
        source: R,
        clock: Box<dyn MonotonicClock>,
    ) -> MotionResult<Self> {
        config.validate()?;

        let frame_len = config.frame_len();
        let previous = zeroed_frame(frame_len, "previous")?;
        let current = zeroed_frame(frame_len, "current")?;
        let history = DeltaHistory::new(config.history_len)?;
        let machine = MotionStateMachine::new(&config);
        let kernel = DeltaKernel::detect();

        tracing::info!(
            width = config.width,
            height = config.height,
            history_len = config.history_len,
            active_threshold = config.active_threshold,
            kernel = %kernel,
            resume_hysteresis = config.resume_hysteresis,
            "Motion engine ready"
        );

        Ok(Self {
            config,
            source,
            previous,
            current,
            history,
            machine,
            kernel,
            clock,
            frames_fed: 0,
            last_ingest: IngestStatus::Idle,
        })
    }

    /// Advance one tick with an already assembled frame.
    ///
    /// A frame of the wrong length is ignored and reported as KEEP.
    pub fn feed(&mut self, frame: &[u8]) -> MotionEvent {
        if frame.len() != self.current.len() {
            tracing::warn!(
                got = frame.len(),
                expected = self.current.len(),
                "Ignoring frame with wrong size"
            );
            return MotionEvent::Keep;
        }
        self.current.copy_from_slice(frame);
        self.process_current()
    }

    /// Smoothed delta the state machine saw last.
    pub fn average_delta(&self) -> f64 {
        self.history.average()
    }

    /// Raw delta of the most recent frame.
    pub fn last_delta(&self) -> f64 {
        self.history.last()
    }

    pub fn phase(&self) -> MotionPhase {
        self.machine.phase()
    }

    pub fn is_active(&self) -> bool {
        self.machine.is_active()
    }

    pub fn state_machine(&self) -> &MotionStateMachine {
        &self.machine
    }

    /// Frames that made it through the pipeline.
    pub fn frames_fed(&self) -> u64 {
        self.frames_fed
    }

    pub fn kernel(&self) -> DeltaKernel {
        self.kernel
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn last_ingest(&self) -> IngestStatus {
        self.last_ingest
    }

    /// Current monotonic reading of the engine's clock, in nanoseconds.
    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    /// Release the buffers and hand the byte source back.
    pub fn into_source(self) -> R {
        self.source
    }

    fn process_current(&mut self) -> MotionEvent {
        let delta = self.kernel.delta(&self.current, &self.previous);
        std::mem::swap(&mut self.previous, &mut self.current);

        self.history.push(delta);
        let avg = self.history.average();
        self.frames_fed += 1;

        let event = self.machine.step(avg, self.clock.now_ns());

        tracing::trace!(
            frame = self.frames_fed,
            delta,
            avg,
            phase = ?self.machine.phase(),
            "frame processed"
        );
        match event {
            MotionEvent::Start => {
                tracing::info!(frame = self.frames_fed, avg_delta = avg, "Motion started");
            }
            MotionEvent::Stop => {
                tracing::info!(frame = self.frames_fed, avg_delta = avg, "Motion stopped");
            }
            MotionEvent::Keep => {}
        }

        event
    }
}

impl<R: Read> MotionEngine<R> {
    /// Assemble one frame from the source, then advance one tick.
    ///
    /// Blocks until the frame is complete. End-of-stream or a read error
    /// yields KEEP and leaves the previous frame, history, and state
    /// untouched; see [`MotionEngine::last_ingest`] for the reason.
    pub fn feed_from_source(&mut self) -> MotionEvent {
        self.last_ingest = read_frame(&mut self.source, &mut self.current);
        match self.last_ingest {
            IngestStatus::Complete => self.process_current(),
            _ => MotionEvent::Keep,
        }
    }
}

impl<R> std::fmt::Debug for MotionEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionEngine")
            .field("config", &self.config)
            .field("kernel", &self.kernel)
            .field("phase", &self.machine.phase())
            .field("frames_fed", &self.frames_fed)
            .field("last_ingest", &self.last_ingest)
            .finish_non_exhaustive()
    }
}

/// Fill `buf` from `source`, looping over short reads.
fn read_frame<R: Read>(source: &mut R, buf: &mut [u8]) -> IngestStatus {
    let mut received = 0;
    while received < buf.len() {
        match source.read(&mut buf[received..]) {
            Ok(0) => {
                tracing::debug!(received, expected = buf.len(), "Frame source reached end of stream");
                return IngestStatus::EndOfStream { received };
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, received, expected = buf.len(), "Frame read failed");
                return IngestStatus::ReadFailed {
                    received,
                    kind: e.kind(),
                };
            }
        }
    }
    IngestStatus::Complete
}

fn zeroed_frame(len: usize, which: &str) -> MotionResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        MotionError::allocation(format!("{which} frame buffer of {len} bytes: {e}"))
    })?;
    buf.resize(len, 0);
    Ok(buf)
}
