pub mod check;
pub mod config;
pub mod replay;
pub mod watch;

use std::io::{Read, Write};

use motiongate_common::clock::ns_to_secs;
use motiongate_core::{IngestStatus, MotionEngine, MotionEvent};
use serde::Serialize;

/// One output line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub event: &'static str,
    pub frame: u64,
    pub avg_delta: f64,
    pub last_delta: f64,
    pub stream_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
}

/// What happened over a whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub starts: u64,
    pub stops: u64,
    pub ended_active: bool,
    pub ingest: IngestStatus,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            frames = self.frames,
            starts = self.starts,
            stops = self.stops,
            ended_active = self.ended_active,
            ingest = ?self.ingest,
            "Stream finished"
        );
        if self.ended_active {
            tracing::warn!("Stream ended while motion was still active");
        }
    }
}

/// Pull frames from the engine's source until it is exhausted, writing
/// one JSON line per START/STOP (every tick with `all`).
///
/// `before_frame` runs ahead of each read with the index of the frame
/// about to be read. `wall_time` labels a record with a wall-clock time.
pub fn drive<R, W>(
    engine: &mut MotionEngine<R>,
    out: &mut W,
    all: bool,
    mut before_frame: impl FnMut(u64),
    wall_time: impl Fn(u64) -> Option<String>,
) -> anyhow::Result<RunSummary>
where
    R: Read,
    W: Write,
{
    let mut starts = 0;
    let mut stops = 0;

    loop {
        before_frame(engine.frames_fed());
        let event = engine.feed_from_source();
        if engine.last_ingest().is_exhausted() {
            break;
        }

        match event {
            MotionEvent::Start => starts += 1,
            MotionEvent::Stop => stops += 1,
            MotionEvent::Keep => {}
        }
        if all || event.is_transition() {
            let now_ns = engine.now_ns();
            let record = EventRecord {
                event: event.as_str(),
                frame: engine.frames_fed(),
                avg_delta: engine.average_delta(),
                last_delta: engine.last_delta(),
                stream_secs: ns_to_secs(now_ns),
                at: wall_time(now_ns),
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
            out.flush()?;
        }
    }

    Ok(RunSummary {
        frames: engine.frames_fed(),
        starts,
        stops,
        ended_active: engine.is_active(),
        ingest: engine.last_ingest(),
    })
}
