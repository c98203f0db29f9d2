//! End-to-end gating scenarios driven through the engine with a manual clock.

use std::io::Cursor;

use motiongate_common::clock::ManualClock;
use motiongate_common::config::MotionConfig;
use motiongate_core::{IngestStatus, MotionEngine, MotionEvent, MotionPhase};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 6;
const FRAME_LEN: usize = (WIDTH * HEIGHT) as usize;

fn scenario_config() -> MotionConfig {
    MotionConfig {
        width: WIDTH,
        height: HEIGHT,
        history_len: 1,
        active_threshold: 0.01,
        start_frames: 4,
        prestop_low_min: 5,
        prestop_low_max: 8,
        prestop_low_full: 10,
        prestop_high_max: 3,
        cancel_prestop_frames: 4,
        full_stop_delay_secs: 3.0,
        resume_hysteresis: true,
    }
}

/// Feeds frames that either flip every pixel (delta 1.0) or repeat the
/// previous frame (delta 0.0).
struct Driver {
    engine: MotionEngine<std::io::Empty>,
    clock: ManualClock,
    lit: bool,
}

impl Driver {
    fn new(config: MotionConfig) -> Self {
        let clock = ManualClock::new();
        let engine =
            MotionEngine::with_clock(config, std::io::empty(), Box::new(clock.clone())).unwrap();
        Self {
            engine,
            clock,
            lit: false,
        }
    }

    fn frame(&self) -> Vec<u8> {
        vec![if self.lit { 255 } else { 0 }; FRAME_LEN]
    }

    fn moving(&mut self, n: usize) -> Vec<MotionEvent> {
        (0..n)
            .map(|_| {
                self.lit = !self.lit;
                let frame = self.frame();
                self.engine.feed(&frame)
            })
            .collect()
    }

    fn still(&mut self, n: usize) -> Vec<MotionEvent> {
        (0..n)
            .map(|_| {
                let frame = self.frame();
                self.engine.feed(&frame)
            })
            .collect()
    }

    fn started(config: MotionConfig) -> Self {
        let mut driver = Self::new(config);
        let frames = driver.engine.config().start_frames as usize;
        assert_eq!(driver.moving(frames).last(), Some(&MotionEvent::Start));
        driver
    }
}

fn all_keep(events: &[MotionEvent]) -> bool {
    events.iter().all(|e| *e == MotionEvent::Keep)
}

#[test]
fn start_fires_exactly_on_the_last_required_frame() {
    let mut driver = Driver::new(scenario_config());

    let events = driver.moving(4);
    assert!(all_keep(&events[..3]));
    assert_eq!(events[3], MotionEvent::Start);
    assert_eq!(driver.engine.phase(), MotionPhase::Active);

    // Continued motion keeps recording without re-starting.
    assert!(all_keep(&driver.moving(20)));
}

#[test]
fn stillness_arms_prestop_and_stops_after_delay() {
    let mut driver = Driver::started(scenario_config());

    let events = driver.still(10);
    assert!(all_keep(&events));
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);

    driver.clock.advance_ns(2_900_000_000);
    assert!(all_keep(&driver.still(5)));
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);

    driver.clock.advance_ns(100_000_000);
    assert_eq!(driver.still(1), vec![MotionEvent::Stop]);
    assert_eq!(driver.engine.phase(), MotionPhase::Inactive);
    assert!(!driver.engine.is_active());
}

#[test]
fn renewed_motion_cancels_prestop_and_low_run_restarts() {
    let mut driver = Driver::started(scenario_config());
    driver.still(10);
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);

    assert!(all_keep(&driver.moving(3)));
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);
    assert!(all_keep(&driver.moving(1)));
    assert_eq!(driver.engine.phase(), MotionPhase::Active);

    // Time that passed while armed does not carry over.
    driver.clock.advance_secs(60.0);
    assert!(all_keep(&driver.still(9)));
    assert_eq!(driver.engine.phase(), MotionPhase::Active);
    driver.still(1);
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);
    assert_eq!(driver.still(1), vec![MotionEvent::Keep]);
}

#[test]
fn brief_blip_resumes_partial_low_run() {
    let mut driver = Driver::started(scenario_config());

    driver.still(6);
    assert!(driver.engine.state_machine().counters().mid_lo_seen);
    driver.moving(3);
    assert_eq!(driver.engine.phase(), MotionPhase::Active);

    // Resumed still frames count double, so the third one passes prestop_low_min.
    driver.still(2);
    assert_eq!(driver.engine.phase(), MotionPhase::Active);
    driver.still(1);
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);
}

#[test]
fn blip_longer_than_tolerance_restarts_low_run() {
    let mut driver = Driver::started(scenario_config());

    driver.still(6);
    driver.moving(4);
    assert!(!driver.engine.state_machine().counters().mid_lo_seen);

    driver.still(9);
    assert_eq!(driver.engine.phase(), MotionPhase::Active);
    driver.still(1);
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);
}

#[test]
fn plain_variant_ignores_resume_path() {
    let config = MotionConfig {
        resume_hysteresis: false,
        ..scenario_config()
    };
    let mut driver = Driver::started(config);

    driver.still(6);
    driver.moving(1);
    driver.still(9);
    assert_eq!(driver.engine.phase(), MotionPhase::Active);
    driver.still(1);
    assert_eq!(driver.engine.phase(), MotionPhase::PrestopArmed);
}

#[test]
fn full_cycle_repeats() {
    let mut driver = Driver::new(scenario_config());
    for _ in 0..3 {
        assert_eq!(driver.moving(4).last(), Some(&MotionEvent::Start));
        driver.still(10);
        driver.clock.advance_ns(3_000_000_000);
        assert_eq!(driver.still(1), vec![MotionEvent::Stop]);
    }
}

#[test]
fn identical_sequences_are_deterministic() {
    let pattern = |driver: &mut Driver| -> Vec<MotionEvent> {
        let mut events = Vec::new();
        for round in 0..6 {
            events.extend(driver.moving(3 + round % 3));
            events.extend(driver.still(4 + round * 2));
            driver.clock.advance_secs(1.5);
        }
        events
    };

    let a = pattern(&mut Driver::new(scenario_config()));
    let b = pattern(&mut Driver::new(scenario_config()));
    assert_eq!(a, b);
    assert!(a.contains(&MotionEvent::Start));
}

#[test]
fn smoothing_delays_start_until_window_average_clears_threshold() {
    let config = MotionConfig {
        history_len: 4,
        active_threshold: 0.3,
        start_frames: 1,
        ..scenario_config()
    };
    let mut driver = Driver::new(config);

    // Window after one flip among still frames: 1/4 = 0.25, under 0.3.
    driver.still(3);
    assert_eq!(driver.moving(1), vec![MotionEvent::Keep]);
    assert!((driver.engine.average_delta() - 0.25).abs() < 1e-12);
    assert_eq!(driver.moving(1), vec![MotionEvent::Start]);
}

#[test]
fn source_stream_drives_full_cycle() {
    let config = MotionConfig {
        full_stop_delay_secs: 0.0,
        ..scenario_config()
    };
    let mut stream = Vec::new();
    let mut lit = false;
    for _ in 0..4 {
        lit = !lit;
        stream.extend(std::iter::repeat(if lit { 255u8 } else { 0 }).take(FRAME_LEN));
    }
    for _ in 0..11 {
        stream.extend(std::iter::repeat(if lit { 255u8 } else { 0 }).take(FRAME_LEN));
    }
    stream.extend_from_slice(&[9, 9, 9]);

    let mut engine =
        MotionEngine::with_clock(config, Cursor::new(stream), Box::new(ManualClock::new()))
            .unwrap();

    let mut events = Vec::new();
    loop {
        let event = engine.feed_from_source();
        if engine.last_ingest().is_exhausted() {
            assert_eq!(event, MotionEvent::Keep);
            break;
        }
        events.push(event);
    }

    assert_eq!(events.len(), 15);
    assert_eq!(events[3], MotionEvent::Start);
    assert_eq!(events[14], MotionEvent::Stop);
    assert_eq!(
        engine.last_ingest(),
        IngestStatus::EndOfStream { received: 3 }
    );
}
