//! Inbound serial signal handling through the listener thread: bin-full
//! indicators arriving over the link must surface on the status board, and
//! noise on the line must not.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use sort_station::board::CategoryState;
use sort_station::detect::{BoundingBox, Detection, Detector, DetectorBackend};
use sort_station::link::{self, LoopbackLink};
use sort_station::{Frame, FrameSource, Pipeline, SerialListener, Timing, TrashCategory};

struct FixedCamera;

impl FrameSource for FixedCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(Some(Frame::new(vec![0u8; 4 * 4 * 3], 4, 4)?))
    }
}

struct NullBackend;

impl DetectorBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Shared handle that lets a test switch the detector output on and off
/// while the pipeline runs.
#[derive(Clone, Default)]
struct Feed(Arc<Mutex<Option<Detection>>>);

impl Feed {
    fn set(&self, detection: Option<Detection>) {
        *self.0.lock().unwrap() = detection;
    }
}

struct FeedBackend(Feed);

impl DetectorBackend for FeedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(self.0 .0.lock().unwrap().iter().copied().collect())
    }
}

fn detection(category: TrashCategory, confidence: f32) -> Detection {
    Detection {
        category,
        confidence,
        bounding_box: BoundingBox {
            x1: 1.0,
            y1: 1.0,
            x2: 3.0,
            y2: 3.0,
        },
    }
}

fn pump_until(
    pipeline: &mut Pipeline,
    deadline: Duration,
    mut cond: impl FnMut(&Pipeline) -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        pipeline.tick().expect("tick");
        if cond(pipeline) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn full_and_unfull_signals_drive_the_board() {
    let (link, remote) = LoopbackLink::pair();
    let shared = link::shared(Some(Box::new(link)));
    let mut pipeline = Pipeline::new(
        Box::new(FixedCamera),
        None,
        Detector::new(Box::new(NullBackend), 0.5),
        shared.clone(),
        Timing {
            tick: Duration::from_millis(1),
            dwell: Duration::from_millis(10),
            cooldown: Duration::from_millis(10),
        },
    );
    let shutdown = Arc::new(AtomicBool::new(false));
    let listener = SerialListener::spawn(shared, pipeline.updates_sender(), shutdown);

    remote.inject("FULL:RECYCLABLE");
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.board().status(TrashCategory::Recyclable).is_full
        }),
        "full signal never reached the board"
    );
    assert_eq!(
        pipeline
            .board()
            .status(TrashCategory::Recyclable)
            .display_status(),
        "满载"
    );
    // Other categories are untouched.
    assert!(!pipeline.board().status(TrashCategory::Other).is_full);

    remote.inject("UNFULL:RECYCLABLE");
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            !p.board().status(TrashCategory::Recyclable).is_full
        }),
        "unfull signal never reached the board"
    );
    assert_eq!(
        pipeline.board().status(TrashCategory::Recyclable).state,
        CategoryState::Awaiting
    );

    listener.stop().expect("stop listener");
    pipeline.shutdown().expect("shutdown");
}

#[test]
fn full_bin_does_not_block_sorting_and_keeps_its_display() {
    let (link, remote) = LoopbackLink::pair();
    let shared = link::shared(Some(Box::new(link)));
    let feed = Feed::default();
    let mut pipeline = Pipeline::new(
        Box::new(FixedCamera),
        None,
        Detector::new(Box::new(FeedBackend(feed.clone())), 0.5),
        shared.clone(),
        Timing {
            tick: Duration::from_millis(1),
            dwell: Duration::from_millis(40),
            cooldown: Duration::from_millis(25),
        },
    );
    let shutdown = Arc::new(AtomicBool::new(false));
    let listener = SerialListener::spawn(shared, pipeline.updates_sender(), shutdown);

    remote.inject("FULL:HAZARDOUS");
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.board().status(TrashCategory::Hazardous).is_full
        }),
        "full signal never reached the board"
    );

    // A qualifying detection for the full category still actuates.
    feed.set(Some(detection(TrashCategory::Hazardous, 0.9)));
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().detections_admitted() >= 1
        }),
        "detection for a full bin was not admitted"
    );
    feed.set(None);

    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            // Display stays "full" through the whole cycle.
            assert_eq!(
                p.board().status(TrashCategory::Hazardous).display_status(),
                "满载"
            );
            p.board().status(TrashCategory::Hazardous).count == 1
        }),
        "sort into the full bin never completed"
    );
    assert_eq!(remote.written(), vec!["CLASS:YOUHAI".to_string()]);

    // Pump well past the cooldown: the revert is suppressed while full, so
    // the slot keeps its completed state and the full display.
    pump_until(&mut pipeline, Duration::from_millis(150), |_| false);
    assert_eq!(
        pipeline.board().status(TrashCategory::Hazardous).state,
        CategoryState::Complete
    );
    assert_eq!(
        pipeline
            .board()
            .status(TrashCategory::Hazardous)
            .display_status(),
        "满载"
    );

    // UNFULL releases the override; the count survived.
    remote.inject("UNFULL:HAZARDOUS");
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            !p.board().status(TrashCategory::Hazardous).is_full
        }),
        "unfull signal never reached the board"
    );
    assert_eq!(
        pipeline.board().status(TrashCategory::Hazardous).state,
        CategoryState::Awaiting
    );
    assert_eq!(pipeline.board().status(TrashCategory::Hazardous).count, 1);

    listener.stop().expect("stop listener");
    pipeline.shutdown().expect("shutdown");
}

#[test]
fn noise_and_done_lines_are_ignored() {
    let (link, remote) = LoopbackLink::pair();
    let shared = link::shared(Some(Box::new(link)));
    let mut pipeline = Pipeline::new(
        Box::new(FixedCamera),
        None,
        Detector::new(Box::new(NullBackend), 0.5),
        shared.clone(),
        Timing {
            tick: Duration::from_millis(1),
            dwell: Duration::from_millis(10),
            cooldown: Duration::from_millis(10),
        },
    );
    let shutdown = Arc::new(AtomicBool::new(false));
    let listener = SerialListener::spawn(shared, pipeline.updates_sender(), shutdown);

    remote.inject("DONE");
    remote.inject("GARBAGE LINE");
    remote.inject("FULL:NOPE");
    // Give the listener a couple of poll intervals to chew through them.
    let settled = pump_until(&mut pipeline, Duration::from_millis(400), |_| false);
    assert!(!settled);

    for (category, status) in pipeline.board().snapshot() {
        assert!(!status.is_full, "{} wrongly marked full", category);
        assert_eq!(status.count, 0);
        assert_eq!(status.state, CategoryState::Awaiting);
    }

    listener.stop().expect("stop listener");
    pipeline.shutdown().expect("shutdown");
}
