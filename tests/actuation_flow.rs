//! End-to-end pipeline tests with scripted sources, a scripted detector
//! backend and an in-memory serial link. Timing is scaled down to
//! milliseconds so each test finishes quickly.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use sort_station::board::CategoryState;
use sort_station::detect::{BoundingBox, Detection, Detector, DetectorBackend};
use sort_station::link::{self, LoopbackLink, LoopbackRemote};
use sort_station::{Frame, FrameSource, Pipeline, Timing, TrashCategory};

struct FixedCamera;

impl FrameSource for FixedCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(Some(Frame::new(vec![0u8; 4 * 4 * 3], 4, 4)?))
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

fn fast_timing() -> Timing {
    Timing {
        tick: Duration::from_millis(1),
        dwell: Duration::from_millis(40),
        cooldown: Duration::from_millis(25),
    }
}

fn build_pipeline() -> (Pipeline, LoopbackRemote, Feed) {
    let (link, remote) = LoopbackLink::pair();
    let feed = Feed::default();
    let detector = Detector::new(Box::new(FeedBackend(feed.clone())), 0.5);
    let pipeline = Pipeline::new(
        Box::new(FixedCamera),
        None,
        detector,
        link::shared(Some(Box::new(link))),
        fast_timing(),
    );
    (pipeline, remote, feed)
}

/// Tick the pipeline until the condition holds or the deadline passes.
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
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn happy_path_sorts_one_object() {
    let (mut pipeline, remote, feed) = build_pipeline();
    feed.set(Some(detection(TrashCategory::Kitchen, 0.9)));

    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().detections_admitted() >= 1
        }),
        "detection never admitted"
    );
    feed.set(None);

    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.board().status(TrashCategory::Kitchen).count == 1
        }),
        "sort never completed"
    );

    assert_eq!(remote.written(), vec!["CLASS:CHUYU".to_string()]);
    assert_eq!(
        pipeline.board().status(TrashCategory::Kitchen).state,
        CategoryState::Complete
    );
    assert_eq!(pipeline.coordinator().detections_admitted(), 1);

    // Cooldown elapses and the slot reverts to awaiting.
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.board().status(TrashCategory::Kitchen).state == CategoryState::Awaiting
        }),
        "slot never reverted after cooldown"
    );

    pipeline.shutdown().expect("shutdown");
}

#[test]
fn detections_during_actuation_are_rejected() {
    // A detection on every frame; only one may be admitted per cycle.
    let (mut pipeline, remote, feed) = build_pipeline();
    feed.set(Some(detection(TrashCategory::Recyclable, 0.95)));

    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().detections_admitted() == 1
        }),
        "first detection never admitted"
    );

    // Hammer the pipeline through most of the dwell: the count must not move.
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(20) {
        pipeline.tick().expect("tick");
        assert_eq!(pipeline.coordinator().detections_admitted(), 1);
        std::thread::sleep(Duration::from_millis(1));
    }

    // After the first cycle finishes a second admission is allowed.
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(4), |p| {
            p.board().status(TrashCategory::Recyclable).count == 2
        }),
        "second sort never completed"
    );
    feed.set(None);
    assert!(remote.written().len() >= 2);

    pipeline.shutdown().expect("shutdown");
}

#[test]
fn write_fault_aborts_without_counting() {
    let (mut pipeline, remote, feed) = build_pipeline();
    remote.fail_writes("port unplugged");
    feed.set(Some(detection(TrashCategory::Hazardous, 0.9)));

    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().detections_admitted() >= 1
        }),
        "faulty detection never admitted"
    );
    feed.set(None);

    // The failed job must release the guards and leave the count untouched.
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().is_idle()
                && p.board().status(TrashCategory::Hazardous).state == CategoryState::Awaiting
        }),
        "station never recovered from the write fault"
    );
    assert_eq!(pipeline.board().status(TrashCategory::Hazardous).count, 0);
    assert!(remote.written().is_empty());

    // A later detection succeeds once the fault clears.
    remote.clear_fault();
    let admitted_before = pipeline.coordinator().detections_admitted();
    feed.set(Some(detection(TrashCategory::Hazardous, 0.9)));
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().detections_admitted() > admitted_before
        }),
        "detection after recovery never admitted"
    );
    feed.set(None);
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.board().status(TrashCategory::Hazardous).count == 1
        }),
        "sort after recovery never completed"
    );
    assert_eq!(remote.written(), vec!["CLASS:YOUHAI".to_string()]);

    pipeline.shutdown().expect("shutdown");
}

#[test]
fn missing_link_still_counts_in_detection_only_mode() {
    let feed = Feed::default();
    let detector = Detector::new(Box::new(FeedBackend(feed.clone())), 0.5);
    let mut pipeline = Pipeline::new(
        Box::new(FixedCamera),
        None,
        detector,
        link::shared(None),
        fast_timing(),
    );
    feed.set(Some(detection(TrashCategory::Other, 0.9)));

    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.coordinator().detections_admitted() >= 1
        }),
        "detection never admitted without a link"
    );
    feed.set(None);

    // The state machine runs identically; only the write is skipped.
    assert!(
        pump_until(&mut pipeline, Duration::from_secs(2), |p| {
            p.board().status(TrashCategory::Other).count == 1
        }),
        "sort never completed without a link"
    );

    pipeline.shutdown().expect("shutdown");
}

#[test]
fn below_threshold_detections_are_ignored() {
    let (mut pipeline, remote, feed) = build_pipeline();
    feed.set(Some(detection(TrashCategory::Other, 0.4)));

    assert!(
        !pump_until(&mut pipeline, Duration::from_millis(100), |p| {
            p.coordinator().detections_admitted() > 0
        }),
        "low-confidence detection was admitted"
    );
    assert!(remote.written().is_empty());

    pipeline.shutdown().expect("shutdown");
}
