//! The station pipeline: capture -> inference -> actuation -> board.
//!
//! One cooperative loop drives everything at a fixed tick. The tick itself
//! never blocks on actuation: dwells happen on the coordinator's worker
//! thread, and board mutations travel back over a channel drained here once
//! per tick. Frames are dropped implicitly when inference cannot keep up;
//! there is no queueing.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::actuate::{ActuationCoordinator, DEFAULT_COOLDOWN, DEFAULT_DWELL};
use crate::board::{BoardUpdate, CategoryState, StatusBoard};
use crate::category::TrashCategory;
use crate::detect::Detector;
use crate::link::SharedLink;
use crate::source::FrameSource;

/// Fixed periods of the station loop.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    /// Capture/inference tick period (~30 fps).
    pub tick: Duration,
    /// Actuator travel + reset dwell.
    pub dwell: Duration,
    /// Cooldown before a slot reverts to AWAITING.
    pub cooldown: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(33),
            dwell: DEFAULT_DWELL,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// The detection-to-actuation pipeline.
pub struct Pipeline {
    clip: Option<Box<dyn FrameSource>>,
    camera: Box<dyn FrameSource>,
    detector: Detector,
    coordinator: ActuationCoordinator,
    board: StatusBoard,
    updates_tx: Sender<BoardUpdate>,
    updates_rx: Receiver<BoardUpdate>,
    pending_reverts: Vec<(TrashCategory, Instant)>,
    cooldown: Duration,
    frames_processed: u64,
    last_frame_at: Option<Instant>,
    fps: f64,
}

impl Pipeline {
    pub fn new(
        camera: Box<dyn FrameSource>,
        clip: Option<Box<dyn FrameSource>>,
        detector: Detector,
        link: SharedLink,
        timing: Timing,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel();
        let coordinator = ActuationCoordinator::new(link, updates_tx.clone(), timing.dwell);
        Self {
            clip,
            camera,
            detector,
            coordinator,
            board: StatusBoard::new(),
            updates_tx,
            updates_rx,
            pending_reverts: Vec::new(),
            cooldown: timing.cooldown,
            frames_processed: 0,
            last_frame_at: None,
            fps: 0.0,
        }
    }

    /// Sender for components feeding the board from outside the pipeline
    /// (the serial listener).
    pub fn updates_sender(&self) -> Sender<BoardUpdate> {
        self.updates_tx.clone()
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn coordinator(&self) -> &ActuationCoordinator {
        &self.coordinator
    }

    /// Smoothed capture rate of the live feed.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Run one tick: poll both streams, evaluate the live frame, admit at
    /// most one actuation, then sync the board.
    pub fn tick(&mut self) -> Result<()> {
        // The looping clip is decorative; keep it advancing so it stays in
        // sync with wall time, but its frames carry no detections.
        if let Some(clip) = self.clip.as_mut() {
            if let Err(err) = clip.next_frame() {
                log::warn!("clip read failed: {}", err);
            }
        }

        match self.camera.next_frame() {
            Ok(Some(frame)) => {
                self.track_fps();
                match self.detector.detect_best(&frame) {
                    Ok(Some(detection)) => {
                        if self.coordinator.is_idle()
                            && self.coordinator.try_submit(&detection)
                        {
                            log::debug!(
                                "admitted detection #{}: {} ({:.2})",
                                self.coordinator.detections_admitted(),
                                detection.category,
                                detection.confidence
                            );
                        }
                    }
                    Ok(None) => {}
                    // Inference failure skips this tick only.
                    Err(err) => log::warn!("inference failed: {}", err),
                }
            }
            // No frame available: skip this stream's tick, retry next tick.
            Ok(None) => {}
            Err(err) => log::warn!("camera read failed: {}", err),
        }

        self.drain_updates();
        self.process_reverts();
        Ok(())
    }

    /// Apply every queued board update; completed actuations schedule their
    /// cooldown revert here.
    fn drain_updates(&mut self) {
        while let Ok(update) = self.updates_rx.try_recv() {
            if let BoardUpdate::Sorted(category) = update {
                self.pending_reverts
                    .push((category, Instant::now() + self.cooldown));
            }
            self.board.apply(update);
        }
    }

    /// Revert slots whose cooldown elapsed, unless their bin is full.
    fn process_reverts(&mut self) {
        let now = Instant::now();
        let board = &mut self.board;
        self.pending_reverts.retain(|&(category, deadline)| {
            if now < deadline {
                return true;
            }
            if !board.status(category).is_full {
                board.apply(BoardUpdate::State(category, CategoryState::Awaiting));
                log::debug!("{} 状态重置为待检测", category);
            }
            false
        });
    }

    fn track_fps(&mut self) {
        self.frames_processed += 1;
        let now = Instant::now();
        if let Some(last) = self.last_frame_at {
            let elapsed = now.duration_since(last).as_secs_f64();
            if elapsed > 0.0 {
                let instant_fps = 1.0 / elapsed;
                self.fps = if self.fps > 0.0 {
                    0.9 * self.fps + 0.1 * instant_fps
                } else {
                    instant_fps
                };
            }
        }
        self.last_frame_at = Some(now);
    }

    /// Stop the actuation worker, letting an in-flight job finish.
    pub fn shutdown(self) -> Result<()> {
        // Drop the pipeline's own sender first so the worker can exit.
        drop(self.updates_tx);
        self.coordinator.stop()
    }
}
