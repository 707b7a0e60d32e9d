//! Actuation coordination.
//!
//! Serializes one physical sorting action at a time:
//!
//! ```text
//! IDLE -> DETECTING -> ACTUATING -> COOLDOWN -> IDLE
//! ```
//!
//! Jobs run on a single long-lived worker thread fed by an mpsc queue, so
//! ordering is structural. Admission is still gated by a single-flight
//! atomic flag set at submission time: a detection arriving while a job is
//! queued or running is rejected before it ever reaches the queue.
//!
//! The dwell (actuator travel + reset) happens on the worker thread so the
//! video feed keeps rendering. The cooldown revert back to AWAITING is the
//! pipeline's job: the worker reports completion and the pipeline schedules
//! the revert deadline.
//!
//! Any error inside a job is caught at the worker boundary: the servo lock
//! and the single-flight guard are force-released and the count is NOT
//! incremented, so a transient fault cannot deadlock the station.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::board::{BoardUpdate, CategoryState};
use crate::category::TrashCategory;
use crate::detect::Detection;
use crate::link::{protocol, SharedLink};

/// Default dwell while the actuator moves and resets.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(6);
/// Default cooldown before the slot reverts to AWAITING.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

struct Job {
    category: TrashCategory,
    confidence: f32,
    index: u64,
}

/// Single-flight actuation coordinator.
pub struct ActuationCoordinator {
    jobs: Option<Sender<Job>>,
    in_flight: Arc<AtomicBool>,
    processing: Arc<Mutex<Option<TrashCategory>>>,
    servo_lock: Arc<Mutex<()>>,
    detection_count: u64,
    worker: Option<JoinHandle<()>>,
}

impl ActuationCoordinator {
    /// Spawn the worker thread. `updates` carries board mutations back to
    /// the pipeline; `dwell` is the fixed actuation wait.
    pub fn new(link: SharedLink, updates: Sender<BoardUpdate>, dwell: Duration) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let in_flight = Arc::new(AtomicBool::new(false));
        let processing: Arc<Mutex<Option<TrashCategory>>> = Arc::new(Mutex::new(None));
        let servo_lock = Arc::new(Mutex::new(()));

        let worker_in_flight = in_flight.clone();
        let worker_processing = processing.clone();
        let worker_servo = servo_lock.clone();
        let worker = std::thread::spawn(move || {
            while let Ok(job) = jobs_rx.recv() {
                if let Ok(mut current) = worker_processing.lock() {
                    *current = Some(job.category);
                }

                if let Err(err) = run_job(&job, &link, &worker_servo, &updates, dwell) {
                    log::error!("actuation failed for {}: {}", job.category, err);
                    let _ = updates.send(BoardUpdate::Log(format!(
                        "处理检测时出错: {}",
                        err
                    )));
                    // The aborted sort never completes, so no cooldown revert
                    // will fire; reset the slot here instead.
                    let _ = updates.send(BoardUpdate::State(
                        job.category,
                        CategoryState::Awaiting,
                    ));
                }

                // Forced reset on every path, success or failure.
                if let Ok(mut current) = worker_processing.lock() {
                    *current = None;
                }
                worker_in_flight.store(false, Ordering::Release);
            }
        });

        Self {
            jobs: Some(jobs_tx),
            in_flight,
            processing,
            servo_lock,
            detection_count: 0,
            worker: Some(worker),
        }
    }

    /// True when a new detection may be admitted.
    ///
    /// Both guards are consulted: the single-flight flag (plus the
    /// processing marker it protects) and the servo lock.
    pub fn is_idle(&self) -> bool {
        if self.in_flight.load(Ordering::Acquire) {
            return false;
        }
        if self.processing_category().is_some() {
            return false;
        }
        !self.servo_locked()
    }

    /// Category currently mid-actuation, if any.
    pub fn processing_category(&self) -> Option<TrashCategory> {
        match self.processing.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn servo_locked(&self) -> bool {
        match self.servo_lock.try_lock() {
            Ok(_guard) => false,
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        }
    }

    /// Admit a detection if the station is idle. Returns false when another
    /// actuation is queued, running, or the coordinator is shut down.
    pub fn try_submit(&mut self, detection: &Detection) -> bool {
        if !self.is_idle() {
            return false;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.detection_count += 1;
        let job = Job {
            category: detection.category,
            confidence: detection.confidence,
            index: self.detection_count,
        };
        match &self.jobs {
            Some(jobs) if jobs.send(job).is_ok() => true,
            _ => {
                self.in_flight.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Total detections admitted since startup.
    pub fn detections_admitted(&self) -> u64 {
        self.detection_count
    }

    /// Stop the worker after the current job (if any) finishes.
    pub fn stop(mut self) -> Result<()> {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("actuation worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for ActuationCoordinator {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_job(
    job: &Job,
    link: &SharedLink,
    servo_lock: &Mutex<()>,
    updates: &Sender<BoardUpdate>,
    dwell: Duration,
) -> Result<()> {
    updates.send(BoardUpdate::State(job.category, CategoryState::Detecting))?;
    updates.send(BoardUpdate::Log(format!(
        "检测到第{}个物体: {} (置信度 {:.2})",
        job.index, job.category, job.confidence
    )))?;

    // Held through the dwell: no second command can be issued while the
    // actuator is moving.
    let _servo = servo_lock
        .lock()
        .map_err(|_| anyhow!("servo lock poisoned"))?;

    {
        let mut link = link
            .lock()
            .map_err(|_| anyhow!("serial link lock poisoned"))?;
        match link.as_mut() {
            Some(port) => {
                let command = protocol::command_for(job.category);
                port.write_line(&command)?;
                log::debug!("sent command {}", command);
            }
            // No link: detection-only mode, state machine proceeds identically.
            None => log::debug!("serial link absent, skipping command"),
        }
    }

    std::thread::sleep(dwell);

    updates.send(BoardUpdate::Sorted(job.category))?;
    updates.send(BoardUpdate::Log(format!("垃圾投放完成: {}", job.category)))?;
    Ok(())
}
