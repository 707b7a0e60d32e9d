//! sorterd - smart trash sorting station daemon
//!
//! This daemon:
//! 1. Advances the looping display clip and polls the live camera feed
//! 2. Runs object detection on each live frame
//! 3. Admits at most one detection at a time into the actuation queue
//! 4. Drives the sorting chute over the serial link (when present)
//! 5. Listens for bin-full signals and mirrors them on the status board

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use sort_station::link::{self, SerialLink};
use sort_station::{
    CameraConfig, CameraSource, ClipConfig, ClipSource, Detector, FrameSource, Pipeline,
    SerialListener, SorterConfig,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SorterConfig::load()?;

    let mut camera = CameraSource::new(CameraConfig {
        device: cfg.camera_device.clone(),
        width: cfg.camera_width,
        height: cfg.camera_height,
    })?;
    camera.connect()?;

    // The clip feed is decorative; a missing clip never blocks sorting.
    let clip: Option<Box<dyn FrameSource>> = match ClipSource::new(ClipConfig {
        path: cfg.clip_path.clone(),
    }) {
        Ok(clip) => {
            log::info!("clip feed: {} ({} frames)", cfg.clip_path, clip.frame_count());
            Some(Box::new(clip))
        }
        Err(err) => {
            log::warn!("clip feed unavailable ({}), continuing without it", err);
            None
        }
    };

    let mut detector = build_detector(&cfg)?;
    detector.warm_up().context("detector warm-up failed")?;
    log::info!(
        "detector backend: {} (threshold {:.2})",
        detector.backend_name(),
        cfg.threshold
    );

    let serial = open_link(&cfg);
    if serial.is_none() {
        log::warn!("serial link absent: running in detection-only mode");
    }
    let link = link::shared(serial);

    let shutdown = Arc::new(AtomicBool::new(false));
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        ctrlc_shutdown.store(true, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    let mut pipeline = Pipeline::new(Box::new(camera), clip, detector, link.clone(), cfg.timing);
    let listener = SerialListener::spawn(link, pipeline.updates_sender(), shutdown.clone());

    log::info!(
        "sorterd running: camera={} tick={:?} dwell={:?} cooldown={:?}",
        cfg.camera_device,
        cfg.timing.tick,
        cfg.timing.dwell,
        cfg.timing.cooldown
    );

    let mut last_health_log = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        pipeline.tick()?;

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            log::info!(
                "health: fps={:.1} detections={} idle={}",
                pipeline.fps(),
                pipeline.coordinator().detections_admitted(),
                pipeline.coordinator().is_idle()
            );
            for line in pipeline.board().render_table().lines() {
                log::info!("{}", line);
            }
            last_health_log = Instant::now();
        }

        std::thread::sleep(cfg.timing.tick);
    }

    log::info!("shutting down");
    listener.stop()?;
    pipeline.shutdown()?;
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_detector(cfg: &SorterConfig) -> Result<Detector> {
    use sort_station::{StubBackend, TractBackend};

    if std::path::Path::new(&cfg.model_path).exists() {
        let backend = TractBackend::new(&cfg.model_path, cfg.camera_width, cfg.camera_height)?;
        return Ok(Detector::new(Box::new(backend), cfg.threshold));
    }
    log::warn!("model {} not found, using stub detector", cfg.model_path);
    Ok(Detector::new(Box::new(StubBackend::new()), cfg.threshold))
}

#[cfg(not(feature = "backend-tract"))]
fn build_detector(cfg: &SorterConfig) -> Result<Detector> {
    use sort_station::StubBackend;

    Ok(Detector::new(Box::new(StubBackend::new()), cfg.threshold))
}

#[cfg(feature = "link-serialport")]
fn open_link(cfg: &SorterConfig) -> Option<Box<dyn SerialLink>> {
    let port = cfg.serial_port.as_deref()?;
    match sort_station::PortLink::open(port) {
        Ok(link) => {
            log::info!("serial link open on {}", port);
            Some(Box::new(link))
        }
        Err(err) => {
            log::warn!("failed to open serial port {}: {}", port, err);
            None
        }
    }
}

#[cfg(not(feature = "link-serialport"))]
fn open_link(cfg: &SorterConfig) -> Option<Box<dyn SerialLink>> {
    if let Some(port) = &cfg.serial_port {
        log::warn!(
            "serial port {} configured but serial support is not compiled in",
            port
        );
    }
    None
}
