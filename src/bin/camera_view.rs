//! camera_view - standalone detection viewer
//!
//! Runs the camera and detector without any actuation: each qualifying
//! detection is printed with its label and confidence, alongside a capture
//! rate estimate. Useful for aiming the camera and sanity-checking a model
//! before wiring up the sorting hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use sort_station::{CameraConfig, CameraSource, Detector, FrameSource, StubBackend};

#[derive(Parser, Debug)]
#[command(name = "camera_view", about = "Live detection viewer")]
struct Args {
    /// Camera device (stub://camera or a V4L2 device path)
    #[arg(long, default_value = "stub://camera")]
    device: String,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Confidence threshold; stricter than the station default so the
    /// printout stays readable.
    #[arg(long, default_value_t = 0.8)]
    threshold: f32,

    /// ONNX model path (stub detector when omitted or missing)
    #[arg(long)]
    model: Option<String>,

    /// Tick period in milliseconds
    #[arg(long, default_value_t = 33)]
    tick_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut camera = CameraSource::new(CameraConfig {
        device: args.device.clone(),
        width: args.width,
        height: args.height,
    })?;
    camera.connect()?;

    let mut detector = build_detector(&args)?;
    detector.warm_up().context("detector warm-up failed")?;
    println!(
        "viewing {} at {}x{} with {} backend (threshold {:.2}), Ctrl-C to stop",
        args.device,
        args.width,
        args.height,
        detector.backend_name(),
        args.threshold
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        ctrlc_shutdown.store(true, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    let tick = Duration::from_millis(args.tick_ms);
    let mut frames = 0u64;
    let mut window_start = Instant::now();
    let mut fps = 0.0f64;

    while !shutdown.load(Ordering::SeqCst) {
        match camera.next_frame() {
            Ok(Some(frame)) => {
                frames += 1;
                let elapsed = window_start.elapsed();
                if elapsed >= Duration::from_secs(1) {
                    fps = frames as f64 / elapsed.as_secs_f64();
                    frames = 0;
                    window_start = Instant::now();
                }

                match detector.detect_best(&frame) {
                    Ok(Some(detection)) => {
                        let bb = detection.bounding_box;
                        println!(
                            "{} {:.2} [{:.0},{:.0} {:.0},{:.0}] fps={:.1}",
                            detection.category,
                            detection.confidence,
                            bb.x1,
                            bb.y1,
                            bb.x2,
                            bb.y2,
                            fps
                        );
                    }
                    Ok(None) => {}
                    Err(err) => log::warn!("inference failed: {}", err),
                }
            }
            Ok(None) => {}
            Err(err) => log::warn!("camera read failed: {}", err),
        }
        std::thread::sleep(tick);
    }

    println!("stopped");
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_detector(args: &Args) -> Result<Detector> {
    use sort_station::TractBackend;

    if let Some(model) = &args.model {
        if std::path::Path::new(model).exists() {
            let backend = TractBackend::new(model, args.width, args.height)?;
            return Ok(Detector::new(Box::new(backend), args.threshold));
        }
        log::warn!("model {} not found, using stub detector", model);
    }
    Ok(Detector::new(Box::new(StubBackend::new()), args.threshold))
}

#[cfg(not(feature = "backend-tract"))]
fn build_detector(args: &Args) -> Result<Detector> {
    if args.model.is_some() {
        log::warn!("model given but detector backend is not compiled in, using stub");
    }
    Ok(Detector::new(Box::new(StubBackend::new()), args.threshold))
}
