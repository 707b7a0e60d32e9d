use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Per-frame detector.
///
/// Runs the backend on one frame and keeps only the single detection with
/// the highest confidence, or none if nothing clears the acceptance
/// threshold. Every frame is evaluated independently.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    threshold: f32,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>, threshold: f32) -> Self {
        Self { backend, threshold }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Evaluate one frame and return the best qualifying detection.
    pub fn detect_best(&mut self, frame: &Frame) -> Result<Option<Detection>> {
        let detections = self
            .backend
            .detect(frame.pixels(), frame.width(), frame.height())?;
        let best = detections
            .into_iter()
            .filter(|d| d.confidence > self.threshold)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
        Ok(best)
    }
}
