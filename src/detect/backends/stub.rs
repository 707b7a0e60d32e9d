use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::category::TrashCategory;
use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Stub backend for testing and stub:// demo runs.
///
/// Hashes the frame and reports an "object" whenever the scene changes from
/// the previous frame, cycling through the four categories. Confidence is
/// fixed above the station threshold so a scene change always qualifies.
pub struct StubBackend {
    last_hash: Option<[u8; 32]>,
    next_class: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            last_hash: None,
            next_class: 0,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let current_hash: [u8; 32] = Sha256::digest(pixels).into();
        let changed = match self.last_hash {
            Some(prev) => prev != current_hash,
            None => false,
        };
        self.last_hash = Some(current_hash);

        if !changed {
            return Ok(Vec::new());
        }

        let category = TrashCategory::from_class_index(self.next_class % TrashCategory::ALL.len())
            .unwrap_or(TrashCategory::Other);
        self.next_class += 1;

        Ok(vec![Detection {
            category,
            confidence: 0.85,
            bounding_box: BoundingBox {
                x1: width as f32 * 0.25,
                y1: height as f32 * 0.25,
                x2: width as f32 * 0.75,
                y2: height as f32 * 0.75,
            },
        }])
    }
}
