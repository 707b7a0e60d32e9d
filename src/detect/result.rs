use crate::category::TrashCategory;

/// Pixel-space bounding box (x1, y1, x2, y2).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// A single detection produced for one frame.
///
/// Ephemeral: drawn/consumed and discarded. No temporal smoothing is applied
/// across frames.
#[derive(Clone, Copy, Debug)]
pub struct Detection {
    pub category: TrashCategory,
    /// Model confidence in [0, 1].
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}
