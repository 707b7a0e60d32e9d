use anyhow::Result;

use crate::detect::result::Detection;

/// Detection model backend.
///
/// The model is an external collaborator: given one RGB frame it returns
/// candidate detections with class, confidence and box coordinates. The
/// category set and count (4) must match the model's trained classes by
/// positional index; no runtime validation of that mapping exists.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on a frame.
    ///
    /// Implementations must treat the pixel slice as read-only and ephemeral.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
