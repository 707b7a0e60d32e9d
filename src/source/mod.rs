//! Frame sources.
//!
//! Two independent streams feed the station:
//! - `ClipSource`: a looping pre-recorded clip (decorative feed; restarts
//!   from the first frame whenever the end is reached)
//! - `CameraSource`: the live detection feed (stub synthetic backend by
//!   default, real V4L2 device behind the `ingest-v4l2` feature)
//!
//! Sources are polled on a fixed tick. There is no queueing: if the caller
//! cannot keep up, frames are simply never read. A live-read failure is
//! reported as "no frame available" and only that stream's tick is skipped.

pub mod camera;
pub mod clip;

pub use camera::{CameraConfig, CameraSource};
pub use clip::{ClipConfig, ClipSource};

use anyhow::Result;

use crate::frame::Frame;

/// A pollable stream of decoded frames.
///
/// `Ok(None)` means no frame was available this tick; the caller skips the
/// stream and retries on the next tick. Errors are reserved for conditions
/// the caller cannot recover by retrying (e.g., a device that was never
/// opened).
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
