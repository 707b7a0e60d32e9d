//! Looping clip source.
//!
//! Plays a pre-recorded clip stored as an ordered directory of image frames
//! (JPEG/PNG, sorted by file name). When the last frame has been read the
//! cursor seeks back to the first frame before the next read, so the clip
//! never terminates. A `stub://` path selects a synthetic generator with the
//! same looping behavior.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::frame::Frame;

/// Configuration for the looping clip.
#[derive(Clone, Debug)]
pub struct ClipConfig {
    /// Directory of image frames, or a `stub://` path for synthetic frames.
    pub path: String,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            path: "stub://movie".to_string(),
        }
    }
}

/// Looping clip source.
pub struct ClipSource {
    backend: ClipBackend,
}

enum ClipBackend {
    Synthetic(SyntheticClip),
    Frames(FrameDirClip),
}

impl ClipSource {
    pub fn new(config: ClipConfig) -> Result<Self> {
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: ClipBackend::Synthetic(SyntheticClip::new()),
            })
        } else {
            Ok(Self {
                backend: ClipBackend::Frames(FrameDirClip::new(&config.path)?),
            })
        }
    }

    /// Total frames in one pass of the clip.
    pub fn frame_count(&self) -> usize {
        match &self.backend {
            ClipBackend::Synthetic(clip) => clip.frame_count(),
            ClipBackend::Frames(clip) => clip.frames.len(),
        }
    }
}

impl FrameSource for ClipSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            ClipBackend::Synthetic(clip) => Ok(Some(clip.next_frame())),
            ClipBackend::Frames(clip) => clip.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Directory-of-frames clip
// ----------------------------------------------------------------------------

struct FrameDirClip {
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl FrameDirClip {
    fn new(path: &str) -> Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("failed to read clip directory {}", path))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|ext| ext.to_str()),
                    Some("jpg") | Some("jpeg") | Some("png")
                )
            })
            .collect();
        frames.sort();
        if frames.is_empty() {
            return Err(anyhow!("clip directory {} contains no image frames", path));
        }
        Ok(Self { frames, cursor: 0 })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        // Seek back to frame 0 before reading past the end.
        if self.cursor >= self.frames.len() {
            self.cursor = 0;
        }
        let path = &self.frames[self.cursor];
        self.cursor += 1;

        match image::open(path) {
            Ok(decoded) => Ok(Some(Frame::from_rgb_image(decoded.to_rgb8()))),
            Err(err) => {
                log::warn!("ClipSource: failed to decode {}: {}", path.display(), err);
                Ok(None)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip (stub://)
// ----------------------------------------------------------------------------

struct SyntheticClip {
    cursor: usize,
}

const SYNTHETIC_CLIP_FRAMES: usize = 30;
const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;

impl SyntheticClip {
    fn new() -> Self {
        Self { cursor: 0 }
    }

    fn frame_count(&self) -> usize {
        SYNTHETIC_CLIP_FRAMES
    }

    fn next_frame(&mut self) -> Frame {
        if self.cursor >= SYNTHETIC_CLIP_FRAMES {
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;

        let pixel_count = (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i + index * 7) % 256) as u8;
        }
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)
            .unwrap_or_else(|_| unreachable!("synthetic buffer length is exact"))
    }
}
