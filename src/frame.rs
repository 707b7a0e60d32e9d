//! Decoded video frames.
//!
//! Frames are ephemeral: a source produces one per tick, the detector reads
//! it, and it is dropped. Nothing in the station retains pixel data across
//! ticks and nothing writes it to disk.

use anyhow::{anyhow, Result};

/// One decoded RGB frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap raw RGB8 pixel data. The buffer length must be `width * height * 3`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn from_rgb_image(image: image::RgbImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            pixels: image.into_raw(),
            width,
            height,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
