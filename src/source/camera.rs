//! Live camera source.
//!
//! The detection feed. A `stub://` device selects a synthetic generator;
//! real V4L2 devices are available behind the `ingest-v4l2` feature.
//!
//! A capture failure is downgraded to "no frame available": the pipeline
//! skips the tick for this stream and tries again on the next one. There is
//! no retry scheduling beyond the next tick.

use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;

/// Configuration for the live camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video1"), or `stub://` for synthetic frames.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Live camera source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(v4l2::DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(v4l2::DeviceCamera::new(config)?),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "camera device {} requires the ingest-v4l2 feature",
                config.device
            ))
        }
    }

    /// Open the device. Synthetic cameras are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.connect(),
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} (synthetic)",
            self.config.device
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.frame_count += 1;

        // Change the scene occasionally so the stub detector sees "objects".
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.scene_state as u64) % 256) as u8;
        }

        Ok(Some(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
        )?))
    }
}

// ----------------------------------------------------------------------------
// Production V4L2 camera
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod v4l2 {
    use anyhow::{Context, Result};
    use ouroboros::self_referencing;

    use super::CameraConfig;
    use crate::frame::Frame;

    pub(super) struct DeviceCamera {
        config: CameraConfig,
        state: Option<DeviceState>,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCamera {
        pub(super) fn new(config: CameraConfig) -> Result<Self> {
            Ok(Self {
                active_width: config.width,
                active_height: config.height,
                config,
                state: None,
            })
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let device = v4l::Device::with_path(&self.config.device)
                .with_context(|| format!("open v4l2 device {}", self.config.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format on {}: {}",
                        self.config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            self.active_width = format.width;
            self.active_height = format.height;

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 stream"))
                },
            }
            .try_build()?;
            self.state = Some(state);

            log::info!(
                "CameraSource: connected to {} ({}x{})",
                self.config.device,
                self.active_width,
                self.active_height
            );
            Ok(())
        }

        pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
            use v4l::io::traits::CaptureStream;

            let Some(state) = self.state.as_mut() else {
                anyhow::bail!("v4l2 device not connected");
            };
            // A capture failure skips this tick only.
            let pixels = match state.with_mut(|fields| {
                fields.stream.next().map(|(buf, _meta)| buf.to_vec())
            }) {
                Ok(pixels) => pixels,
                Err(err) => {
                    log::warn!("CameraSource: capture failed: {}", err);
                    return Ok(None);
                }
            };

            match Frame::new(pixels, self.active_width, self.active_height) {
                Ok(frame) => Ok(Some(frame)),
                Err(err) => {
                    log::warn!("CameraSource: dropped malformed frame: {}", err);
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_camera_produces_frames() -> Result<()> {
        let mut camera = CameraSource::new(CameraConfig::default())?;
        camera.connect()?;
        let frame = camera.next_frame()?.unwrap();
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        Ok(())
    }
}
