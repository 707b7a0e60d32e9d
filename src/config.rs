use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::pipeline::Timing;

const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CLIP_PATH: &str = "stub://movie";
const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_THRESHOLD: f32 = 0.5;
const DEFAULT_TICK_MS: u64 = 33;
const DEFAULT_DWELL_SECS: u64 = 6;
const DEFAULT_COOLDOWN_SECS: u64 = 3;

#[derive(Debug, Deserialize, Default)]
struct SorterConfigFile {
    camera: Option<CameraConfigFile>,
    clip: Option<ClipConfigFile>,
    detector: Option<DetectorConfigFile>,
    serial: Option<SerialConfigFile>,
    timing: Option<TimingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClipConfigFile {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    port: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    tick_ms: Option<u64>,
    dwell_secs: Option<u64>,
    cooldown_secs: Option<u64>,
}

/// Resolved station configuration.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    pub clip_path: String,
    pub model_path: String,
    pub threshold: f32,
    /// Serial port path; `None` runs detection-only.
    pub serial_port: Option<String>,
    pub timing: Timing,
}

impl SorterConfig {
    /// Load from the TOML file named by `SORTER_CONFIG` (if set), then apply
    /// `SORTER_*` environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SORTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SorterConfigFile) -> Self {
        let timing = Timing {
            tick: Duration::from_millis(
                file.timing
                    .as_ref()
                    .and_then(|t| t.tick_ms)
                    .unwrap_or(DEFAULT_TICK_MS),
            ),
            dwell: Duration::from_secs(
                file.timing
                    .as_ref()
                    .and_then(|t| t.dwell_secs)
                    .unwrap_or(DEFAULT_DWELL_SECS),
            ),
            cooldown: Duration::from_secs(
                file.timing
                    .as_ref()
                    .and_then(|t| t.cooldown_secs)
                    .unwrap_or(DEFAULT_COOLDOWN_SECS),
            ),
        };
        Self {
            camera_device: file
                .camera
                .as_ref()
                .and_then(|c| c.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            camera_width: file
                .camera
                .as_ref()
                .and_then(|c| c.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            camera_height: file
                .camera
                .as_ref()
                .and_then(|c| c.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            clip_path: file
                .clip
                .and_then(|c| c.path)
                .unwrap_or_else(|| DEFAULT_CLIP_PATH.to_string()),
            model_path: file
                .detector
                .as_ref()
                .and_then(|d| d.model_path.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            threshold: file
                .detector
                .and_then(|d| d.threshold)
                .unwrap_or(DEFAULT_THRESHOLD),
            serial_port: file.serial.and_then(|s| s.port),
            timing,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("SORTER_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera_device = device;
            }
        }
        if let Ok(path) = std::env::var("SORTER_CLIP_PATH") {
            if !path.trim().is_empty() {
                self.clip_path = path;
            }
        }
        if let Ok(path) = std::env::var("SORTER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = path;
            }
        }
        if let Ok(port) = std::env::var("SORTER_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.serial_port = Some(port);
            }
        }
        if let Ok(threshold) = std::env::var("SORTER_THRESHOLD") {
            self.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("SORTER_THRESHOLD must be a number in [0, 1]"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!("detector threshold must be within [0, 1]"));
        }
        if self.timing.tick.is_zero() {
            return Err(anyhow!("tick period must be greater than zero"));
        }
        if self.camera_width == 0 || self.camera_height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SorterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
