//! Smart trash sorting station.
//!
//! A camera watches a drop zone, a detector classifies what lands in it,
//! and a serial-attached microcontroller rotates the chute to the matching
//! bin. Sorting is strictly one object at a time:
//!
//! ```text
//! IDLE -> DETECTING -> ACTUATING -> COOLDOWN -> IDLE
//! ```
//!
//! # Module Structure
//!
//! - `source`: frame ingest (looping clip feed + live camera feed)
//! - `detect`: object detection backends and the per-frame detector
//! - `actuate`: single-flight actuation queue driving the chute
//! - `link`: serial protocol and transport to the microcontroller
//! - `listener`: background poller for bin-full signals
//! - `board`: per-category status aggregate fed by message passing
//! - `pipeline`: the fixed-tick loop tying all of the above together
//! - `palette`: dominant-color extraction for the sibling web service

pub mod actuate;
pub mod board;
pub mod category;
pub mod config;
pub mod detect;
pub mod frame;
pub mod link;
pub mod listener;
pub mod palette;
pub mod pipeline;
pub mod source;
pub mod ui;

pub use actuate::{ActuationCoordinator, DEFAULT_COOLDOWN, DEFAULT_DWELL};
pub use board::{BoardUpdate, CategoryState, CategoryStatus, StatusBoard};
pub use category::TrashCategory;
pub use config::SorterConfig;
pub use detect::{BoundingBox, Detection, Detector, DetectorBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use frame::Frame;
pub use link::{LoopbackLink, SerialLink, SharedLink};
#[cfg(feature = "link-serialport")]
pub use link::PortLink;
pub use listener::SerialListener;
pub use pipeline::{Pipeline, Timing};
pub use source::{CameraConfig, CameraSource, ClipConfig, ClipSource, FrameSource};
