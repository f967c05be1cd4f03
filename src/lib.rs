//! Single-device YUYV webcam capture with fixed-size grayscale / RGB565 output
//!
//! A [`CaptureSession`] negotiates a capture resolution the device actually
//! offers and crops or pads each frame to the output size the caller asked for.

pub mod capture;
pub mod config;
pub mod convert;
pub mod error;
pub mod resolution;
pub mod session;
pub mod snapshot;

pub use capture::{CaptureDevice, DeviceOpener, FrameSize, V4lDevice, V4lOpener, CAPTURE_FOURCC};
pub use config::{CaptureConfig, FrameLimits};
pub use convert::{FitMode, OutputFormat, Placement};
pub use error::{CaptureError, Result};
pub use resolution::{negotiate, Resolution, ResolutionCatalog};
pub use session::{CaptureGeometry, CaptureSession, Frame, SessionState};
