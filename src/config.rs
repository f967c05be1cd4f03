use crate::error::{CaptureError, Result};
use std::path::PathBuf;

/// Device opened when the caller does not name one
pub const DEFAULT_DEVICE: &str = "/dev/video0";

pub const DEFAULT_OUTPUT_WIDTH: u32 = 240;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 240;

pub const MAX_FRAME_WIDTH: u32 = 3840;
pub const MAX_FRAME_HEIGHT: u32 = 2160;

/// Upper bound on output frame dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_width: MAX_FRAME_WIDTH,
            max_height: MAX_FRAME_HEIGHT,
        }
    }
}

impl FrameLimits {
    /// Reject zero-sized or oversized output dimensions
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || width > self.max_width || height > self.max_height {
            return Err(CaptureError::InvalidDimensions {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        Ok(())
    }
}

/// Everything needed to open a capture session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: PathBuf,
    pub output_width: u32,
    pub output_height: u32,
    pub limits: FrameLimits,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            output_width: DEFAULT_OUTPUT_WIDTH,
            output_height: DEFAULT_OUTPUT_HEIGHT,
            limits: FrameLimits::default(),
        }
    }
}

impl CaptureConfig {
    pub fn new(device: impl Into<PathBuf>, output_width: u32, output_height: u32) -> Self {
        Self {
            device: device.into(),
            output_width,
            output_height,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.limits.validate(self.output_width, self.output_height)
    }
}
