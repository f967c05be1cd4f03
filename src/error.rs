use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a capture session and its collaborators
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Cannot open device {}: {source}", path.display())]
    DeviceOpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Device does not offer the {fourcc} pixel format")]
    UnsupportedFormat { fourcc: String },

    #[error("Cannot negotiate capture format: {0}")]
    FormatNegotiationFailure(#[source] io::Error),

    #[error("Cannot allocate frame buffer: {0}")]
    BufferAllocationFailure(#[source] io::Error),

    #[error("Cannot start streaming: {0}")]
    StreamStartFailure(#[source] io::Error),

    #[error("Cannot dequeue frame: {0}")]
    DequeueFailure(#[source] io::Error),

    #[error("Invalid output dimensions {width}x{height} (max {max_width}x{max_height})")]
    InvalidDimensions {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Frame holds {actual} bytes, capture geometry needs {expected}")]
    InvalidFrame { expected: usize, actual: usize },

    #[error("Session is not streaming")]
    NotStreaming,

    #[error("Internal consistency error: {0}")]
    InternalConsistency(&'static str),
}

impl CaptureError {
    /// OS error code of the device-boundary failure, if there was one
    pub fn os_error(&self) -> Option<i32> {
        match self {
            CaptureError::DeviceOpenFailure { source, .. } => source.raw_os_error(),
            CaptureError::FormatNegotiationFailure(e)
            | CaptureError::BufferAllocationFailure(e)
            | CaptureError::StreamStartFailure(e)
            | CaptureError::DequeueFailure(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
