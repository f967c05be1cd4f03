mod v4l_device;

pub use v4l_device::{V4lDevice, V4lOpener};

use crate::resolution::Resolution;
use std::io;
use std::path::Path;
use v4l::FourCC;

/// Pixel format every session captures in: packed 4:2:2 Y0 U Y1 V
pub const CAPTURE_FOURCC: FourCC = FourCC { repr: *b"YUYV" };

/// One frame size entry as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    Discrete(Resolution),
    /// Continuous or stepwise range; not used for negotiation
    Stepwise { min: Resolution, max: Resolution },
}

/// Opens capture devices by path
pub trait DeviceOpener {
    type Device: CaptureDevice;

    fn open(&self, path: &Path) -> io::Result<Self::Device>;
}

/// Single-buffer streaming capture device
///
/// Dropping the device closes it.
pub trait CaptureDevice {
    /// Pixel formats the device can capture in
    fn pixel_formats(&self) -> io::Result<Vec<FourCC>>;

    /// Frame sizes offered for `fourcc`, in driver order
    fn frame_sizes(&self, fourcc: FourCC) -> io::Result<Vec<FrameSize>>;

    /// Request a capture format; returns the size the driver actually applied
    fn set_format(&mut self, fourcc: FourCC, size: Resolution) -> io::Result<Resolution>;

    /// Request and map exactly one hardware buffer, returning its length
    fn map_buffer(&mut self) -> io::Result<usize>;

    /// Hand the mapped buffer to the driver
    fn queue_buffer(&mut self) -> io::Result<()>;

    fn start_streaming(&mut self) -> io::Result<()>;

    /// Block until the driver fills the buffer and return the bytes used
    fn dequeue_buffer(&mut self) -> io::Result<&[u8]>;

    fn stop_streaming(&mut self) -> io::Result<()>;

    /// Release the mapping; no-op when nothing is mapped
    fn unmap_buffer(&mut self);
}
