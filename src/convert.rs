//! YUYV (4:2:2) to grayscale / RGB565 conversion
//!
//! Frames are never resampled. A smaller output takes the centered window of the
//! capture (crop), a larger one gets the capture centered on a black border (pad).

use crate::error::{CaptureError, Result};
use crate::resolution::Resolution;
use std::fmt;
use std::str::FromStr;

/// Pixel layout of a converted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// One luma byte per pixel
    Grayscale,
    /// 5-6-5 packed color, two little-endian bytes per pixel
    Rgb565,
}

impl OutputFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            OutputFormat::Grayscale => 1,
            OutputFormat::Rgb565 => 2,
        }
    }

    /// Size of a converted frame in bytes
    pub fn frame_len(&self, size: Resolution) -> usize {
        size.pixels() * self.bytes_per_pixel()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Grayscale => write!(f, "grayscale"),
            OutputFormat::Rgb565 => write!(f, "rgb565"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grayscale" | "gray" | "grey" => Ok(OutputFormat::Grayscale),
            "rgb565" | "color" | "colour" => Ok(OutputFormat::Rgb565),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// How a capture is fitted into an output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitMode {
    /// Output fits inside the capture; take the centered window
    Crop,
    /// Output is larger than the capture on some axis; center it on black
    Pad,
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMode::Crop => write!(f, "crop"),
            FitMode::Pad => write!(f, "pad"),
        }
    }
}

/// The rectangle copied from source to destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub mode: FitMode,
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Compute the centered window for `src` -> `dst`
    ///
    /// Horizontal offsets are rounded down to even so a window always starts on
    /// a Y0 U Y1 V unit boundary. When the output is larger on one axis and
    /// smaller on the other, the larger axis is padded and the smaller cropped.
    pub fn new(src: Resolution, dst: Resolution) -> Self {
        let mode = if dst.width <= src.width && dst.height <= src.height {
            FitMode::Crop
        } else {
            FitMode::Pad
        };

        let (src_x, dst_x, width) = center_axis(src.width, dst.width);
        let (src_y, dst_y, height) = center_axis(src.height, dst.height);

        Self {
            mode,
            src_x: src_x & !1,
            src_y,
            dst_x: dst_x & !1,
            dst_y,
            width,
            height,
        }
    }
}

/// Returns (source offset, destination offset, span) for one axis
fn center_axis(src: u32, dst: u32) -> (u32, u32, u32) {
    if dst <= src {
        ((src - dst) / 2, 0, dst)
    } else {
        (0, (dst - src) / 2, src)
    }
}

/// BT.601 studio-range YUV to 8-bit RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    (clamp(r), clamp(g), clamp(b))
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[inline]
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Convert a YUYV frame into 8-bit grayscale
pub fn yuyv_to_grayscale(
    src: &[u8],
    src_size: Resolution,
    dst: &mut [u8],
    dst_size: Resolution,
) -> Result<Placement> {
    let placement = prepare(src, src_size, dst, dst_size, OutputFormat::Grayscale)?;

    walk_window(src, src_size, dst_size, &placement, |index, y, _, _| {
        dst[index] = y;
    });

    Ok(placement)
}

/// Convert a YUYV frame into little-endian RGB565
pub fn yuyv_to_rgb565(
    src: &[u8],
    src_size: Resolution,
    dst: &mut [u8],
    dst_size: Resolution,
) -> Result<Placement> {
    let placement = prepare(src, src_size, dst, dst_size, OutputFormat::Rgb565)?;

    walk_window(src, src_size, dst_size, &placement, |index, y, u, v| {
        let (r, g, b) = yuv_to_rgb(y, u, v);
        let packed = pack_rgb565(r, g, b).to_le_bytes();
        dst[index * 2] = packed[0];
        dst[index * 2 + 1] = packed[1];
    });

    Ok(placement)
}

/// Convert into `format`, dispatching to the matching routine
pub fn convert(
    format: OutputFormat,
    src: &[u8],
    src_size: Resolution,
    dst: &mut [u8],
    dst_size: Resolution,
) -> Result<Placement> {
    match format {
        OutputFormat::Grayscale => yuyv_to_grayscale(src, src_size, dst, dst_size),
        OutputFormat::Rgb565 => yuyv_to_rgb565(src, src_size, dst, dst_size),
    }
}

/// Check buffer sizes, compute the window and blank the border in pad mode
fn prepare(
    src: &[u8],
    src_size: Resolution,
    dst: &mut [u8],
    dst_size: Resolution,
    format: OutputFormat,
) -> Result<Placement> {
    let expected = src_size.pixels() * 2;
    if src.len() < expected {
        return Err(CaptureError::InvalidFrame {
            expected,
            actual: src.len(),
        });
    }
    if dst.len() != format.frame_len(dst_size) {
        return Err(CaptureError::InternalConsistency(
            "output buffer does not match output dimensions",
        ));
    }

    let placement = Placement::new(src_size, dst_size);
    if placement.mode == FitMode::Pad {
        dst.fill(0);
    }
    Ok(placement)
}

/// Visit every pixel of the window as (destination index, Y, U, V)
///
/// Both luma samples of a unit share its chroma pair.
fn walk_window<F>(src: &[u8], src_size: Resolution, dst_size: Resolution, p: &Placement, mut put: F)
where
    F: FnMut(usize, u8, u8, u8),
{
    let stride = src_size.width as usize * 2;
    let width = p.width as usize;

    for row in 0..p.height as usize {
        let src_row = (p.src_y as usize + row) * stride + p.src_x as usize * 2;
        let dst_row = (p.dst_y as usize + row) * dst_size.width as usize + p.dst_x as usize;

        for col in (0..width).step_by(2) {
            let unit = src_row + col * 2;
            let y0 = src[unit];
            let u = src[unit + 1];
            // odd-width sources have no V for their last pixel
            let v = src.get(unit + 3).copied().unwrap_or(128);

            put(dst_row + col, y0, u, v);
            if col + 1 < width {
                put(dst_row + col + 1, src[unit + 2], u, v);
            }
        }
    }
}
