//! Capture resolution discovery and selection

use crate::capture::{CaptureDevice, FrameSize, CAPTURE_FOURCC};
use crate::convert::FitMode;
use crate::error::{CaptureError, Result};
use std::fmt;

/// Most discrete sizes kept from one enumeration
pub const MAX_CATALOG_ENTRIES: usize = 32;

/// Used when the device lists no discrete sizes, ascending by area
pub const FALLBACK_RESOLUTIONS: [Resolution; 8] = [
    Resolution::new(160, 120),
    Resolution::new(176, 144),
    Resolution::new(320, 240),
    Resolution::new(352, 288),
    Resolution::new(640, 480),
    Resolution::new(800, 600),
    Resolution::new(1280, 720),
    Resolution::new(1920, 1080),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when `other` fits inside this resolution on both axes
    pub fn contains(&self, other: Resolution) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resolutions a device advertises for the capture pixel format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionCatalog {
    entries: Vec<Resolution>,
    fallback: bool,
}

impl ResolutionCatalog {
    /// Enumerate the discrete YUYV frame sizes of `device`
    ///
    /// Fails with `UnsupportedFormat` when the device does not list YUYV at all.
    /// Stepwise/continuous entries are skipped; if nothing discrete remains the
    /// catalog holds [`FALLBACK_RESOLUTIONS`].
    pub fn query<D: CaptureDevice + ?Sized>(device: &D) -> Result<Self> {
        let formats = device
            .pixel_formats()
            .map_err(CaptureError::FormatNegotiationFailure)?;

        if !formats.iter().any(|f| *f == CAPTURE_FOURCC) {
            return Err(CaptureError::UnsupportedFormat {
                fourcc: CAPTURE_FOURCC.to_string(),
            });
        }

        let sizes = match device.frame_sizes(CAPTURE_FOURCC) {
            Ok(sizes) => sizes,
            Err(e) => {
                tracing::debug!("Frame size enumeration failed: {}", e);
                Vec::new()
            }
        };

        let entries: Vec<Resolution> = sizes
            .into_iter()
            .filter_map(|size| match size {
                FrameSize::Discrete(res) => Some(res),
                FrameSize::Stepwise { .. } => None,
            })
            .take(MAX_CATALOG_ENTRIES)
            .collect();

        if entries.is_empty() {
            tracing::info!("No discrete frame sizes reported, using fallback resolutions");
            return Ok(Self::fallback());
        }

        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<Resolution>) -> Self {
        Self {
            entries,
            fallback: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            entries: FALLBACK_RESOLUTIONS.to_vec(),
            fallback: true,
        }
    }

    pub fn entries(&self) -> &[Resolution] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn contains(&self, resolution: Resolution) -> bool {
        self.entries.contains(&resolution)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.fallback = false;
    }

    /// Pick the capture resolution for a requested output size
    pub fn negotiate(&self, requested: Resolution) -> Option<(Resolution, FitMode)> {
        negotiate(requested, &self.entries)
    }
}

/// Choose a capture resolution for `requested` out of `catalog`
///
/// An exact match wins. Otherwise the smallest-area entry containing the request
/// is cropped; failing that the largest-area entry is padded. Ties keep the entry
/// seen first. Returns `None` only for an empty catalog.
pub fn negotiate(requested: Resolution, catalog: &[Resolution]) -> Option<(Resolution, FitMode)> {
    if catalog.contains(&requested) {
        return Some((requested, FitMode::Crop));
    }

    let mut smallest_containing: Option<Resolution> = None;
    for &res in catalog.iter().filter(|r| r.contains(requested)) {
        match smallest_containing {
            Some(best) if best.area() <= res.area() => {}
            _ => smallest_containing = Some(res),
        }
    }
    if let Some(res) = smallest_containing {
        return Some((res, FitMode::Crop));
    }

    let mut largest: Option<Resolution> = None;
    for &res in catalog {
        match largest {
            Some(best) if best.area() >= res.area() => {}
            _ => largest = Some(res),
        }
    }
    largest.map(|res| (res, FitMode::Pad))
}
