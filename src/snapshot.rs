use crate::convert::OutputFormat;
use crate::session::Frame;
use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use std::path::Path;

/// Expand a little-endian RGB565 pixel to 8 bits per channel
pub fn rgb565_to_rgb(bytes: [u8; 2]) -> Rgb<u8> {
    let value = u16::from_le_bytes(bytes);
    let r = ((value >> 11) & 0x1F) as u8;
    let g = ((value >> 5) & 0x3F) as u8;
    let b = (value & 0x1F) as u8;

    Rgb([(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)])
}

/// Wrap a captured frame in an image buffer
pub fn to_image(frame: &Frame<'_>) -> Result<DynamicImage> {
    let (width, height) = (frame.size.width, frame.size.height);

    match frame.format {
        OutputFormat::Grayscale => {
            let gray = GrayImage::from_raw(width, height, frame.data.to_vec())
                .context("Grayscale frame does not match its dimensions")?;
            Ok(DynamicImage::ImageLuma8(gray))
        }
        OutputFormat::Rgb565 => {
            anyhow::ensure!(
                frame.data.len() == frame.size.pixels() * 2,
                "RGB565 frame does not match its dimensions"
            );
            let rgb = RgbImage::from_fn(width, height, |x, y| {
                let i = (y as usize * width as usize + x as usize) * 2;
                rgb565_to_rgb([frame.data[i], frame.data[i + 1]])
            });
            Ok(DynamicImage::ImageRgb8(rgb))
        }
    }
}

/// Write a frame to disk
///
/// `.raw` and `.rgb565` paths get the bytes exactly as captured; any other
/// extension is encoded by `image`.
pub fn save<P: AsRef<Path>>(frame: &Frame<'_>, path: P) -> Result<()> {
    let path = path.as_ref();
    let raw = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("raw") | Some("rgb565")
    );

    if raw {
        std::fs::write(path, frame.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        to_image(frame)?
            .save(path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    tracing::info!("Saved {} frame {} to {}", frame.format, frame.sequence, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::Resolution;

    #[test]
    fn test_rgb565_expansion() {
        assert_eq!(rgb565_to_rgb(0xFFFFu16.to_le_bytes()), Rgb([255, 255, 255]));
        assert_eq!(rgb565_to_rgb(0x0000u16.to_le_bytes()), Rgb([0, 0, 0]));
        assert_eq!(rgb565_to_rgb(0xF800u16.to_le_bytes()), Rgb([255, 0, 0]));
        assert_eq!(rgb565_to_rgb(0x07E0u16.to_le_bytes()), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_grayscale_frame_to_image() {
        let data = [0u8, 64, 128, 255, 1, 2];
        let frame = Frame {
            data: &data,
            format: OutputFormat::Grayscale,
            size: Resolution::new(3, 2),
            sequence: 1,
        };

        let image = to_image(&frame).unwrap().into_luma8();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 0)[0], 64);
        assert_eq!(image.get_pixel(2, 1)[0], 2);
    }

    #[test]
    fn test_mismatched_frame_is_rejected() {
        let data = [0u8; 5];
        let frame = Frame {
            data: &data,
            format: OutputFormat::Rgb565,
            size: Resolution::new(2, 2),
            sequence: 1,
        };
        assert!(to_image(&frame).is_err());
    }

    #[test]
    fn test_save_raw_and_png() {
        let dir = tempfile::tempdir().unwrap();
        let data = [0x00u8, 0xF8, 0xE0, 0x07];
        let frame = Frame {
            data: &data,
            format: OutputFormat::Rgb565,
            size: Resolution::new(2, 1),
            sequence: 7,
        };

        let raw = dir.path().join("frame.rgb565");
        save(&frame, &raw).unwrap();
        assert_eq!(std::fs::read(&raw).unwrap(), data);

        let png = dir.path().join("frame.png");
        save(&frame, &png).unwrap();
        let decoded = image::open(&png).unwrap().into_rgb8();
        assert_eq!(*decoded.get_pixel(0, 0), Rgb([255, 0, 0]));
        assert_eq!(*decoded.get_pixel(1, 0), Rgb([0, 255, 0]));
    }
}
