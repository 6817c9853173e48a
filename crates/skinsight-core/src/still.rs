//! Still normalization
//!
//! Turns a raw camera frame or decoded upload into the fixed still the
//! analysis endpoint expects: a centered square crop, resampled to the
//! configured side length and encoded as JPEG.

use crate::error::SessionError;
use crate::types::CaptureConfig;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use std::fmt;
use std::sync::Arc;

/// Normalized square JPEG still
///
/// Cloning shares the encoded bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Still {
    jpeg: Arc<[u8]>,
    size: u32,
}

impl Still {
    /// Encoded JPEG bytes
    #[inline]
    #[must_use]
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Side length in pixels
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Encoded size in bytes
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.jpeg.len()
    }
}

impl fmt::Debug for Still {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Still")
            .field("size", &self.size)
            .field("bytes", &self.jpeg.len())
            .finish()
    }
}

/// Centered square crop covering `ratio` of the shorter dimension.
///
/// Returns `(x, y, side)`; the side is never zero for a non-empty frame.
#[must_use]
pub fn center_square(width: u32, height: u32, ratio: f32) -> (u32, u32, u32) {
    let shorter = width.min(height);
    let ratio = ratio.clamp(0.0, 1.0);
    let side = ((shorter as f32) * ratio).floor() as u32;
    let side = side.clamp(1.min(shorter), shorter);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Crop, resample and encode a frame into a [`Still`].
pub fn normalize(frame: &DynamicImage, config: &CaptureConfig) -> Result<Still, SessionError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(SessionError::DecodeError("empty frame".to_string()));
    }

    let (x, y, side) = center_square(width, height, config.crop_ratio);
    let out = config.output_size.max(1);
    let square = frame
        .crop_imm(x, y, side, side)
        .resize_exact(out, out, FilterType::CatmullRom)
        .to_rgb8();

    let mut jpeg = Vec::new();
    let quality = config.jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(square.as_raw(), out, out, ColorType::Rgb8)
        .map_err(|e| SessionError::DecodeError(format!("jpeg encoding failed: {e}")))?;

    tracing::debug!(
        src_width = width,
        src_height = height,
        crop = side,
        size = out,
        bytes = jpeg.len(),
        "normalized still"
    );

    Ok(Still {
        jpeg: jpeg.into(),
        size: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([180, 120, 90])))
    }

    #[test]
    fn crop_is_centered_on_landscape_frames() {
        // 80% of 720 = 576
        assert_eq!(center_square(1280, 720, 0.8), (352, 72, 576));
    }

    #[test]
    fn crop_is_centered_on_portrait_frames() {
        assert_eq!(center_square(600, 1000, 0.5), (150, 350, 300));
    }

    #[test]
    fn crop_never_collapses() {
        assert_eq!(center_square(3, 3, 0.1), (1, 1, 1));
        assert_eq!(center_square(10, 10, 2.0), (0, 0, 10));
    }

    #[test]
    fn normalize_produces_square_jpeg() {
        let config = CaptureConfig {
            output_size: 64,
            ..CaptureConfig::default()
        };
        let still = normalize(&frame(160, 90), &config).unwrap();

        assert_eq!(still.size(), 64);
        let decoded = image::load_from_memory(still.jpeg()).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
        // JPEG SOI marker
        assert_eq!(&still.jpeg()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn default_config_normalizes_to_1024() {
        let still = normalize(&frame(1280, 720), &CaptureConfig::default()).unwrap();
        let decoded = image::load_from_memory(still.jpeg()).unwrap();
        assert_eq!(decoded.dimensions(), (1024, 1024));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            normalize(&empty, &CaptureConfig::default()),
            Err(SessionError::DecodeError(_))
        ));
    }
}
