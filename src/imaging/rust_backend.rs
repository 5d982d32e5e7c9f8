//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF first frame) | `image::ImageReader` with format sniffing |
//! | Resample | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |

use super::backend::{BackendError, ImageBackend};
use super::media::MediaType;
use super::params::{EncodeParams, OutputFormat, ResampleParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageReader, RgbImage};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite a raster over white and drop the alpha channel.
///
/// JPEG has no alpha; without this, transparent pixels would keep whatever
/// color they happened to store, which is often black.
fn flatten_onto_white(raster: &DynamicImage) -> RgbImage {
    if !raster.color().has_alpha() {
        return raster.to_rgb8();
    }
    let rgba = raster.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let rgb = flatten_onto_white(raster);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

fn encode_png(raster: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let rgba = raster.to_rgba8();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn decode(
        &self,
        bytes: &[u8],
        hint: Option<&MediaType>,
    ) -> Result<DynamicImage, BackendError> {
        if bytes.is_empty() {
            return Err(BackendError::Decode("empty input".to_string()));
        }

        let mut reader = ImageReader::new(Cursor::new(bytes));
        if let Some(format) = hint.and_then(MediaType::image_format) {
            reader.set_format(format);
        }
        // Sniffing overrides the hint; an unrecognized signature keeps it.
        let reader = reader
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(BackendError::Decode("unrecognized image format".to_string()));
        }

        let raster = reader
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if raster.width() == 0 || raster.height() == 0 {
            return Err(BackendError::Decode("image has no pixels".to_string()));
        }
        Ok(raster)
    }

    fn resample(
        &self,
        raster: &DynamicImage,
        params: &ResampleParams,
    ) -> Result<DynamicImage, BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "cannot resample to {}x{}",
                params.width, params.height
            )));
        }
        Ok(raster.resize_exact(params.width, params.height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        raster: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        match params.format {
            OutputFormat::Jpeg => encode_jpeg(raster, params.quality.value() as u8),
            OutputFormat::Png => encode_png(raster),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{ImageFormat, Rgba, RgbaImage};

    /// Encode a gradient as PNG bytes.
    fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, alpha])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_png() {
        let backend = RustBackend::new();
        let raster = backend
            .decode(&png_bytes(64, 48, 255), Some(&MediaType::Png))
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (64, 48));
    }

    #[test]
    fn decode_sniffs_despite_wrong_hint() {
        let backend = RustBackend::new();
        let raster = backend
            .decode(&png_bytes(10, 10, 255), Some(&MediaType::Jpeg))
            .unwrap();
        assert_eq!(raster.width(), 10);
    }

    #[test]
    fn decode_empty_input_errors() {
        let err = RustBackend::new().decode(&[], None).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn decode_garbage_errors() {
        let garbage: Vec<u8> = (0..512u32).map(|i| (i * 31 % 251) as u8).collect();
        let err = RustBackend::new()
            .decode(&garbage, Some(&MediaType::Png))
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn decode_truncated_png_errors() {
        let mut bytes = png_bytes(32, 32, 255);
        bytes.truncate(40);
        assert!(RustBackend::new().decode(&bytes, None).is_err());
    }

    #[test]
    fn resample_to_exact_dimensions() {
        let backend = RustBackend::new();
        let raster = backend.decode(&png_bytes(400, 300, 255), None).unwrap();
        let resized = backend
            .resample(&raster, &ResampleParams {
                width: 200,
                height: 150,
            })
            .unwrap();
        assert_eq!((resized.width(), resized.height()), (200, 150));
    }

    #[test]
    fn resample_to_zero_errors() {
        let backend = RustBackend::new();
        let raster = backend.decode(&png_bytes(4, 4, 255), None).unwrap();
        assert!(
            backend
                .resample(&raster, &ResampleParams {
                    width: 0,
                    height: 4
                })
                .is_err()
        );
    }

    #[test]
    fn encode_jpeg_produces_jpeg_signature() {
        let backend = RustBackend::new();
        let raster = backend.decode(&png_bytes(32, 32, 128), None).unwrap();
        let bytes = backend
            .encode(&raster, &EncodeParams {
                format: OutputFormat::Jpeg,
                quality: Quality::new(90),
            })
            .unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn lower_jpeg_quality_is_smaller() {
        let backend = RustBackend::new();
        let raster = backend.decode(&png_bytes(256, 256, 255), None).unwrap();
        let encode = |q| {
            backend
                .encode(&raster, &EncodeParams {
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(q),
                })
                .unwrap()
                .len()
        };
        assert!(encode(30) < encode(95));
    }

    #[test]
    fn encode_png_keeps_alpha() {
        let backend = RustBackend::new();
        let raster = backend.decode(&png_bytes(16, 16, 100), None).unwrap();
        let bytes = backend
            .encode(&raster, &EncodeParams {
                format: OutputFormat::Png,
                quality: Quality::default(),
            })
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3).0[3], 100);
    }

    #[test]
    fn flatten_composites_over_white() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let flat = flatten_onto_white(&DynamicImage::ImageRgba8(img));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);

        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let flat = flatten_onto_white(&DynamicImage::ImageRgba8(img));
        assert_eq!(flat.get_pixel(1, 1).0, [0, 0, 0]);
    }
}
