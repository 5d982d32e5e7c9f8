//! Sampled transparency detection.
//!
//! Inspects at most ~100×100 evenly spaced pixels. Small transparent regions
//! in large images can fall between sample points.

use super::calculations::sample_stride;
use image::{DynamicImage, GenericImageView};

/// Alpha values below this count as "not fully opaque".
pub const OPAQUE_THRESHOLD: u8 = 250;

/// Returns true if any sampled pixel has alpha below [`OPAQUE_THRESHOLD`].
pub fn has_transparency(raster: &DynamicImage) -> bool {
    if !raster.color().has_alpha() {
        return false;
    }

    let (width, height) = raster.dimensions();
    let stride_x = sample_stride(width) as usize;
    let stride_y = sample_stride(height) as usize;

    (0..height).step_by(stride_y).any(|y| {
        (0..width)
            .step_by(stride_x)
            .any(|x| raster.get_pixel(x, y).0[3] < OPAQUE_THRESHOLD)
    })
}
