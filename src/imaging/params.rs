//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! [`operations`](super::operations) (which decides the geometry, format and
//! quality) and the [`backend`](super::backend) (which does the pixel work),
//! so a mock backend can stand in for the real one in tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality as a percentage (1–100). Clamped on construction.
//! - [`OutputFormat`]: The two output encodings: lossy JPEG or lossless PNG.
//! - [`ResampleParams`]: Target dimensions for a resample.
//! - [`EncodeParams`]: Output format plus quality for one encode pass.
//! - [`NormalizeOptions`]: The seven caller-tunable bounds of the normalizer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding, in whole percent (1-100).
///
/// Fractions such as `0.92` are converted with [`Quality::from_fraction`],
/// which rounds to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn from_fraction(fraction: f32) -> Self {
        Self::new((fraction * 100.0).round().max(0.0) as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn as_fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_fraction())
    }
}

/// Output encoding chosen by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy, no alpha. The default.
    Jpeg,
    /// Lossless, keeps alpha. Only chosen when transparency must be preserved.
    Png,
}

impl OutputFormat {
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg)
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
        }
    }
}

/// Parameters for drawing a raster at new dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleParams {
    pub width: u32,
    pub height: u32,
}

/// Parameters for a single encode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: OutputFormat,
    /// Ignored for lossless formats.
    pub quality: Quality,
}

/// Default cap on the encoded size: 4 MiB.
pub const DEFAULT_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Tunable bounds for [`normalize`](super::operations::normalize).
///
/// Every field is independently overridable:
///
/// ```
/// # use vision_prep::imaging::NormalizeOptions;
/// let options = NormalizeOptions {
///     max_long_side: 1568,
///     ..NormalizeOptions::default()
/// };
/// assert_eq!(options.target_min_short_side, 768);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeOptions {
    /// Hard cap on the longer edge, in pixels.
    pub max_long_side: u32,
    /// Floor the shorter edge is raised toward after a downscale, in pixels.
    pub target_min_short_side: u32,
    /// Soft cap on the encoded size, in bytes.
    pub max_bytes: usize,
    /// First lossy encode quality, as a fraction (0.0–1.0].
    pub initial_quality: f32,
    /// Lowest quality the compression loop may reach.
    pub min_quality: f32,
    /// Quality decrement per compression pass.
    pub quality_step: f32,
    /// Keep PNG output when the source has real transparency.
    pub preserve_transparent_format: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_long_side: 2048,
            target_min_short_side: 768,
            max_bytes: DEFAULT_MAX_BYTES,
            initial_quality: 0.92,
            min_quality: 0.60,
            quality_step: 0.05,
            preserve_transparent_format: true,
        }
    }
}

impl NormalizeOptions {
    pub fn initial_quality(&self) -> Quality {
        Quality::from_fraction(self.initial_quality)
    }

    pub fn min_quality(&self) -> Quality {
        Quality::from_fraction(self.min_quality)
    }

    /// Quality step in whole percent. Never zero, so the compression loop
    /// always makes progress.
    pub fn quality_step_percent(&self) -> u32 {
        ((self.quality_step * 100.0).round().max(0.0) as u32).max(1)
    }
}
