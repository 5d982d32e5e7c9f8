//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three capabilities the normalizer
//! needs: decode bytes into a raster, draw a raster at a new size, and encode
//! a raster at a given quality. Everything else (geometry, transparency
//! sampling, format choice, the compression loop) lives in
//! [`operations`](super::operations) and is backend-agnostic.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Rasters are exchanged as [`image::DynamicImage`].

use super::media::MediaType;
use super::params::{EncodeParams, ResampleParams};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The bytes could not be interpreted as a raster image.
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

impl BackendError {
    pub fn is_decode(&self) -> bool {
        matches!(self, BackendError::Decode(_))
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn of(raster: &DynamicImage) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
        }
    }
}

/// Trait for image processing backends.
///
/// Implementations must be stateless across calls: concurrent normalizations
/// share one backend and nothing else.
pub trait ImageBackend: Sync {
    /// Decode encoded bytes into a raster. The hint is the caller's declared
    /// type and is only a fallback when the bytes cannot be sniffed.
    fn decode(&self, bytes: &[u8], hint: Option<&MediaType>)
    -> Result<DynamicImage, BackendError>;

    /// Draw the raster at new dimensions with a high-quality filter.
    fn resample(
        &self,
        raster: &DynamicImage,
        params: &ResampleParams,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode the raster.
    fn encode(&self, raster: &DynamicImage, params: &EncodeParams)
    -> Result<Vec<u8>, BackendError>;
}
