//! High-level image operations.
//!
//! [`normalize`] combines the pure calculations with backend execution:
//!
//! 1. decode the source bytes
//! 2. compute the target geometry and resample if it differs
//! 3. sample the rendered raster for transparency and pick the output format
//! 4. encode, then step the lossy quality down until the byte cap is met or
//!    the quality floor is reached
//!
//! Only decoding can fail for well-formed input. Missing the byte cap is
//! reported through [`Note::ByteCapNotMet`] and `within_byte_cap`, never as
//! an error.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{TargetGeometry, calculate_target_geometry, quality_schedule};
use super::media::MediaType;
use super::params::{EncodeParams, NormalizeOptions, OutputFormat, Quality, ResampleParams};
use super::result::{DataPayload, Note, NormalizedImage};
use super::rust_backend::RustBackend;
use super::transparency::has_transparency;
use image::DynamicImage;
use tracing::{debug, warn};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Everything decided before the first encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizePlan {
    pub original: Dimensions,
    pub target: TargetGeometry,
    pub transparent: bool,
    pub format: OutputFormat,
    pub transparency_note: Note,
}

impl NormalizePlan {
    pub fn resizes(&self) -> bool {
        (self.target.width, self.target.height) != (self.original.width, self.original.height)
    }
}

/// Pick the output format and the note explaining why.
///
/// Only upgrades to PNG when preservation is enabled, the declared type can
/// carry alpha, and transparency was actually found.
pub fn choose_format(
    declared: &MediaType,
    transparent: bool,
    preserve_transparent_format: bool,
) -> (OutputFormat, Note) {
    let supports = declared.supports_transparency();
    match (transparent, supports, preserve_transparent_format) {
        (true, true, true) => (OutputFormat::Png, Note::TransparencyPreserved),
        (true, _, _) => (OutputFormat::Jpeg, Note::TransparencyFlattened),
        (false, true, _) => (OutputFormat::Jpeg, Note::NoTransparencyFound),
        (false, false, _) => (OutputFormat::Jpeg, Note::OpaqueSourceFormat),
    }
}

/// Decode, resample and inspect; returns the plan and the rendered raster.
fn prepare(
    backend: &impl ImageBackend,
    source: &[u8],
    declared: &MediaType,
    options: &NormalizeOptions,
) -> Result<(NormalizePlan, DynamicImage)> {
    let raster = backend.decode(source, Some(declared))?;
    let original = Dimensions::of(&raster);
    let target = calculate_target_geometry(
        (original.width, original.height),
        options.max_long_side,
        options.target_min_short_side,
    );
    debug!(
        original_width = original.width,
        original_height = original.height,
        target_width = target.width,
        target_height = target.height,
        "computed target geometry"
    );

    let rendered = if (target.width, target.height) != (original.width, original.height) {
        backend.resample(
            &raster,
            &ResampleParams {
                width: target.width,
                height: target.height,
            },
        )?
    } else {
        raster
    };

    let transparent = has_transparency(&rendered);
    let (format, transparency_note) =
        choose_format(declared, transparent, options.preserve_transparent_format);
    debug!(%declared, transparent, format = format.label(), "chose output format");

    Ok((
        NormalizePlan {
            original,
            target,
            transparent,
            format,
            transparency_note,
        },
        rendered,
    ))
}

/// Work out what [`normalize`] would do without encoding anything.
pub fn plan_normalization(
    backend: &impl ImageBackend,
    source: &[u8],
    declared: &MediaType,
    options: &NormalizeOptions,
) -> Result<NormalizePlan> {
    prepare(backend, source, declared, options).map(|(plan, _)| plan)
}

/// Normalize an image for upload to a vision model.
///
/// Fails only with [`BackendError::Decode`] when `source` is not a decodable
/// raster (or with an encode error from a misbehaving backend).
pub fn normalize(
    backend: &impl ImageBackend,
    source: &[u8],
    declared: &MediaType,
    options: &NormalizeOptions,
) -> Result<NormalizedImage> {
    let (plan, rendered) = prepare(backend, source, declared, options)?;
    let format = plan.format;

    let initial = options.initial_quality();
    let floor = options.min_quality();
    let mut quality = initial;
    let mut bytes = backend.encode(&rendered, &EncodeParams { format, quality })?;
    debug!(quality = %quality, size = bytes.len(), "initial encode");

    let mut was_compressed = false;
    if format.is_lossy() {
        let schedule = quality_schedule(
            initial.value(),
            floor.value(),
            options.quality_step_percent(),
        );
        for next in schedule {
            if bytes.len() <= options.max_bytes {
                break;
            }
            quality = Quality::new(next);
            bytes = backend.encode(&rendered, &EncodeParams { format, quality })?;
            was_compressed = true;
            debug!(quality = %quality, size = bytes.len(), "compression pass");
        }
    }

    let within_byte_cap = bytes.len() <= options.max_bytes;
    let was_resized = plan.resizes();

    let mut notes = Vec::with_capacity(4);
    notes.push(if was_resized {
        Note::Resized {
            from: (plan.original.width, plan.original.height),
            to: (plan.target.width, plan.target.height),
        }
    } else {
        Note::NotResized {
            dims: (plan.original.width, plan.original.height),
        }
    });
    notes.push(plan.transparency_note.clone());
    notes.push(match (format.is_lossy(), was_compressed) {
        (false, _) => Note::Lossless,
        (true, true) => Note::Compressed {
            from: initial,
            to: quality,
        },
        (true, false) => Note::EncodedAt { quality },
    });
    notes.push(if within_byte_cap {
        Note::ByteCapMet {
            size: bytes.len(),
            cap: options.max_bytes,
        }
    } else {
        warn!(
            size = bytes.len(),
            cap = options.max_bytes,
            "byte cap not met after compression"
        );
        Note::ByteCapNotMet {
            size: bytes.len(),
            cap: options.max_bytes,
            floor: format.is_lossy().then_some(quality),
        }
    });

    Ok(NormalizedImage {
        media_type: format.mime(),
        width: plan.target.width,
        height: plan.target.height,
        original_width: plan.original.width,
        original_height: plan.original.height,
        original_bytes: source.len(),
        final_bytes: bytes.len(),
        quality: format.is_lossy().then_some(quality),
        was_resized,
        was_compressed,
        within_byte_cap,
        notes,
        payload: DataPayload { format, bytes },
    })
}

/// [`normalize`] with the production backend and a declared type string.
///
/// ```no_run
/// # use vision_prep::imaging::{NormalizeOptions, normalize_bytes};
/// let bytes = std::fs::read("photo.png").unwrap();
/// let result = normalize_bytes(&bytes, "image/png", &NormalizeOptions::default()).unwrap();
/// println!("{} → {}x{}", result.media_type, result.width, result.height);
/// ```
pub fn normalize_bytes(
    source: &[u8],
    declared_media_type: &str,
    options: &NormalizeOptions,
) -> Result<NormalizedImage> {
    normalize(
        &RustBackend::new(),
        source,
        &MediaType::parse(declared_media_type),
        options,
    )
}
