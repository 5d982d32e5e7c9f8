//! The normalizer's output record.
//!
//! [`NormalizedImage`] owns the encoded bytes (wrapped in a [`DataPayload`]
//! that renders as a `data:` URL), the before/after geometry and sizes, two
//! summary flags, and an ordered list of [`Note`]s explaining what happened.
//! It serializes with camelCase keys so it can be handed straight to a
//! browser preview or an upload request.

use super::params::{OutputFormat, Quality};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Serialize, Serializer};
use std::fmt;

/// Encoded bytes plus their media type.
///
/// Serializes as a `data:<mime>;base64,<payload>` string, directly usable as
/// an image source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl DataPayload {
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

impl Serialize for DataPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

/// One human-readable diagnostic about a normalization.
///
/// Notes are produced in a fixed order: resize, transparency, compression,
/// byte cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Resized {
        from: (u32, u32),
        to: (u32, u32),
    },
    NotResized {
        dims: (u32, u32),
    },
    /// Transparency found and kept as PNG.
    TransparencyPreserved,
    /// Transparency found but not kept: preservation disabled, or the
    /// declared type cannot carry alpha.
    TransparencyFlattened,
    /// Declared type could carry alpha but the samples were opaque.
    NoTransparencyFound,
    /// Declared type cannot carry alpha.
    OpaqueSourceFormat,
    Compressed {
        from: Quality,
        to: Quality,
    },
    EncodedAt {
        quality: Quality,
    },
    Lossless,
    ByteCapMet {
        size: usize,
        cap: usize,
    },
    ByteCapNotMet {
        size: usize,
        cap: usize,
        /// `None` for lossless output, which is never recompressed.
        floor: Option<Quality>,
    },
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::Resized { from, to } => write!(
                f,
                "resized from {}x{} to {}x{}",
                from.0, from.1, to.0, to.1
            ),
            Note::NotResized { dims } => {
                write!(f, "no resize needed ({}x{})", dims.0, dims.1)
            }
            Note::TransparencyPreserved => {
                f.write_str("transparency detected; kept lossless PNG")
            }
            Note::TransparencyFlattened => f.write_str(
                "transparency detected but not preserved; flattened to JPEG",
            ),
            Note::NoTransparencyFound => {
                f.write_str("no transparency detected; encoded as JPEG")
            }
            Note::OpaqueSourceFormat => {
                f.write_str("source format has no transparency; encoded as JPEG")
            }
            Note::Compressed { from, to } => {
                write!(f, "compressed: quality reduced from {from} to {to}")
            }
            Note::EncodedAt { quality } => write!(f, "encoded at quality {quality}"),
            Note::Lossless => f.write_str("lossless encoding; quality not applied"),
            Note::ByteCapMet { size, cap } => write!(
                f,
                "size {} within {} cap",
                format_bytes(*size),
                format_bytes(*cap)
            ),
            Note::ByteCapNotMet {
                size,
                cap,
                floor: Some(floor),
            } => write!(
                f,
                "cap not met: {} exceeds {} at minimum quality {floor}",
                format_bytes(*size),
                format_bytes(*cap)
            ),
            Note::ByteCapNotMet {
                size,
                cap,
                floor: None,
            } => write!(
                f,
                "cap not met: {} exceeds {}; lossless output is not recompressed",
                format_bytes(*size),
                format_bytes(*cap)
            ),
        }
    }
}

impl Serialize for Note {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Format a byte count with binary units (`512 B`, `1.5 KiB`, `4.0 MiB`).
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn serialize_quality<S: Serializer>(
    quality: &Option<Quality>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match quality {
        Some(q) => serializer.serialize_some(&q.as_fraction()),
        None => serializer.serialize_none(),
    }
}

/// Result of [`normalize`](super::operations::normalize).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedImage {
    #[serde(rename = "dataUrl")]
    pub payload: DataPayload,
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub original_bytes: usize,
    pub final_bytes: usize,
    /// Final lossy quality; absent for lossless output.
    #[serde(serialize_with = "serialize_quality")]
    pub quality: Option<Quality>,
    pub was_resized: bool,
    pub was_compressed: bool,
    pub within_byte_cap: bool,
    pub notes: Vec<Note>,
}

impl NormalizedImage {
    pub fn format(&self) -> OutputFormat {
        self.payload.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.payload.bytes
    }

    pub fn data_url(&self) -> String {
        self.payload.to_data_url()
    }

    /// Notes rendered as strings, in order.
    pub fn note_strings(&self) -> Vec<String> {
        self.notes.iter().map(ToString::to_string).collect()
    }
}
