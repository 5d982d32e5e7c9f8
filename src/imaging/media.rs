//! Declared media types.
//!
//! The caller's declared type (from a file picker, an upload header, or a
//! file extension) is trusted for branching only. Decoding still sniffs the
//! magic bytes, so a mislabelled file decodes fine but may be treated as
//! unable to carry transparency.

use image::ImageFormat;
use std::fmt;
use std::path::Path;

/// Media type of a source image as declared by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
    WebP,
    Gif,
    /// Anything else, kept verbatim (lowercased, parameters stripped).
    Other(String),
}

/// Extensions we accept as input, paired with their media type.
const EXTENSIONS: &[(&str, MediaType)] = &[
    ("jpg", MediaType::Jpeg),
    ("jpeg", MediaType::Jpeg),
    ("png", MediaType::Png),
    ("webp", MediaType::WebP),
    ("gif", MediaType::Gif),
];

impl MediaType {
    /// Parse a declared media type string such as `"image/png"`.
    ///
    /// Case-insensitive; parameters after `;` are ignored and the common
    /// `image/jpg` misspelling is accepted.
    pub fn parse(declared: &str) -> Self {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => MediaType::Jpeg,
            "image/png" | "image/apng" => MediaType::Png,
            "image/webp" => MediaType::WebP,
            "image/gif" => MediaType::Gif,
            _ => MediaType::Other(essence),
        }
    }

    /// Media type implied by a path's extension, if it is one we accept.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        EXTENSIONS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
            .map(|(_, media_type)| media_type.clone())
    }

    pub fn mime(&self) -> &str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::WebP => "image/webp",
            MediaType::Gif => "image/gif",
            MediaType::Other(s) => s,
        }
    }

    /// Whether files of this type can plausibly carry an alpha channel.
    pub fn supports_transparency(&self) -> bool {
        matches!(self, MediaType::Png | MediaType::WebP | MediaType::Gif)
    }

    /// Decoder format hint for the `image` crate.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            MediaType::Jpeg => Some(ImageFormat::Jpeg),
            MediaType::Png => Some(ImageFormat::Png),
            MediaType::WebP => Some(ImageFormat::WebP),
            MediaType::Gif => Some(ImageFormat::Gif),
            MediaType::Other(_) => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Returns the input file extensions the batch layer picks up.
pub fn supported_input_extensions() -> Vec<&'static str> {
    EXTENSIONS.iter().map(|(ext, _)| *ext).collect()
}
