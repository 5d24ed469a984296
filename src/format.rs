//! Format tokens: alias normalization, the allow-list and MIME mapping.
//!
//! The stored format of a file is only ever normalized. A format requested by
//! a caller is normalized and then checked with [`is_allowed`].

use std::fmt;
use std::str::FromStr;

use image::ImageFormat;

/// Canonical tokens accepted as conversion targets.
pub const ALLOWED_FORMATS: [&str; 5] = ["jpeg", "png", "webp", "tiff", "gif"];

/// Canonicalizes a format token.
///
/// Trims, lower-cases and drops leading dots so that file extensions can be
/// passed straight in, then resolves aliases. Unknown tokens come back
/// lower-cased and otherwise unchanged.
pub fn normalize(token: &str) -> String {
    let trimmed = token
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end();
    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "jpg" | "jpe" => "jpeg".to_string(),
        "tif" => "tiff".to_string(),
        _ => lowered,
    }
}

/// Whether a canonical token is in the allow-list. Expects output of [`normalize`].
pub fn is_allowed(canonical: &str) -> bool {
    ALLOWED_FORMATS.contains(&canonical)
}

/// Content type for a canonical token; unknown formats are served as raw bytes.
pub fn mime_type_for(canonical: &str) -> &'static str {
    match canonical.parse::<CanonicalFormat>() {
        Ok(format) => format.mime_type(),
        Err(_) => "application/octet-stream",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanonicalFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
    Gif,
}

impl CanonicalFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Gif => "image/gif",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Tiff => ImageFormat::Tiff,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

impl fmt::Display for CanonicalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token that normalizes to something outside the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedFormat(pub String);

impl fmt::Display for UnsupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported image format: {}", self.0)
    }
}

impl std::error::Error for UnsupportedFormat {}

impl FromStr for CanonicalFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "tiff" => Ok(Self::Tiff),
            "gif" => Ok(Self::Gif),
            other => Err(UnsupportedFormat(other.to_string())),
        }
    }
}
