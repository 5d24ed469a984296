//! Format conversion through the `image` crate.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::ConversionError;
use crate::format::CanonicalFormat;

/// Decodes an image and re-encodes it in another format.
///
/// Implementations are pure and synchronous. Callers on an async runtime
/// should run them on a blocking thread.
pub trait ImageCodec: Send + Sync {
    /// `source_hint` is the normalized stored format, used only when the
    /// encoding cannot be recognized from the bytes themselves.
    fn convert(
        &self,
        bytes: &[u8],
        source_hint: Option<&str>,
        target: CanonicalFormat,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// [`ImageCodec`] backed by the `image` crate's decoders and encoders.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn convert(
        &self,
        bytes: &[u8],
        source_hint: Option<&str>,
        target: CanonicalFormat,
    ) -> Result<Vec<u8>, ConversionError> {
        let image = decode(bytes, source_hint)?;
        encode(image, target)
    }
}

fn hint_to_format(hint: &str) -> Option<ImageFormat> {
    match hint.parse::<CanonicalFormat>() {
        Ok(format) => Some(format.image_format()),
        Err(_) => ImageFormat::from_extension(hint),
    }
}

fn decode(bytes: &[u8], source_hint: Option<&str>) -> Result<DynamicImage, ConversionError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ConversionError::Decode(err.to_string()))?;
    if reader.format().is_none() {
        if let Some(format) = source_hint.and_then(hint_to_format) {
            reader.set_format(format);
        }
    }
    let detected = reader.format();
    reader.decode().map_err(|err| {
        tracing::debug!(?detected, error = %err, "decode image failed");
        ConversionError::Decode(err.to_string())
    })
}

/// Encodes `image` as `target`, first flattening pixel layouts the target
/// encoder cannot take.
fn encode(image: DynamicImage, target: CanonicalFormat) -> Result<Vec<u8>, ConversionError> {
    let image = match target {
        CanonicalFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        CanonicalFormat::WebP | CanonicalFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8()),
        CanonicalFormat::Png | CanonicalFormat::Tiff => match image {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                DynamicImage::ImageRgba16(image.to_rgba16())
            }
            other => other,
        },
    };
    let mut output = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut output), target.image_format())
        .map_err(|err| ConversionError::Encode {
            format: target.to_string(),
            message: err.to_string(),
        })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    fn sample_jpeg() -> Vec<u8> {
        let image = RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 128]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn sample_png_with_alpha() -> Vec<u8> {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8 * 30, y as u8 * 30, 0, 200]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn converts_jpeg_to_every_canonical_format() {
        let jpeg = sample_jpeg();
        for target in [
            CanonicalFormat::Png,
            CanonicalFormat::WebP,
            CanonicalFormat::Tiff,
            CanonicalFormat::Gif,
        ] {
            let out = ImageCrateCodec.convert(&jpeg, Some("jpeg"), target).unwrap();
            assert_eq!(image::guess_format(&out).unwrap(), target.image_format());
            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!(decoded.dimensions(), (32, 24));
        }
    }

    #[test]
    fn alpha_is_dropped_for_jpeg() {
        let png = sample_png_with_alpha();
        let out = ImageCrateCodec
            .convert(&png, Some("png"), CanonicalFormat::Jpeg)
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn content_wins_over_a_wrong_hint() {
        let jpeg = sample_jpeg();
        let out = ImageCrateCodec
            .convert(&jpeg, Some("png"), CanonicalFormat::Png)
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn corrupt_input_is_a_decode_error() {
        let err = ImageCrateCodec
            .convert(b"dummy data", Some("jpeg"), CanonicalFormat::Png)
            .unwrap_err();
        assert!(matches!(err, ConversionError::Decode(_)));

        let err = ImageCrateCodec
            .convert(b"dummy data", None, CanonicalFormat::Png)
            .unwrap_err();
        assert!(matches!(err, ConversionError::Decode(_)));
    }
}
