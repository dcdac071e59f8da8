use crate::core::errors::DecodeError;
use image::DynamicImage;

/// Decode an uploaded byte buffer into a pixel image.
///
/// Purely functional; the caller decides whether to run it on a blocking
/// thread. Decoding is CPU-intensive for large uploads, so the pipeline wraps
/// it in `spawn_blocking`.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    Ok(image::load_from_memory(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_decode_valid_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([200, 30, 30])));
        let mut png_bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&png_bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 32);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_empty_fails() {
        let result = decode_image(&[]);
        assert!(matches!(result, Err(DecodeError::EmptyPayload)));
    }
}
