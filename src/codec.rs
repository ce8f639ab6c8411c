use image::{codecs::jpeg::JpegEncoder, ImageFormat, RgbImage};
use thiserror::Error;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode frame as jpeg: {0}")]
    DecodeFrameFailed(image::ImageError),
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(image::ImageError),
}

/// JPEG decode/encode capability used by the annotator.
pub trait FrameCodec: Send + Sync + 'static {
    fn decode(&self, data: &[u8]) -> Result<RgbImage, CodecError>;
    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, CodecError>;
}

#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCodec for JpegCodec {
    fn decode(&self, data: &[u8]) -> Result<RgbImage, CodecError> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(CodecError::DecodeFrameFailed)?;
        Ok(image.to_rgb8())
    }

    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(image)
            .map_err(CodecError::EncodeFrameFailed)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_encode_produces_jpeg() {
        let image = RgbImage::from_pixel(16, 8, Rgb([10, 200, 30]));
        let jpeg = JpegCodec::default().encode(&image).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_decode_keeps_dimensions() {
        let codec = JpegCodec::new(90);
        let jpeg = codec
            .encode(&RgbImage::from_pixel(33, 17, Rgb([128, 128, 128])))
            .unwrap();

        let decoded = codec.decode(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (33, 17));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = JpegCodec::default().decode(b"definitely not a jpeg");
        assert!(matches!(result, Err(CodecError::DecodeFrameFailed(_))));
    }
}
