use std::io::Cursor;
use std::path::Path;

use image::{GrayImage, ImageReader};

use crate::error::{EngineError, Result};

/// Decoded single-channel image, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pixels: GrayImage,
}

impl RawImage {
    /// Wrap an already-decoded grayscale buffer
    pub fn from_gray(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    /// Build from row-major samples; `None` if the length does not match
    pub fn from_raw(width: u32, height: u32, samples: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, samples).map(Self::from_gray)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.as_raw().len()
    }

    pub fn samples(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }
}

/// Load an image file and convert it to grayscale.
///
/// The format is sniffed from the content, so a mislabelled extension
/// still decodes.
pub fn load_path(path: impl AsRef<Path>) -> Result<RawImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EngineError::ImageNotFound {
            path: path.to_path_buf(),
        });
    }

    let source_name = path.display().to_string();
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| io_error(path, &source_name, e))?;

    let decoded = reader.decode().map_err(|source| EngineError::ImageDecode {
        source_name: source_name.clone(),
        source,
    })?;

    tracing::debug!(
        path = %source_name,
        width = decoded.width(),
        height = decoded.height(),
        "image loaded"
    );
    Ok(RawImage::from_gray(decoded.to_luma8()))
}

/// Decode an in-memory encoded image (PNG, JPEG, ...) to grayscale
pub fn load_bytes(bytes: &[u8]) -> Result<RawImage> {
    let source_name = format!("{}-byte buffer", bytes.len());
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EngineError::ImageDecode {
            source_name: source_name.clone(),
            source: image::ImageError::IoError(e),
        })?;

    let decoded = reader
        .decode()
        .map_err(|source| EngineError::ImageDecode { source_name, source })?;

    Ok(RawImage::from_gray(decoded.to_luma8()))
}

fn io_error(path: &Path, source_name: &str, err: std::io::Error) -> EngineError {
    if err.kind() == std::io::ErrorKind::NotFound {
        EngineError::ImageNotFound {
            path: path.to_path_buf(),
        }
    } else {
        EngineError::ImageDecode {
            source_name: source_name.to_string(),
            source: image::ImageError::IoError(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_a_decode_error() {
        let err = load_bytes(&[]).unwrap_err();
        assert!(matches!(err, EngineError::ImageDecode { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = load_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EngineError::ImageDecode { .. }));
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = load_path("/nonexistent/radiodx/scan.png").unwrap_err();
        assert!(matches!(err, EngineError::ImageNotFound { .. }));
    }

    #[test]
    fn png_bytes_round_into_gray() {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let raw = load_bytes(&buf).unwrap();
        assert_eq!((raw.width(), raw.height()), (4, 3));
        assert_eq!(raw.pixel_count(), 12);
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(RawImage::from_raw(2, 2, vec![0; 3]).is_none());
        assert!(RawImage::from_raw(2, 2, vec![0; 4]).is_some());
    }
}
