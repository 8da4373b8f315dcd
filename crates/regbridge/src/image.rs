//! Image references and the raster codec used for in-memory pixel data.
//!
//! In-memory images are written to disk as 8-bit PNG, which is lossless for
//! every [`PixelLayout`]. Result images are decoded with the `image` crate so
//! whichever raster format the registration tool chose can be read back.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ::image::DynamicImage;
use png::{BitDepth, ColorType, Compression, Encoder, FilterType};

use crate::error::{RegistrationError, RegistrationResult};

/// File suffix used when materializing pixel data.
pub const PIXEL_FILE_SUFFIX: &str = ".png";

/// Channel layout of an 8-bit pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    Gray8,
    GrayAlpha8,
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    /// Number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::GrayAlpha8 => 2,
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }

    fn color_type(&self) -> ColorType {
        match self {
            PixelLayout::Gray8 => ColorType::Grayscale,
            PixelLayout::GrayAlpha8 => ColorType::GrayscaleAlpha,
            PixelLayout::Rgb8 => ColorType::Rgb,
            PixelLayout::Rgba8 => ColorType::Rgba,
        }
    }
}

/// Row-major interleaved 8-bit pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a buffer without checking the data length.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Creates a single-channel buffer.
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(width, height, PixelLayout::Gray8, data)
    }

    /// Number of bytes `data` must hold for the declared shape, or `None` if
    /// that does not fit in `usize`.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.layout.channels())
    }

    fn validate(&self) -> RegistrationResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RegistrationError::encode(format!(
                "invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.expected_len().ok_or_else(|| {
            RegistrationError::encode(format!(
                "{}x{} {:?} is too large to address",
                self.width, self.height, self.layout
            ))
        })?;
        if self.data.len() != expected {
            return Err(RegistrationError::encode(format!(
                "expected {} bytes for {}x{} {:?}, got {}",
                expected,
                self.width,
                self.height,
                self.layout,
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// An image argument: either a file on disk or pixels held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Path(PathBuf),
    Pixels(PixelBuffer),
}

impl ImageRef {
    /// Creates a path reference.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageRef::Path(path.into())
    }

    /// Returns true if this refers to a file on disk.
    pub fn is_path(&self) -> bool {
        matches!(self, ImageRef::Path(_))
    }

    /// Returns the path, if this is a path reference.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ImageRef::Path(p) => Some(p),
            ImageRef::Pixels(_) => None,
        }
    }

    /// Returns the pixels, if this is an in-memory image.
    pub fn as_pixels(&self) -> Option<&PixelBuffer> {
        match self {
            ImageRef::Path(_) => None,
            ImageRef::Pixels(b) => Some(b),
        }
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        ImageRef::Path(path)
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        ImageRef::Path(path.to_path_buf())
    }
}

impl From<PixelBuffer> for ImageRef {
    fn from(buffer: PixelBuffer) -> Self {
        ImageRef::Pixels(buffer)
    }
}

/// Writes a pixel buffer to `path` as PNG.
pub fn write_png(buffer: &PixelBuffer, path: &Path) -> RegistrationResult<()> {
    buffer.validate()?;

    let file = File::create(path).map_err(RegistrationError::encode)?;
    let mut writer = BufWriter::new(file);
    write_png_to_writer(buffer, &mut writer)?;
    writer.flush().map_err(RegistrationError::encode)?;
    Ok(())
}

/// Writes a pixel buffer as PNG to any writer.
pub fn write_png_to_writer<W: Write>(buffer: &PixelBuffer, writer: W) -> RegistrationResult<()> {
    buffer.validate()?;

    let mut encoder = Encoder::new(writer, buffer.width, buffer.height);
    encoder.set_color(buffer.layout.color_type());
    encoder.set_depth(BitDepth::Eight);
    encoder.set_compression(Compression::Default);
    encoder.set_filter(FilterType::NoFilter);

    let mut png_writer = encoder.write_header().map_err(RegistrationError::encode)?;
    png_writer
        .write_image_data(&buffer.data)
        .map_err(RegistrationError::encode)?;
    png_writer.finish().map_err(RegistrationError::encode)?;
    Ok(())
}

/// Decodes an image file into an 8-bit pixel buffer.
///
/// The format is sniffed from the file contents. 8-bit gray, gray+alpha, RGB
/// and RGBA images keep their layout; anything else is converted to RGBA.
pub fn read_image(path: &Path) -> RegistrationResult<PixelBuffer> {
    let decoded = ::image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| RegistrationError::decode(path, e))?
        .decode()
        .map_err(|e| RegistrationError::decode(path, e))?;

    let (width, height) = (decoded.width(), decoded.height());
    let (layout, data) = match decoded {
        DynamicImage::ImageLuma8(b) => (PixelLayout::Gray8, b.into_raw()),
        DynamicImage::ImageLumaA8(b) => (PixelLayout::GrayAlpha8, b.into_raw()),
        DynamicImage::ImageRgb8(b) => (PixelLayout::Rgb8, b.into_raw()),
        DynamicImage::ImageRgba8(b) => (PixelLayout::Rgba8, b.into_raw()),
        other => (PixelLayout::Rgba8, other.to_rgba8().into_raw()),
    };

    Ok(PixelBuffer::new(width, height, layout, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn gradient(layout: PixelLayout) -> PixelBuffer {
        let (w, h) = (7, 5);
        let len = w as usize * h as usize * layout.channels();
        let data = (0..len).map(|i| (i * 37 % 251) as u8).collect();
        PixelBuffer::new(w, h, layout, data)
    }

    #[test]
    fn test_png_is_lossless_for_every_layout() {
        let dir = TempDir::new().unwrap();
        for layout in [
            PixelLayout::Gray8,
            PixelLayout::GrayAlpha8,
            PixelLayout::Rgb8,
            PixelLayout::Rgba8,
        ] {
            let buffer = gradient(layout);
            let path = dir.path().join(format!("{:?}.png", layout));
            write_png(&buffer, &path).unwrap();
            assert_eq!(read_image(&path).unwrap(), buffer);
        }
    }

    #[test]
    fn test_write_rejects_short_data() {
        let dir = TempDir::new().unwrap();
        let buffer = PixelBuffer::gray(4, 4, vec![0; 15]);
        let err = write_png(&buffer, &dir.path().join("short.png")).unwrap_err();
        assert!(matches!(err, RegistrationError::Encode { .. }));
    }

    #[test]
    fn test_write_rejects_empty_dimensions() {
        let buffer = PixelBuffer::gray(0, 4, Vec::new());
        let err = write_png_to_writer(&buffer, Vec::new()).unwrap_err();
        assert!(matches!(err, RegistrationError::Encode { .. }));
    }

    #[test]
    fn test_oversized_dimensions_are_encode_error() {
        let buffer = PixelBuffer::new(u32::MAX, u32::MAX, PixelLayout::Rgba8, Vec::new());
        assert_eq!(buffer.expected_len(), None);

        let err = write_png_to_writer(&buffer, Vec::new()).unwrap_err();
        assert!(matches!(err, RegistrationError::Encode { .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_expected_len() {
        assert_eq!(PixelBuffer::gray(4, 3, Vec::new()).expected_len(), Some(12));
        assert_eq!(gradient(PixelLayout::Rgb8).expected_len(), Some(105));
    }

    #[test]
    fn test_read_garbage_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.0.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let err = read_image(&path).unwrap_err();
        assert!(matches!(err, RegistrationError::Decode { .. }));
    }

    #[test]
    fn test_image_ref_accessors() {
        let by_path = ImageRef::path("fixed.png");
        assert!(by_path.is_path());
        assert_eq!(by_path.as_path(), Some(Path::new("fixed.png")));
        assert!(by_path.as_pixels().is_none());

        let in_memory: ImageRef = PixelBuffer::gray(1, 1, vec![9]).into();
        assert!(!in_memory.is_path());
        assert_eq!(in_memory.as_pixels().map(|b| b.data.clone()), Some(vec![9]));
    }
}
