//! Decoded bitmaps and their cache identity.

use std::sync::Arc;

use image::RgbaImage;

/// Bytes per RGBA8 pixel.
const BYTES_PER_PIXEL: u64 = 4;

/// Cache key for a post-processed image.
///
/// Derived from the locator together with the bounding box and corner
/// radius, since the processed artifact is what gets cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(pub String);

impl ImageId {
    /// Creates a new `ImageId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the key of a processed variant of `url`.
    ///
    /// Non-positive box dimensions are normalised to zero so that every
    /// "unconstrained" spelling maps to the same entry.
    #[must_use]
    pub fn for_variant(url: &str, box_width: i32, box_height: i32, corner_radius: u32) -> Self {
        let variant = format!(
            "{url}#{}x{}r{corner_radius}",
            box_width.max(0),
            box_height.max(0)
        );
        Self::hashed(variant.as_bytes())
    }

    fn hashed(input: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(input);
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An in-memory RGBA8 bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    /// Wraps an RGBA buffer.
    #[must_use]
    pub const fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Creates a fully opaque image filled with a single colour.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Memory held by the pixel buffer, used as the cache cost.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height()) * BYTES_PER_PIXEL
    }

    /// Borrows the pixel buffer.
    #[must_use]
    pub const fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Raw RGBA bytes in row-major order.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Consumes the image, returning its pixel buffer.
    #[must_use]
    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Encodes the bitmap as PNG.
    ///
    /// # Errors
    /// Returns error if encoding fails.
    pub fn to_png_bytes(&self) -> image::ImageResult<Vec<u8>> {
        let mut out = Vec::new();
        self.pixels
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)?;
        Ok(out)
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

/// A final image together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Cache key of the processed image.
    pub id: ImageId,
    /// The post-processed bitmap.
    pub image: Arc<DecodedImage>,
    /// Where the bitmap came from.
    pub source: ImageSource,
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from the in-memory cache.
    MemoryCache,
    /// Downloaded and decoded.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::Network => write!(f, "network"),
        }
    }
}
