//! Image decoding backed by the `image` crate.

use std::io::Cursor;

use image::error::{ImageError, LimitErrorKind};
use image::{ImageReader, Limits};
use tracing::trace;

use crate::domain::entities::DecodedImage;
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::DecoderPort;

/// Default ceiling for memory a single decode may allocate.
pub const DEFAULT_MAX_DECODE_BYTES: u64 = 64 * 1024 * 1024;

/// Decodes PNG, JPEG, WebP, GIF (first frame) and BMP into RGBA8.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    max_alloc: u64,
}

impl ImageCodec {
    /// Creates a codec refusing to allocate more than `max_alloc` bytes.
    #[must_use]
    pub const fn new(max_alloc: u64) -> Self {
        Self { max_alloc }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc);
        limits
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECODE_BYTES)
    }
}

impl DecoderPort for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> LoadResult<DecodedImage> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| LoadError::decode(format!("Failed to sniff format: {e}")))?;

        if reader.format().is_none() {
            return Err(LoadError::decode("Unsupported image format"));
        }
        reader.limits(self.limits());

        let image = reader.decode().map_err(map_image_error)?;
        trace!(
            width = image.width(),
            height = image.height(),
            "Decoded image"
        );
        Ok(DecodedImage::new(image.into_rgba8()))
    }
}

fn map_image_error(error: ImageError) -> LoadError {
    match error {
        ImageError::Limits(limit) => match limit.kind() {
            LimitErrorKind::InsufficientMemory | LimitErrorKind::DimensionError => {
                LoadError::memory(format!("Decode exceeds memory limit: {limit}"))
            }
            _ => LoadError::decode(format!("Failed to decode image: {limit}")),
        },
        other => LoadError::decode(format!("Failed to decode image: {other}")),
    }
}
