//! Port definition for turning raw bytes into a bitmap.

use crate::domain::entities::DecodedImage;
use crate::domain::errors::LoadResult;

/// Port for image codecs.
///
/// Decoding is CPU-bound and runs on a blocking worker, never on the
/// thread that owns the views.
#[cfg_attr(test, mockall::automock)]
pub trait DecoderPort: Send + Sync {
    /// Decodes `bytes` into an RGBA bitmap.
    ///
    /// # Errors
    /// `LoadError::Decode` for malformed or unsupported data,
    /// `LoadError::Memory` when the bitmap cannot be allocated.
    fn decode(&self, bytes: &[u8]) -> LoadResult<DecodedImage>;
}
