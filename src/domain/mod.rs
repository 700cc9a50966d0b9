//! Domain layer with core entities, pure services and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Image post-processing.
pub mod services;

pub use entities::{DecodedImage, ImageId, LoadRequest, RequestId, ResourceRef, SlotContent, ViewState};
pub use errors::{LoadError, LoadResult};
pub use ports::{DecoderPort, DisplayTarget, TransportPort};
pub use services::ImagePipeline;
