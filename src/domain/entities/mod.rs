//! Domain entities.

mod bitmap;
mod display;
mod load_request;

pub use bitmap::{DecodedImage, ImageId, ImageSource, LoadedImage};
pub use display::{CONTENT_SLOT, PLACEHOLDER_SLOT, SlotContent, ViewState};
pub use load_request::{LoadRequest, RequestId, ResourceRef};
