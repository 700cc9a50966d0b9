//! Display slot content and the per-view load state machine.

use std::sync::Arc;

use super::{DecodedImage, ResourceRef};

/// Slot holding the loaded (or placeholder) image.
pub const CONTENT_SLOT: usize = 0;
/// Slot holding the loading indicator.
pub const PLACEHOLDER_SLOT: usize = 1;

/// What a display slot shows.
#[derive(Debug, Clone, Default)]
pub enum SlotContent {
    /// Nothing.
    #[default]
    Empty,
    /// A local resource, resolved by the target.
    Resource(ResourceRef),
    /// A decoded bitmap.
    Image(Arc<DecodedImage>),
}

impl SlotContent {
    /// Returns true if the slot shows nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the bitmap if the slot holds one.
    #[must_use]
    pub const fn image(&self) -> Option<&Arc<DecodedImage>> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl PartialEq for SlotContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Resource(a), Self::Resource(b)) => a == b,
            (Self::Image(a), Self::Image(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// Load state of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    /// No load has been requested yet.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The latest request succeeded.
    Loaded,
    /// The latest request failed with the given message.
    Failed(String),
}

impl ViewState {
    /// Returns true while a request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns true once the latest request succeeded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Returns true if the latest request failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
