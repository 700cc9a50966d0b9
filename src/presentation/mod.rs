//! Presentation layer with the image view and its display surfaces.

/// Reusable widgets.
pub mod widgets;

pub use widgets::{MemoryDisplayTarget, ResImageView, ViewOptions};
