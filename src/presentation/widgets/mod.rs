mod memory_target;
mod res_image_view;

pub use memory_target::{DisplayEvent, MemoryDisplayTarget, SlotSummary};
pub use res_image_view::{ImageLoadedListener, ReleaseOutcome, ResImageView, ViewOptions};
