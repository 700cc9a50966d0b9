//! Display target that keeps its slots in memory.

use tracing::warn;

use crate::domain::entities::{ResourceRef, SlotContent};
use crate::domain::ports::DisplayTarget;

const SLOT_COUNT: usize = 2;

/// A record of one mutation applied to a [`MemoryDisplayTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DisplayEvent {
    /// Slot content was replaced.
    Slot { index: usize, content: SlotSummary },
    /// Slot background was replaced.
    Background { index: usize, background: Option<ResourceRef> },
    /// The visible slot changed.
    Displayed(usize),
}

/// Slot content without the pixel data, so history holds no image memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SlotSummary {
    Empty,
    Resource(ResourceRef),
    /// A bitmap of the given size.
    Image { width: u32, height: u32 },
}

impl From<&SlotContent> for SlotSummary {
    fn from(content: &SlotContent) -> Self {
        match content {
            SlotContent::Empty => Self::Empty,
            SlotContent::Resource(resource) => Self::Resource(*resource),
            SlotContent::Image(image) => Self::Image {
                width: image.width(),
                height: image.height(),
            },
        }
    }
}

/// Headless two-slot surface.
///
/// Used by the command-line host and by tests to observe exactly which
/// mutations a view performs.
#[derive(Debug, Default)]
pub struct MemoryDisplayTarget {
    slots: [SlotContent; SLOT_COUNT],
    backgrounds: [Option<ResourceRef>; SLOT_COUNT],
    displayed: usize,
    fade_in: bool,
    history: Vec<DisplayEvent>,
}

impl MemoryDisplayTarget {
    /// Creates an empty target showing slot 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns slot `index`, or `None` if out of range.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&SlotContent> {
        self.slots.get(index)
    }

    /// Background of slot `index`, if any.
    #[must_use]
    pub fn background(&self, index: usize) -> Option<ResourceRef> {
        self.backgrounds.get(index).copied().flatten()
    }

    /// Index of the visible slot.
    #[must_use]
    pub const fn displayed_index(&self) -> usize {
        self.displayed
    }

    /// What the user currently sees.
    #[must_use]
    pub fn displayed_content(&self) -> &SlotContent {
        &self.slots[self.displayed]
    }

    /// Whether new content fades in.
    #[must_use]
    pub const fn fade_in(&self) -> bool {
        self.fade_in
    }

    /// Every mutation since creation or the last [`Self::clear_history`].
    #[must_use]
    pub fn history(&self) -> &[DisplayEvent] {
        &self.history
    }

    /// Forgets recorded mutations.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl DisplayTarget for MemoryDisplayTarget {
    fn set_slot(&mut self, index: usize, content: SlotContent) {
        let Some(slot) = self.slots.get_mut(index) else {
            warn!(index, "Ignoring content for unknown slot");
            return;
        };
        self.history.push(DisplayEvent::Slot {
            index,
            content: SlotSummary::from(&content),
        });
        *slot = content;
    }

    fn set_background(&mut self, index: usize, background: Option<ResourceRef>) {
        let Some(slot) = self.backgrounds.get_mut(index) else {
            warn!(index, "Ignoring background for unknown slot");
            return;
        };
        self.history
            .push(DisplayEvent::Background { index, background });
        *slot = background;
    }

    fn set_displayed_index(&mut self, index: usize) {
        if index >= SLOT_COUNT {
            warn!(index, "Ignoring switch to unknown slot");
            return;
        }
        self.history.push(DisplayEvent::Displayed(index));
        self.displayed = index;
    }

    fn set_fade_in(&mut self, enabled: bool) {
        self.fade_in = enabled;
    }
}
