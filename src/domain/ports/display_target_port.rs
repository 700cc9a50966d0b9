//! Port definition for a two-slot display surface.

use crate::domain::entities::{ResourceRef, SlotContent};

/// A surface with two interchangeable slots, one of which is shown.
///
/// Slot 0 holds content, slot 1 the loading indicator. Implementations are
/// owned by a single view and only touched from the thread driving it.
pub trait DisplayTarget {
    /// Replaces what slot `index` shows.
    fn set_slot(&mut self, index: usize, content: SlotContent);

    /// Sets or clears the background behind slot `index`.
    fn set_background(&mut self, index: usize, background: Option<ResourceRef>);

    /// Switches the visible slot.
    fn set_displayed_index(&mut self, index: usize);

    /// Enables a fade-in when the displayed slot changes.
    fn set_fade_in(&mut self, _enabled: bool) {}
}
