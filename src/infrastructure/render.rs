//! Render adapter seam
//!
//! The list/table UI the engine drives. Row `i` always displays the window's
//! id at index `i`; the adapter owns layout (row heights, viewport) and the
//! engine owns content. Offsets are pixels in content coordinates, with the
//! viewport offset measuring the content pixel at the viewport's top edge.

use std::ops::Range;

use strum::Display;

/// Where a row should land in the viewport after a programmatic scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScrollPosition {
    Top,
    Middle,
    Bottom,
}

/// The UI surface the engine drives.
///
/// Implementations are main-thread UI objects; the engine only calls them
/// from its own (single-owner) context. `row_offset` may return `None` for
/// rows the adapter has not laid out yet — target scrolling polls for
/// materialization instead of assuming it.
pub trait RenderAdapter {
    fn row_count(&self) -> usize;

    /// Indices of rows currently intersecting the viewport.
    fn visible_rows(&self) -> Range<usize>;

    /// Content-coordinate pixel offset of a row's top edge.
    fn row_offset(&self, index: usize) -> Option<f32>;

    fn viewport_offset(&self) -> f32;

    fn viewport_height(&self) -> f32;

    /// Move the viewport without animation side effects beyond the move
    /// itself.
    fn set_viewport_offset(&mut self, offset: f32);

    fn scroll_to(&mut self, index: usize, position: ScrollPosition, animated: bool);

    /// Content changed: re-bind rows to the current window, which now has
    /// `row_count` entries.
    fn reload(&mut self, row_count: usize);
}
