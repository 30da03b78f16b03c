//! Scroll anchor capture and restoration
//!
//! Prepending rows above the viewport shifts every row offset below them;
//! without correction the user's reading position jumps. The anchor records
//! the first fully visible row as `(message id, pixel distance from the
//! viewport top)` immediately before a window mutation, and after the
//! mutation moves the viewport so that row sits at the same distance again.
//!
//! A partially clipped top row is skipped as an anchor candidate — its
//! offset is unstable under row-height changes. If the anchor id cannot be
//! found after the mutation (a concurrent reload replaced the window), the
//! restore is a silent no-op rather than a guess.

use crate::domain::message::MessageId;
use crate::infrastructure::render::RenderAdapter;
use crate::model::window::Window;

/// A transient `(message id, pixel offset)` pair. Captured immediately
/// before a window mutation and consumed immediately after; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollAnchor {
    id: MessageId,
    distance_from_top: f32,
}

impl ScrollAnchor {
    /// Capture the first fully visible row as an anchor.
    ///
    /// Returns `None` when nothing is visible or no visible row has a
    /// resolvable offset — a prepend into an unmaterialized list needs no
    /// correction.
    pub fn capture<R: RenderAdapter>(window: &Window, render: &R) -> Option<Self> {
        let viewport_top = render.viewport_offset();
        for index in render.visible_rows() {
            let Some(offset) = render.row_offset(index) else {
                continue;
            };
            // Skip a row clipped by the top edge; it is an unstable anchor
            if offset < viewport_top {
                continue;
            }
            let id = window.get(index)?.id.clone();
            return Some(Self {
                id,
                distance_from_top: offset - viewport_top,
            });
        }
        None
    }

    /// Restore the viewport so the anchor row sits at its captured distance
    /// from the viewport top. No animation: a visible jump-then-correct is
    /// worse than an instant correct.
    pub fn restore<R: RenderAdapter>(&self, window: &Window, render: &mut R) {
        let Some(index) = window.position(&self.id) else {
            log::warn!("Anchor {} vanished across mutation; not restoring", self.id);
            return;
        };
        let Some(offset) = render.row_offset(index) else {
            return;
        };
        render.set_viewport_offset(offset - self.distance_from_top);
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn distance_from_top(&self) -> f32 {
        self.distance_from_top
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::model::window::Message as WindowMessage;
    use crate::test_helpers::{sortable, MockRenderAdapter, ROW_HEIGHT};

    const EPSILON: f32 = 0.001;

    /// Window of `count` rows starting at timestamp 10_000, 10ms apart.
    fn window_of(count: usize) -> Window {
        let mut window = Window::new();
        window.update(WindowMessage::PageMerged {
            ids: (0..count).map(|i| sortable(10_000 + i as u64 * 10, 1)).collect(),
        });
        window
    }

    #[test]
    fn test_capture_picks_first_fully_visible_row() {
        let window = window_of(20);
        let mut render = MockRenderAdapter::new(20);
        // Viewport top halfway through row 3: row 3 is clipped, row 4 is the
        // first fully visible row
        render.set_viewport_offset(3.5 * ROW_HEIGHT);

        let anchor = ScrollAnchor::capture(&window, &render).expect("anchor");
        assert_eq!(anchor.id(), &window.get(4).expect("row 4").id);
        assert!((anchor.distance_from_top() - 0.5 * ROW_HEIGHT).abs() < EPSILON);
    }

    #[test]
    fn test_capture_at_exact_row_boundary() {
        let window = window_of(20);
        let mut render = MockRenderAdapter::new(20);
        render.set_viewport_offset(2.0 * ROW_HEIGHT);

        let anchor = ScrollAnchor::capture(&window, &render).expect("anchor");
        // Row 2 starts exactly at the viewport top: fully visible
        assert_eq!(anchor.id(), &window.get(2).expect("row 2").id);
        assert!(anchor.distance_from_top().abs() < EPSILON);
    }

    #[test]
    fn test_capture_on_empty_list() {
        let window = Window::new();
        let render = MockRenderAdapter::new(0);
        assert_eq!(ScrollAnchor::capture(&window, &render), None);
    }

    #[rstest]
    #[case(1)]
    #[case(10)]
    #[case(50)]
    fn test_prepend_preserves_pixel_offset(#[case] prepended: usize) {
        let mut window = window_of(20);
        let mut render = MockRenderAdapter::new(20);
        render.set_viewport_offset(5.25 * ROW_HEIGHT);

        let anchor = ScrollAnchor::capture(&window, &render).expect("anchor");
        let before = render.row_offset_of_viewport(anchor.id().clone(), &window);

        // Prepend rows strictly older than everything in the window
        window.update(WindowMessage::PageMerged {
            ids: (0..prepended).map(|i| sortable(100 + i as u64, 1)).collect(),
        });
        render.set_row_count(window.len());

        anchor.restore(&window, &mut render);
        let after = render.row_offset_of_viewport(anchor.id().clone(), &window);
        assert!(
            (before - after).abs() < EPSILON,
            "anchor drifted by {} px after prepending {prepended} rows",
            (before - after).abs()
        );
    }

    #[test]
    fn test_restore_is_noop_when_anchor_vanished() {
        let window = window_of(10);
        let mut render = MockRenderAdapter::new(10);
        render.set_viewport_offset(2.0 * ROW_HEIGHT);

        let anchor = ScrollAnchor::capture(&window, &render).expect("anchor");

        // Simulate a concurrent reload that replaced the window entirely
        let mut replaced = Window::new();
        replaced.update(WindowMessage::PageMerged {
            ids: (0..10).map(|i| sortable(90_000 + i, 1)).collect(),
        });

        let offset_before = render.viewport_offset();
        anchor.restore(&replaced, &mut render);
        assert_eq!(render.viewport_offset(), offset_before);
    }
}
