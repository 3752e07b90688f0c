//! Folder row-span derived from nested content.
//!
//! A folder renders a header and a nested grid with finer rows. Its span on
//! the parent grid is the smallest row count whose pixel height holds the
//! header, padding and the nested grid's bounding box.

use mosaic_core::LayoutItem;
use serde::{Deserialize, Serialize};

/// Pixel metrics shared with the rendering surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridMetrics {
    pub row_height: u32,
    pub margin: u32,
    pub nested_row_height: u32,
    pub nested_margin: u32,
    pub header_height: u32,
    pub vertical_padding: u32,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            row_height: 60,
            margin: 16,
            nested_row_height: 30,
            nested_margin: 10,
            header_height: 48,
            vertical_padding: 16,
        }
    }
}

impl GridMetrics {
    /// Pixel height of `rows` nested rows including the margins between them.
    /// Saturates: surface coordinates are not bounded.
    #[inline]
    pub fn nested_px(&self, rows: u32) -> u32 {
        if rows == 0 {
            return 0;
        }
        rows.saturating_mul(self.nested_row_height)
            .saturating_add((rows - 1).saturating_mul(self.nested_margin))
    }

    /// Parent rows needed to hold `px` pixels.
    #[inline]
    pub fn parent_rows(&self, px: u32) -> u32 {
        let pitch = self.row_height.saturating_add(self.margin).max(1);
        px.saturating_add(self.margin).div_ceil(pitch)
    }
}

/// Largest bottom edge among `items`, 0 when empty.
pub fn max_bottom(items: &[LayoutItem]) -> u32 {
    items.iter().map(LayoutItem::bottom).max().unwrap_or(0)
}

/// Row-span a folder needs at one breakpoint, never below `min_h`.
pub fn folder_row_span(children: &[LayoutItem], min_h: u32, metrics: &GridMetrics) -> u32 {
    let px = metrics
        .nested_px(max_bottom(children))
        .saturating_add(metrics.header_height)
        .saturating_add(metrics.vertical_padding);
    metrics.parent_rows(px).max(min_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn child(y: u32, h: u32) -> LayoutItem {
        LayoutItem::new(Uuid::new_v4(), 0, y, 4, h)
    }

    #[test]
    fn test_empty_folder_keeps_minimum() {
        let m = GridMetrics::default();
        // 64px of chrome fits in 2 rows, below the folder minimum.
        assert_eq!(m.parent_rows(64), 2);
        assert_eq!(folder_row_span(&[], 3, &m), 3);
    }

    #[test]
    fn test_single_child_height_four() {
        let m = GridMetrics::default();
        // 4 nested rows = 150px; + 64 = 214px; ceil(230 / 76) = 4.
        assert_eq!(m.nested_px(4), 150);
        assert_eq!(folder_row_span(&[child(0, 4)], 3, &m), 4);
    }

    #[test]
    fn test_span_uses_bounding_box() {
        let m = GridMetrics::default();
        let children = [child(0, 2), child(6, 4)];
        // 10 rows = 390px; + 64 = 454px; ceil(470 / 76) = 7.
        assert_eq!(folder_row_span(&children, 3, &m), 7);
    }

    #[test]
    fn test_span_is_monotone_in_content() {
        let m = GridMetrics::default();
        let mut last = 0;
        for rows in 0..40 {
            let span = folder_row_span(&[child(0, rows)], 3, &m);
            assert!(span >= last);
            last = span;
        }
    }

    #[test]
    fn test_custom_metrics() {
        let m = GridMetrics {
            row_height: 100,
            margin: 0,
            nested_row_height: 50,
            nested_margin: 0,
            header_height: 0,
            vertical_padding: 0,
        };
        assert_eq!(folder_row_span(&[child(0, 4)], 1, &m), 2);
    }

    #[test]
    fn test_far_away_child_saturates() {
        let m = GridMetrics::default();
        assert_eq!(m.nested_px(u32::MAX), u32::MAX);
        let span = folder_row_span(&[child(200_000_000, 4)], 3, &m);
        assert_eq!(span, u32::MAX.div_ceil(76));
        assert_eq!(folder_row_span(&[child(u32::MAX, u32::MAX)], 3, &m), span);
    }
}
