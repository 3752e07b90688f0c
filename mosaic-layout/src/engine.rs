use mosaic_core::{Breakpoint, GridRect, LayoutItem, Layouts, WidgetId};
use serde::{Deserialize, Serialize};

use crate::spatial::OccupancyGrid;

/// Tunables for the placement scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Rows scanned before falling back to the bottom of the grid.
    pub max_scan_rows: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_scan_rows: 200 }
    }
}

impl SolverConfig {
    /// Short scan so fallback paths are cheap to reach in tests.
    pub fn for_testing() -> Self {
        Self { max_scan_rows: 20 }
    }
}

/// Result of one placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    /// Footprint after clamping to the column count.
    pub w: u32,
    pub h: u32,
    /// No free cell within the scan window; placed below everything.
    pub fallback: bool,
}

/// First-fit placement over one breakpoint's layout.
///
/// Scans rows top to bottom and columns left to right, accepting the first
/// cell whose rectangle overlaps nothing. Placement is deterministic for a
/// given layout and never mutates the input.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridSolver {
    config: SolverConfig,
}

impl GridSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Find a free cell for `footprint` (w, h) in `items` on a `columns` grid.
    pub fn place(&self, footprint: (u32, u32), items: &[LayoutItem], columns: u32) -> Placement {
        let columns = columns.max(1);
        let w = footprint.0.clamp(1, columns);
        let h = footprint.1.max(1);
        let occupancy = OccupancyGrid::from_items(items);

        for y in 0..self.config.max_scan_rows {
            for x in 0..=columns - w {
                if occupancy.is_free(GridRect::new(x, y, w, h)) {
                    return Placement { x, y, w, h, fallback: false };
                }
            }
        }

        let y = items.iter().map(LayoutItem::bottom).max().unwrap_or(0);
        log::debug!(
            "Solver: no free {w}x{h} cell within {} rows on {columns} columns, placing at row {y}",
            self.config.max_scan_rows
        );
        Placement { x: 0, y, w, h, fallback: true }
    }

    /// Place a new entry for `id`. `min` is recorded on the item, with the
    /// width clamped like the footprint.
    pub fn place_item(
        &self,
        id: WidgetId,
        footprint: (u32, u32),
        min: (u32, u32),
        items: &[LayoutItem],
        columns: u32,
    ) -> LayoutItem {
        let p = self.place(footprint, items, columns);
        LayoutItem::new(id, p.x, p.y, p.w, p.h).with_min(min.0.clamp(1, p.w), min.1.clamp(1, p.h))
    }

    /// Place `id` independently at every breakpoint, appending the entries.
    ///
    /// `nested` selects folder column counts. `footprint` may differ per
    /// breakpoint (copies keep the source's size at each tier).
    pub fn place_everywhere(
        &self,
        id: WidgetId,
        min: (u32, u32),
        layouts: &mut Layouts,
        nested: bool,
        mut footprint: impl FnMut(Breakpoint) -> (u32, u32),
    ) {
        for bp in Breakpoint::ALL {
            let columns = if nested { bp.nested_columns() } else { bp.columns() };
            let item = self.place_item(id, footprint(bp), min, layouts.get(bp), columns);
            layouts.get_mut(bp).push(item);
        }
    }
}

/// Move siblings that collide with `anchor` (or with anything already moved)
/// straight down until nothing overlaps. Returns the number of items moved.
///
/// Used after an item grows in place. Items are settled in (y, x) order, so
/// the result is deterministic and terminates: every move strictly
/// increases an item's row.
pub fn push_down(items: &mut [LayoutItem], anchor: WidgetId) -> usize {
    let Some(anchor_idx) = items.iter().position(|item| item.id == anchor) else {
        return 0;
    };

    let mut settled = OccupancyGrid::new();
    settled.insert(anchor, items[anchor_idx].rect());

    let mut order: Vec<usize> = (0..items.len()).filter(|&i| i != anchor_idx).collect();
    order.sort_by_key(|&i| (items[i].y, items[i].x));

    let mut moved = 0;
    for i in order {
        let mut rect = items[i].rect();
        loop {
            let lowest = settled
                .collisions(rect)
                .into_iter()
                .filter_map(|id| settled.rect_of(id))
                .map(|r| r.bottom())
                .max();
            match lowest {
                Some(bottom) if bottom > rect.y => rect.y = bottom,
                _ => break,
            }
        }
        if rect.y != items[i].y {
            items[i].y = rect.y;
            moved += 1;
        }
        settled.insert(items[i].id, rect);
    }
    moved
}
