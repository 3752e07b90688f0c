//! Cell occupancy index for integer grid layouts.
//!
//! Every placed item marks the cells it covers. A candidate rectangle is
//! free iff none of its cells is marked, which for items of nonzero size is
//! exactly the half-open overlap test of [`GridRect::overlaps`].
//!
//! # Design decisions
//!
//! * **Cell → occupant map.** Lookups touch only the cells of the candidate,
//!   so scan cost does not grow with the number of items on the grid.
//! * **Separate `bounds` cache** gives O(cells) removal without scanning
//!   the whole map.
//! * Zero-size items occupy no cells but still count toward [`bottom`].
//!
//! [`bottom`]: OccupancyGrid::bottom

use mosaic_core::{GridRect, LayoutItem, WidgetId};
use rustc_hash::FxHashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Cell(u32, u32);

#[derive(Clone, Debug, Default)]
pub struct OccupancyGrid {
    /// Cell → id of the item covering it.
    cells: FxHashMap<Cell, WidgetId>,
    /// Per-item rectangle, for removal and bottom-edge queries.
    bounds: FxHashMap<WidgetId, GridRect>,
}

impl OccupancyGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every item of one breakpoint's layout.
    pub fn from_items(items: &[LayoutItem]) -> Self {
        let mut grid = Self::new();
        for item in items {
            grid.insert(item.id, item.rect());
        }
        grid
    }

    // ───────────────────── mutation ─────────────────────

    /// Insert (or move) an item.
    pub fn insert(&mut self, id: WidgetId, rect: GridRect) {
        if self.bounds.contains_key(&id) {
            self.remove(id);
        }
        self.bounds.insert(id, rect);
        for cell in cells_of(rect) {
            self.cells.insert(cell, id);
        }
    }

    /// Remove an item. No-op if the id is unknown.
    pub fn remove(&mut self, id: WidgetId) {
        if let Some(rect) = self.bounds.remove(&id) {
            for cell in cells_of(rect) {
                // Only release cells this item still owns; an overlapping
                // fallback placement may have claimed some of them.
                if self.cells.get(&cell) == Some(&id) {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.bounds.clear();
    }

    // ───────────────────── queries ─────────────────────

    /// `true` if `rect` covers no occupied cell.
    #[inline]
    pub fn is_free(&self, rect: GridRect) -> bool {
        cells_of(rect).all(|cell| !self.cells.contains_key(&cell))
    }

    /// Ids of the items whose cells `rect` covers, deduplicated.
    pub fn collisions(&self, rect: GridRect) -> Vec<WidgetId> {
        let mut hits: Vec<WidgetId> = Vec::new();
        for cell in cells_of(rect) {
            if let Some(&id) = self.cells.get(&cell) {
                if !hits.contains(&id) {
                    hits.push(id);
                }
            }
        }
        hits
    }

    pub fn rect_of(&self, id: WidgetId) -> Option<GridRect> {
        self.bounds.get(&id).copied()
    }

    /// Largest bottom edge of any indexed item, 0 when empty.
    pub fn bottom(&self) -> u32 {
        self.bounds.values().map(GridRect::bottom).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

#[inline]
fn cells_of(rect: GridRect) -> impl Iterator<Item = Cell> {
    let (x0, x1) = (rect.x, rect.right());
    let (y0, y1) = (rect.y, rect.bottom());
    (y0..y1).flat_map(move |y| (x0..x1).map(move |x| Cell(x, y)))
}

// ───────────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_new_grid_is_empty() {
        let grid = OccupancyGrid::new();
        assert!(grid.is_empty());
        assert_eq!(grid.bottom(), 0);
        assert!(grid.is_free(GridRect::new(0, 0, 12, 100)));
    }

    #[test]
    fn test_insert_marks_cells() {
        let mut grid = OccupancyGrid::new();
        grid.insert(Uuid::new_v4(), GridRect::new(0, 0, 4, 2));
        assert_eq!(grid.occupied_cells(), 8);
        assert_eq!(grid.bottom(), 2);
    }

    #[test]
    fn test_touching_edges_are_free() {
        let mut grid = OccupancyGrid::new();
        grid.insert(Uuid::new_v4(), GridRect::new(0, 0, 4, 2));
        assert!(grid.is_free(GridRect::new(4, 0, 4, 2)));
        assert!(grid.is_free(GridRect::new(0, 2, 4, 2)));
        assert!(!grid.is_free(GridRect::new(3, 1, 4, 2)));
    }

    #[test]
    fn test_agrees_with_rect_overlap() {
        let placed = GridRect::new(2, 3, 3, 2);
        let mut grid = OccupancyGrid::new();
        grid.insert(Uuid::new_v4(), placed);
        for y in 0..8 {
            for x in 0..8 {
                let candidate = GridRect::new(x, y, 2, 2);
                let free = !placed.overlaps(&candidate);
                assert_eq!(grid.is_free(candidate), free, "{candidate:?}");
            }
        }
    }

    #[test]
    fn test_zero_size_item_counts_for_bottom_only() {
        let mut grid = OccupancyGrid::new();
        grid.insert(Uuid::new_v4(), GridRect::new(0, 7, 0, 0));
        assert_eq!(grid.occupied_cells(), 0);
        assert_eq!(grid.bottom(), 7);
    }

    #[test]
    fn test_reinsert_moves_item() {
        let id = Uuid::new_v4();
        let mut grid = OccupancyGrid::new();
        grid.insert(id, GridRect::new(0, 0, 2, 2));
        grid.insert(id, GridRect::new(0, 5, 2, 2));
        assert_eq!(grid.len(), 1);
        assert!(grid.is_free(GridRect::new(0, 0, 2, 2)));
        assert_eq!(grid.rect_of(id), Some(GridRect::new(0, 5, 2, 2)));
    }

    #[test]
    fn test_remove_keeps_cells_of_overlapping_item() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut grid = OccupancyGrid::new();
        grid.insert(a, GridRect::new(0, 0, 2, 2));
        grid.insert(b, GridRect::new(1, 0, 2, 2));
        grid.remove(a);
        assert!(!grid.is_free(GridRect::new(1, 0, 1, 1)));
        assert!(grid.is_free(GridRect::new(0, 0, 1, 2)));
    }

    #[test]
    fn test_collisions_dedup() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut grid = OccupancyGrid::new();
        grid.insert(a, GridRect::new(0, 0, 4, 2));
        grid.insert(b, GridRect::new(4, 0, 4, 2));
        let hits = grid.collisions(GridRect::new(2, 1, 4, 4));
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&a) && hits.contains(&b));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut grid = OccupancyGrid::new();
        grid.remove(Uuid::new_v4());
        assert!(grid.is_empty());
    }
}
