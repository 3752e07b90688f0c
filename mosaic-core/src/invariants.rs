//! Structural checks over a whole project.
//!
//! These conditions are never repaired at runtime: a violation means a bug
//! upstream. Tests assert that the list is empty after every operation.

use rustc_hash::FxHashSet;
use std::fmt;

use crate::{Breakpoint, LayoutItem, Project, WidgetId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    DuplicateWidget(WidgetId),
    MissingParent { child: WidgetId, parent: WidgetId },
    ParentNotFolder { child: WidgetId, parent: WidgetId },
    NestedFolder { folder: WidgetId, parent: WidgetId },
    /// Layout entry for a widget that does not exist in that grid.
    OrphanEntry { grid: Option<WidgetId>, breakpoint: Breakpoint, id: WidgetId },
    MissingEntry { grid: Option<WidgetId>, breakpoint: Breakpoint, id: WidgetId },
    DuplicateEntry { grid: Option<WidgetId>, breakpoint: Breakpoint, id: WidgetId },
    Overlap { grid: Option<WidgetId>, breakpoint: Breakpoint, a: WidgetId, b: WidgetId },
    CollapsedHeight { folder: WidgetId, breakpoint: Breakpoint, h: u32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Project {
    /// Every broken structural invariant, empty when the project is sound.
    pub fn invariant_violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        let tree = self.tree();

        let mut seen = FxHashSet::default();
        for widget in &self.widgets {
            if !seen.insert(widget.id) {
                out.push(Violation::DuplicateWidget(widget.id));
            }
            if let Some(parent) = widget.parent_id {
                match tree.get(parent) {
                    None => out.push(Violation::MissingParent { child: widget.id, parent }),
                    Some(p) if !p.is_folder() => {
                        out.push(Violation::ParentNotFolder { child: widget.id, parent })
                    }
                    Some(_) if widget.is_folder() => {
                        out.push(Violation::NestedFolder { folder: widget.id, parent })
                    }
                    Some(_) => {}
                }
            }
        }

        let top: Vec<WidgetId> = tree.top_level().map(|w| w.id).collect();
        for (bp, items) in self.layouts.iter() {
            check_grid(None, bp, items, &top, &mut out);
        }

        for folder in tree.iter().filter(|w| w.is_folder()) {
            let Some(data) = folder.folder() else { continue };
            let children = tree.children_of(folder.id);
            for bp in Breakpoint::ALL {
                let items = data.nested().map(|l| l.get(bp)).unwrap_or(&[]);
                check_grid(Some(folder.id), bp, items, children, &mut out);

                if data.is_collapsed {
                    if let Some(item) = self.layouts.item(bp, folder.id) {
                        if item.h != folder.min_h {
                            out.push(Violation::CollapsedHeight {
                                folder: folder.id,
                                breakpoint: bp,
                                h: item.h,
                            });
                        }
                    }
                }
            }
        }

        out
    }
}

fn check_grid(
    grid: Option<WidgetId>,
    breakpoint: Breakpoint,
    items: &[LayoutItem],
    expected: &[WidgetId],
    out: &mut Vec<Violation>,
) {
    let expected: FxHashSet<WidgetId> = expected.iter().copied().collect();
    let mut present = FxHashSet::default();

    for item in items {
        if !expected.contains(&item.id) {
            out.push(Violation::OrphanEntry { grid, breakpoint, id: item.id });
        }
        if !present.insert(item.id) {
            out.push(Violation::DuplicateEntry { grid, breakpoint, id: item.id });
        }
    }
    for id in &expected {
        if !present.contains(id) {
            out.push(Violation::MissingEntry { grid, breakpoint, id: *id });
        }
    }

    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.rect().overlaps(&b.rect()) {
                out.push(Violation::Overlap { grid, breakpoint, a: a.id, b: b.id });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Widget, WidgetKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn place_everywhere(project: &mut Project, id: WidgetId, x: u32) {
        for bp in Breakpoint::ALL {
            project.layouts.get_mut(bp).push(LayoutItem::new(id, x, 0, 1, 1));
        }
    }

    #[test]
    fn test_sound_project_has_no_violations() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut project = Project::new("alice", "Sound");
        let note = Widget::new(WidgetKind::Note, None, &mut rng);
        place_everywhere(&mut project, note.id, 0);
        project.widgets.push(note);
        assert!(project.invariant_violations().is_empty());
    }

    #[test]
    fn test_detects_orphan_and_missing_entries() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut project = Project::new("alice", "Broken");
        let note = Widget::new(WidgetKind::Note, None, &mut rng);
        project.widgets.push(note.clone());
        project.layouts.lg.push(LayoutItem::new(Uuid::new_v4(), 0, 0, 1, 1));

        let violations = project.invariant_violations();
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::OrphanEntry { grid: None, .. })));
        assert!(violations.contains(&Violation::MissingEntry {
            grid: None,
            breakpoint: Breakpoint::Md,
            id: note.id,
        }));
    }

    #[test]
    fn test_detects_overlap_and_bad_parent() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut project = Project::new("alice", "Broken");
        let a = Widget::new(WidgetKind::Note, None, &mut rng);
        let b = Widget::new(WidgetKind::Note, Some(a.id), &mut rng);
        place_everywhere(&mut project, a.id, 0);
        project.widgets.push(a.clone());
        project.widgets.push(b.clone());
        project.layouts.lg.push(LayoutItem::new(b.id, 0, 0, 1, 1));

        let violations = project.invariant_violations();
        assert!(violations.contains(&Violation::ParentNotFolder { child: b.id, parent: a.id }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::Overlap { breakpoint: Breakpoint::Lg, .. })));
    }
}
