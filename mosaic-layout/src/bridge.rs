//! Edit op → project version bridge
//!
//! Applies `EditOp` intents to a project and returns the next version. The
//! input project is never mutated; every op works on a draft that is only
//! handed back when it differs from the input.
//!
//! # Architecture
//!
//! ```text
//!  Editor ──EditOp──▸ EditBridge ──▸ Project (next version)
//!                         │
//!                GridSolver + GridMetrics
//! ```
//!
//! Ops that reference a widget removed by a concurrent editor resolve to
//! [`Applied::Skipped`]; that is an expected race, not an error.

use mosaic_core::{
    sanitize_layouts, AssignUpdate, Breakpoint, EditOp, LayoutScope, Layouts, Project,
    SurfaceLayouts, Widget, WidgetData, WidgetId, WidgetKind, WidgetTree,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::engine::{push_down, GridSolver, SolverConfig};
use crate::folder::{folder_row_span, GridMetrics};

/// Deepest row a surface report may place or size an entry at.
pub const MAX_SURFACE_ROWS: u32 = 10_000;

// ---------------------------------------------------------------
// Error types
// ---------------------------------------------------------------

/// Ops the widget tree rejects outright.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("widget {0} is not a folder")]
    NotAFolder(WidgetId),

    #[error("folder {0} cannot contain another folder")]
    NestedFolder(WidgetId),

    #[error("cannot replace {expected:?} payload with {given:?}")]
    KindMismatch {
        expected: WidgetKind,
        given: WidgetKind,
    },
}

/// UI side effect requested by an op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    ScrollTo(WidgetId),
}

#[derive(Debug)]
pub enum Applied {
    Changed {
        project: Project,
        effect: Option<Effect>,
    },
    /// The op resolves to the project it was given.
    Unchanged,
    /// A referenced widget no longer exists.
    Skipped { missing: WidgetId },
}

/// Lifetime counters, one bucket per [`Applied`] outcome plus errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub changed: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub errors: u64,
}

enum Step {
    Done(Option<Effect>),
    Missing(WidgetId),
}

#[derive(Clone, Copy)]
enum Refit {
    /// Never shrink (child added).
    Grow,
    /// Track content exactly (child removed or resized).
    Exact,
}

/// Project under construction. Widgets live in a [`WidgetTree`] while the
/// op runs and are written back in tree order.
struct Draft {
    project: Project,
    tree: WidgetTree,
}

impl Draft {
    fn new(project: &Project) -> Self {
        let mut project = project.clone();
        let tree = WidgetTree::from_widgets(std::mem::take(&mut project.widgets));
        Self { project, tree }
    }

    fn finish(self) -> Project {
        let Draft { mut project, tree } = self;
        project.widgets = tree.into_widgets();
        project
    }
}

// ---------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------

pub struct EditBridge {
    solver: GridSolver,
    metrics: GridMetrics,
    /// Source for gradient colors of new widgets.
    rng: StdRng,
    stats: BridgeStats,
}

impl Default for EditBridge {
    fn default() -> Self {
        Self::new(SolverConfig::default(), GridMetrics::default())
    }
}

impl EditBridge {
    pub fn new(solver: SolverConfig, metrics: GridMetrics) -> Self {
        Self::with_rng(solver, metrics, StdRng::from_os_rng())
    }

    /// Deterministic gradients for tests and replays.
    pub fn with_seed(solver: SolverConfig, metrics: GridMetrics, seed: u64) -> Self {
        Self::with_rng(solver, metrics, StdRng::seed_from_u64(seed))
    }

    fn with_rng(solver: SolverConfig, metrics: GridMetrics, rng: StdRng) -> Self {
        Self {
            solver: GridSolver::new(solver),
            metrics,
            rng,
            stats: BridgeStats::default(),
        }
    }

    pub fn metrics(&self) -> &GridMetrics {
        &self.metrics
    }

    pub fn solver(&self) -> &GridSolver {
        &self.solver
    }

    #[inline]
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Total ops seen over the lifetime of this bridge.
    #[inline]
    pub fn total_processed(&self) -> u64 {
        self.stats.changed + self.stats.unchanged + self.stats.skipped + self.stats.errors
    }

    /// Compute the project version that results from `op`.
    pub fn apply(&mut self, project: &Project, op: &EditOp) -> Result<Applied, BridgeError> {
        let result = self.apply_one(project, op);
        match &result {
            Ok(Applied::Changed { .. }) => self.stats.changed += 1,
            Ok(Applied::Unchanged) => self.stats.unchanged += 1,
            Ok(Applied::Skipped { missing }) => {
                log::debug!("Bridge: {} skipped, widget {missing} no longer exists", op.name());
                self.stats.skipped += 1;
            }
            Err(e) => {
                log::warn!("Bridge: {} rejected: {e}", op.name());
                self.stats.errors += 1;
            }
        }
        result
    }

    fn apply_one(&mut self, project: &Project, op: &EditOp) -> Result<Applied, BridgeError> {
        let mut draft = Draft::new(project);
        let step = match op {
            EditOp::AddWidget { kind, parent_id } => self.add(&mut draft, *kind, *parent_id)?,
            EditOp::RemoveWidget { id } => self.remove(&mut draft, *id),
            EditOp::CopyWidget { id } => self.copy(&mut draft, *id),
            EditOp::UpdateData {
                id,
                data,
                assigned_user,
            } => update_data(&mut draft, *id, data, assigned_user)?,
            EditOp::ToggleFolder { id } => toggle_folder(&mut draft, *id)?,
            EditOp::LayoutChange { scope, layouts } => {
                self.layout_change(&mut draft, *scope, layouts)?
            }
        };

        let effect = match step {
            Step::Done(effect) => effect,
            Step::Missing(missing) => return Ok(Applied::Skipped { missing }),
        };
        let next = draft.finish();
        if next == *project {
            Ok(Applied::Unchanged)
        } else {
            Ok(Applied::Changed {
                project: next,
                effect,
            })
        }
    }

    // ---------------------------------------------------------------
    // Structural ops
    // ---------------------------------------------------------------

    fn add(
        &mut self,
        draft: &mut Draft,
        kind: WidgetKind,
        parent_id: Option<WidgetId>,
    ) -> Result<Step, BridgeError> {
        if let Some(pid) = parent_id {
            let Some(parent) = draft.tree.get(pid) else {
                return Ok(Step::Missing(pid));
            };
            if !parent.is_folder() {
                return Err(BridgeError::NotAFolder(pid));
            }
            if kind == WidgetKind::Folder {
                return Err(BridgeError::NestedFolder(pid));
            }
        }

        let widget = Widget::new(kind, parent_id, &mut self.rng);
        let id = widget.id;
        let min = (widget.min_w, widget.min_h);
        match parent_id {
            None => {
                self.solver
                    .place_everywhere(id, min, &mut draft.project.layouts, false, |_| min)
            }
            Some(pid) => {
                if let Some(folder) = draft.tree.get_mut(pid).and_then(Widget::folder_mut) {
                    self.solver
                        .place_everywhere(id, min, folder.nested_mut(), true, |_| min);
                }
            }
        }
        draft.tree.insert(widget);

        if let Some(pid) = parent_id {
            self.refit_folder(draft, pid, Refit::Grow);
        }
        log::debug!("Bridge: added {kind:?} {id}");
        Ok(Step::Done(Some(Effect::ScrollTo(id))))
    }

    fn remove(&self, draft: &mut Draft, id: WidgetId) -> Step {
        let Some(widget) = draft.tree.get(id) else {
            return Step::Missing(id);
        };
        let parent_id = widget.parent_id;

        let removed: FxHashSet<WidgetId> =
            draft.tree.remove_subtree(id).into_iter().map(|w| w.id).collect();
        draft.project.layouts.retain_ids(|i| !removed.contains(&i));

        if let Some(pid) = parent_id {
            if let Some(nested) = draft
                .tree
                .get_mut(pid)
                .and_then(Widget::folder_mut)
                .and_then(|f| f.layouts.as_mut())
            {
                nested.retain_ids(|i| !removed.contains(&i));
            }
            self.refit_folder(draft, pid, Refit::Exact);
        }
        log::debug!("Bridge: removed {} widget(s) rooted at {id}", removed.len());
        Step::Done(None)
    }

    /// Duplicate a widget (and a folder's children) under fresh ids, next to
    /// the source in the same grid, keeping the source's size per breakpoint.
    fn copy(&self, draft: &mut Draft, id: WidgetId) -> Step {
        let Some(source) = draft.tree.get(id) else {
            return Step::Missing(id);
        };
        let parent_id = source.parent_id;
        let min = (source.min_w, source.min_h);

        let originals: Vec<Widget> = std::iter::once(id)
            .chain(draft.tree.children_of(id).iter().copied())
            .filter_map(|wid| draft.tree.get(wid).cloned())
            .collect();
        let pairs: Vec<(Widget, WidgetId)> =
            originals.into_iter().map(|w| (w, Uuid::new_v4())).collect();
        let remap: FxHashMap<WidgetId, WidgetId> =
            pairs.iter().map(|(w, new_id)| (w.id, *new_id)).collect();

        let copies: Vec<Widget> = pairs
            .into_iter()
            .map(|(mut widget, new_id)| {
                widget.id = new_id;
                widget.parent_id = widget.parent_id.map(|p| remap.get(&p).copied().unwrap_or(p));
                widget.data.remap_dependencies(&remap);
                if let Some(nested) = widget.folder_mut().and_then(|f| f.layouts.as_mut()) {
                    for bp in Breakpoint::ALL {
                        for item in nested.get_mut(bp) {
                            item.id = remap.get(&item.id).copied().unwrap_or(item.id);
                        }
                    }
                }
                widget
            })
            .collect();
        let copy_id = remap.get(&id).copied().unwrap_or(id);

        match parent_id {
            None => {
                let sizes = footprints(&draft.project.layouts, id, min);
                self.solver.place_everywhere(
                    copy_id,
                    min,
                    &mut draft.project.layouts,
                    false,
                    |bp| sizes.get(&bp).copied().unwrap_or(min),
                );
            }
            Some(pid) => {
                if let Some(folder) = draft.tree.get_mut(pid).and_then(Widget::folder_mut) {
                    let nested = folder.nested_mut();
                    let sizes = footprints(nested, id, min);
                    self.solver.place_everywhere(copy_id, min, nested, true, |bp| {
                        sizes.get(&bp).copied().unwrap_or(min)
                    });
                }
            }
        }

        let count = copies.len();
        for widget in copies {
            draft.tree.insert(widget);
        }
        if let Some(pid) = parent_id {
            self.refit_folder(draft, pid, Refit::Grow);
        }
        log::debug!("Bridge: copied {id} as {copy_id} ({count} widget(s))");
        Step::Done(Some(Effect::ScrollTo(copy_id)))
    }

    fn layout_change(
        &self,
        draft: &mut Draft,
        scope: LayoutScope,
        surface: &SurfaceLayouts,
    ) -> Result<Step, BridgeError> {
        match scope {
            LayoutScope::TopLevel => {
                let known: FxHashSet<WidgetId> = draft.tree.top_level().map(|w| w.id).collect();
                let mut next = merge_surface(surface, &draft.project.layouts, &known, false);

                for bp in Breakpoint::ALL {
                    let items = next.get_mut(bp);
                    let mut raised = Vec::new();
                    for item in items.iter_mut() {
                        let before = draft.project.layouts.item(bp, item.id).map(|i| i.h);
                        let Some(widget) = draft.tree.get_mut(item.id) else {
                            continue;
                        };
                        let min_h = widget.min_h;
                        let Some(folder) = widget.folder_mut() else {
                            continue;
                        };
                        if folder.is_collapsed {
                            // Only the header shows; the surface cannot resize it.
                            if item.h < min_h {
                                raised.push(item.id);
                            }
                            item.h = min_h;
                        } else if before != Some(item.h) {
                            folder.expanded_h.insert(bp, item.h);
                        }
                    }
                    for id in raised {
                        push_down(items, id);
                    }
                }
                draft.project.layouts = next;
            }
            LayoutScope::Folder(fid) => {
                let known: FxHashSet<WidgetId> =
                    draft.tree.children_of(fid).iter().copied().collect();
                let Some(widget) = draft.tree.get_mut(fid) else {
                    return Ok(Step::Missing(fid));
                };
                let Some(folder) = widget.folder_mut() else {
                    return Err(BridgeError::NotAFolder(fid));
                };
                let base = folder.layouts.clone().unwrap_or_default();
                let next = merge_surface(surface, &base, &known, true);
                if next == base {
                    return Ok(Step::Done(None));
                }
                folder.layouts = Some(next);
                self.refit_folder(draft, fid, Refit::Exact);
            }
        }
        Ok(Step::Done(None))
    }

    /// Re-derive an expanded folder's row-span at every breakpoint and push
    /// siblings out of the way when it grows.
    fn refit_folder(&self, draft: &mut Draft, folder_id: WidgetId, refit: Refit) {
        let Some(widget) = draft.tree.get(folder_id) else {
            return;
        };
        let Some(folder) = widget.folder() else {
            return;
        };
        if folder.is_collapsed {
            return;
        }
        let min_h = widget.min_h;
        let empty = Layouts::default();
        let nested = folder.nested().unwrap_or(&empty);

        for bp in Breakpoint::ALL {
            let span = folder_row_span(nested.get(bp), min_h, &self.metrics);
            let layout = draft.project.layouts.get_mut(bp);
            let Some(item) = layout.iter_mut().find(|i| i.id == folder_id) else {
                continue;
            };
            let next = match refit {
                Refit::Grow => item.h.max(span),
                Refit::Exact => span,
            };
            if next == item.h {
                continue;
            }
            let grew = next > item.h;
            item.h = next;
            if grew {
                push_down(layout, folder_id);
            }
        }
    }
}

// ---------------------------------------------------------------
// Payload ops
// ---------------------------------------------------------------

fn update_data(
    draft: &mut Draft,
    id: WidgetId,
    data: &WidgetData,
    assigned_user: &AssignUpdate,
) -> Result<Step, BridgeError> {
    let Some(widget) = draft.tree.get_mut(id) else {
        return Ok(Step::Missing(id));
    };
    if widget.kind() != data.kind() {
        return Err(BridgeError::KindMismatch {
            expected: widget.kind(),
            given: data.kind(),
        });
    }
    match (&mut widget.data, data) {
        // Collapse state and nested layouts belong to the structural ops.
        (WidgetData::Folder(current), WidgetData::Folder(next)) => {
            current.title.clone_from(&next.title)
        }
        (slot, next) => *slot = next.clone(),
    }
    match assigned_user {
        AssignUpdate::Unchanged => {}
        AssignUpdate::Unassign => widget.assigned_user = None,
        AssignUpdate::Assign(user) => widget.assigned_user = Some(user.clone()),
    }
    Ok(Step::Done(None))
}

fn toggle_folder(draft: &mut Draft, id: WidgetId) -> Result<Step, BridgeError> {
    let Some(widget) = draft.tree.get_mut(id) else {
        return Ok(Step::Missing(id));
    };
    let min_h = widget.min_h;
    let Some(folder) = widget.folder_mut() else {
        return Err(BridgeError::NotAFolder(id));
    };
    let layouts = &mut draft.project.layouts;

    if folder.is_collapsed {
        folder.is_collapsed = false;
        for bp in Breakpoint::ALL {
            let restored = folder.expanded_h.get(&bp).copied().unwrap_or(min_h);
            let items = layouts.get_mut(bp);
            match items.iter_mut().find(|i| i.id == id) {
                Some(item) => item.h = restored,
                None => continue,
            }
            push_down(items, id);
        }
    } else {
        folder.is_collapsed = true;
        for bp in Breakpoint::ALL {
            if let Some(item) = layouts.item_mut(bp, id) {
                folder.expanded_h.insert(bp, item.h);
                item.h = min_h;
            }
        }
    }
    Ok(Step::Done(None))
}

// ---------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------

/// Current (w, h) of `id` at each breakpoint of `layouts`.
fn footprints(
    layouts: &Layouts,
    id: WidgetId,
    fallback: (u32, u32),
) -> BTreeMap<Breakpoint, (u32, u32)> {
    Breakpoint::ALL
        .into_iter()
        .map(|bp| {
            let size = layouts.item(bp, id).map(|i| (i.w, i.h)).unwrap_or(fallback);
            (bp, size)
        })
        .collect()
}

/// Fold a surface report into stored layouts for one grid. Entries for ids
/// not in `known` are dropped (stale surface after a concurrent delete);
/// known ids the surface omitted keep their stored entry. Reported sizes are
/// clamped to the grid: at most `columns` wide, rows below [`MAX_SURFACE_ROWS`].
fn merge_surface(
    surface: &SurfaceLayouts,
    base: &Layouts,
    known: &FxHashSet<WidgetId>,
    nested: bool,
) -> Layouts {
    let mut merged = sanitize_layouts(surface, base);
    for bp in surface.keys().copied() {
        let columns = if nested { bp.nested_columns() } else { bp.columns() };
        let items = merged.get_mut(bp);
        let reported = items.len();
        let mut seen = FxHashSet::default();
        items.retain(|i| known.contains(&i.id) && seen.insert(i.id));
        if items.len() != reported {
            log::debug!(
                "Bridge: dropped {} stale surface entries at {bp}",
                reported - items.len()
            );
        }
        for item in items.iter_mut() {
            let w = item.w.min(columns);
            let y = item.y.min(MAX_SURFACE_ROWS);
            let h = item.h.min(MAX_SURFACE_ROWS);
            if (w, y, h) != (item.w, item.y, item.h) {
                log::debug!("Bridge: clamped out-of-grid surface entry {} at {bp}", item.id);
                (item.w, item.y, item.h) = (w, y, h);
            }
        }
        for stored in base.get(bp) {
            if known.contains(&stored.id) && !seen.contains(&stored.id) {
                items.push(stored.clone());
            }
        }
    }
    merged
}

// ===================================================================
// Tests
// ===================================================================
