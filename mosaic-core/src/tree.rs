//! Id-keyed widget arena with an explicit parent → children index.
//!
//! The index is updated by every mutation here, so lookups never re-scan
//! the widget list. Insertion order is preserved and is the order widgets
//! are written back to the project.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::{Widget, WidgetId};

#[derive(Clone, Debug, Default)]
pub struct WidgetTree {
    widgets: IndexMap<WidgetId, Widget>,
    children: FxHashMap<WidgetId, Vec<WidgetId>>,
}

impl WidgetTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_widgets(widgets: impl IntoIterator<Item = Widget>) -> Self {
        let mut tree = Self::new();
        for widget in widgets {
            tree.insert(widget);
        }
        tree
    }

    /// Insert or replace a widget, keeping the child index in step.
    pub fn insert(&mut self, widget: Widget) {
        let id = widget.id;
        let new_parent = widget.parent_id;
        if let Some(old) = self.widgets.insert(id, widget) {
            if old.parent_id != new_parent {
                self.unlink(id, old.parent_id);
                self.link(id, new_parent);
            }
        } else {
            self.link(id, new_parent);
        }
    }

    fn link(&mut self, id: WidgetId, parent: Option<WidgetId>) {
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().push(id);
        }
    }

    fn unlink(&mut self, id: WidgetId, parent: Option<WidgetId>) {
        if let Some(parent) = parent {
            if let Some(ids) = self.children.get_mut(&parent) {
                ids.retain(|&child| child != id);
                if ids.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
    }

    /// Remove a single widget. Its children, if any, are left dangling.
    pub fn remove(&mut self, id: WidgetId) -> Option<Widget> {
        let widget = self.widgets.shift_remove(&id)?;
        self.unlink(id, widget.parent_id);
        Some(widget)
    }

    /// Remove a widget and all of its descendants. Returns them parent first.
    pub fn remove_subtree(&mut self, id: WidgetId) -> Vec<Widget> {
        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        let removed: Vec<Widget> = ids.into_iter().filter_map(|id| self.remove(id)).collect();
        for widget in &removed {
            self.children.remove(&widget.id);
        }
        removed
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(&id)
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.contains_key(&id)
    }

    pub fn is_folder(&self, id: WidgetId) -> bool {
        self.get(id).is_some_and(Widget::is_folder)
    }

    pub fn children_of(&self, id: WidgetId) -> &[WidgetId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All widgets below `id`, depth first.
    pub fn descendants(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for &child in self.children_of(current) {
                out.push(child);
                frontier.push(child);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.values()
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.values().filter(|w| w.parent_id.is_none())
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn into_widgets(self) -> Vec<Widget> {
        self.widgets.into_values().collect()
    }
}
