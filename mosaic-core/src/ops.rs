use serde::{Deserialize, Serialize};

use crate::{SurfaceLayouts, UserId, WidgetData, WidgetId, WidgetKind};

/// Tri-state assignee update carried by [`EditOp::UpdateData`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignUpdate {
    #[default]
    Unchanged,
    Unassign,
    Assign(UserId),
}

impl AssignUpdate {
    /// `None` = unchanged, `Some(None)` = unassign, `Some(Some(uid))` = assign.
    pub fn from_option(value: Option<Option<UserId>>) -> Self {
        match value {
            None => AssignUpdate::Unchanged,
            Some(None) => AssignUpdate::Unassign,
            Some(Some(uid)) => AssignUpdate::Assign(uid),
        }
    }
}

/// Which grid a layout change came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutScope {
    TopLevel,
    Folder(WidgetId),
}

/// A user intent against the widget tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EditOp {
    AddWidget {
        kind: WidgetKind,
        parent_id: Option<WidgetId>,
    },
    RemoveWidget {
        id: WidgetId,
    },
    CopyWidget {
        id: WidgetId,
    },
    UpdateData {
        id: WidgetId,
        data: WidgetData,
        assigned_user: AssignUpdate,
    },
    ToggleFolder {
        id: WidgetId,
    },
    /// Drag-stop / resize-stop result from the grid surface.
    LayoutChange {
        scope: LayoutScope,
        layouts: SurfaceLayouts,
    },
}

impl EditOp {
    /// Structural ops snapshot the project for undo; payload edits do not.
    pub fn pushes_history(&self) -> bool {
        !matches!(self, EditOp::UpdateData { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            EditOp::AddWidget { .. } => "add",
            EditOp::RemoveWidget { .. } => "remove",
            EditOp::CopyWidget { .. } => "copy",
            EditOp::UpdateData { .. } => "update-data",
            EditOp::ToggleFolder { .. } => "toggle-folder",
            EditOp::LayoutChange { .. } => "layout-change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_assign_update_tri_state() {
        assert_eq!(AssignUpdate::from_option(None), AssignUpdate::Unchanged);
        assert_eq!(AssignUpdate::from_option(Some(None)), AssignUpdate::Unassign);
        assert_eq!(
            AssignUpdate::from_option(Some(Some("bob".into()))),
            AssignUpdate::Assign("bob".into())
        );
    }

    #[test]
    fn test_history_classification() {
        let id = Uuid::new_v4();
        assert!(EditOp::RemoveWidget { id }.pushes_history());
        assert!(EditOp::ToggleFolder { id }.pushes_history());
        assert!(EditOp::LayoutChange {
            scope: LayoutScope::TopLevel,
            layouts: SurfaceLayouts::new(),
        }
        .pushes_history());

        let update = EditOp::UpdateData {
            id,
            data: WidgetData::Image(crate::ImageData { url: "x".into(), caption: None }),
            assigned_user: AssignUpdate::Unchanged,
        };
        assert!(!update.pushes_history());
    }
}
