use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub mod invariants;
pub mod ops;
pub mod sanitize;
pub mod tree;
pub mod widgets;

pub use invariants::Violation;
pub use ops::{AssignUpdate, EditOp, LayoutScope};
pub use sanitize::{sanitize, sanitize_layouts, SanitizeError, SurfaceItem, SurfaceLayouts};
pub use tree::WidgetTree;
pub use widgets::{
    ChartData, ChartKind, ChecklistData, ChecklistItem, CounterData, DataSource, FolderData,
    Gradient, ImageData, LinkData, NoteData, WidgetData, WidgetKind,
};

pub type ProjectId = Uuid;
pub type WidgetId = Uuid;
pub type UserId = String;

/// Viewport tier. Each tier carries its own independent layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Lg,
    Md,
    Sm,
    Xs,
    Xxs,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 5] = [
        Breakpoint::Lg,
        Breakpoint::Md,
        Breakpoint::Sm,
        Breakpoint::Xs,
        Breakpoint::Xxs,
    ];

    /// Column count of the top-level dashboard grid.
    pub fn columns(self) -> u32 {
        match self {
            Breakpoint::Lg => 12,
            Breakpoint::Md => 10,
            Breakpoint::Sm => 6,
            Breakpoint::Xs => 2,
            Breakpoint::Xxs => 1,
        }
    }

    /// Column count of a folder's nested grid.
    pub fn nested_columns(self) -> u32 {
        match self {
            Breakpoint::Lg => 24,
            Breakpoint::Md => 20,
            Breakpoint::Sm => 12,
            Breakpoint::Xs => 4,
            Breakpoint::Xxs => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Breakpoint::Lg => "lg",
            Breakpoint::Md => "md",
            Breakpoint::Sm => "sm",
            Breakpoint::Xs => "xs",
            Breakpoint::Xxs => "xxs",
        }
    }
}

impl std::fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cell rectangle on a grid, half-open on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl GridRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Both intervals must intersect with nonzero length.
    #[inline]
    pub fn overlaps(&self, other: &GridRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Persisted placement of one widget at one breakpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    #[serde(rename = "i")]
    pub id: WidgetId,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_h: Option<u32>,
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub is_static: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_draggable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_resizable: Option<bool>,
}

impl LayoutItem {
    pub fn new(id: WidgetId, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            id,
            x,
            y,
            w,
            h,
            min_w: None,
            max_w: None,
            min_h: None,
            max_h: None,
            is_static: None,
            is_draggable: None,
            is_resizable: None,
        }
    }

    pub fn with_min(mut self, min_w: u32, min_h: u32) -> Self {
        self.min_w = Some(min_w);
        self.min_h = Some(min_h);
        self
    }

    #[inline]
    pub fn rect(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.w, self.h)
    }

    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }
}

/// One layout list per breakpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layouts {
    #[serde(default)]
    pub lg: Vec<LayoutItem>,
    #[serde(default)]
    pub md: Vec<LayoutItem>,
    #[serde(default)]
    pub sm: Vec<LayoutItem>,
    #[serde(default)]
    pub xs: Vec<LayoutItem>,
    #[serde(default)]
    pub xxs: Vec<LayoutItem>,
}

impl Layouts {
    pub fn get(&self, bp: Breakpoint) -> &[LayoutItem] {
        match bp {
            Breakpoint::Lg => &self.lg,
            Breakpoint::Md => &self.md,
            Breakpoint::Sm => &self.sm,
            Breakpoint::Xs => &self.xs,
            Breakpoint::Xxs => &self.xxs,
        }
    }

    pub fn get_mut(&mut self, bp: Breakpoint) -> &mut Vec<LayoutItem> {
        match bp {
            Breakpoint::Lg => &mut self.lg,
            Breakpoint::Md => &mut self.md,
            Breakpoint::Sm => &mut self.sm,
            Breakpoint::Xs => &mut self.xs,
            Breakpoint::Xxs => &mut self.xxs,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Breakpoint, &[LayoutItem])> + '_ {
        Breakpoint::ALL.into_iter().map(move |bp| (bp, self.get(bp)))
    }

    pub fn item(&self, bp: Breakpoint, id: WidgetId) -> Option<&LayoutItem> {
        self.get(bp).iter().find(|item| item.id == id)
    }

    pub fn item_mut(&mut self, bp: Breakpoint, id: WidgetId) -> Option<&mut LayoutItem> {
        self.get_mut(bp).iter_mut().find(|item| item.id == id)
    }

    /// Keep only entries whose id satisfies `keep`, at every breakpoint.
    pub fn retain_ids(&mut self, mut keep: impl FnMut(WidgetId) -> bool) {
        for bp in Breakpoint::ALL {
            self.get_mut(bp).retain(|item| keep(item.id));
        }
    }

    pub fn is_empty(&self) -> bool {
        Breakpoint::ALL.iter().all(|bp| self.get(*bp).is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn can_edit(self) -> bool {
        !matches!(self, Role::Viewer)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub owner_id: UserId,
    #[serde(default)]
    pub members: BTreeMap<UserId, Role>,
    #[serde(default)]
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub is_team: bool,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub layouts: Layouts,
}

impl Project {
    /// Empty project owned (and joined) by `owner`.
    pub fn new(owner: impl Into<UserId>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        let mut members = BTreeMap::new();
        members.insert(owner.clone(), Role::Owner);
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            emoji: None,
            owner_id: owner.clone(),
            members,
            participants: vec![owner],
            is_team: false,
            widgets: Vec::new(),
            layouts: Layouts::default(),
        }
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn role_of(&self, user: &str) -> Option<Role> {
        if self.owner_id == user {
            return Some(Role::Owner);
        }
        self.members.get(user).copied()
    }

    pub fn tree(&self) -> WidgetTree {
        WidgetTree::from_widgets(self.widgets.iter().cloned())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    pub data: WidgetData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<WidgetId>,
    pub min_w: u32,
    pub min_h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<UserId>,
}

impl Widget {
    /// Fresh widget with the type's default payload and footprint.
    pub fn new<R: rand::Rng + ?Sized>(
        kind: WidgetKind,
        parent_id: Option<WidgetId>,
        rng: &mut R,
    ) -> Self {
        let (min_w, min_h) = kind.min_size();
        Self {
            id: Uuid::new_v4(),
            data: WidgetData::default_for(kind, rng),
            parent_id,
            min_w,
            min_h,
            assigned_user: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> WidgetKind {
        self.data.kind()
    }

    #[inline]
    pub fn is_folder(&self) -> bool {
        matches!(self.data, WidgetData::Folder(_))
    }

    pub fn folder(&self) -> Option<&FolderData> {
        match &self.data {
            WidgetData::Folder(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn folder_mut(&mut self) -> Option<&mut FolderData> {
        match &mut self.data {
            WidgetData::Folder(folder) => Some(folder),
            _ => None,
        }
    }
}

/// Who is acting, on which project, with what rights.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub active_project_id: Option<ProjectId>,
    pub current_user_id: UserId,
    pub role: Role,
}

impl Session {
    pub fn new(user: impl Into<UserId>, project: Option<ProjectId>, role: Role) -> Self {
        Self {
            active_project_id: project,
            current_user_id: user.into(),
            role,
        }
    }

    /// Session for `user` on `project`. `None` if the user holds no role there.
    pub fn for_project(user: impl Into<UserId>, project: &Project) -> Option<Self> {
        let user = user.into();
        let role = project.role_of(&user)?;
        Some(Self::new(user, Some(project.id), role))
    }

    pub fn can_edit(&self) -> bool {
        self.role.can_edit()
    }
}
