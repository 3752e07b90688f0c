//! Serialization boundary between the engine and the document store.
//!
//! The store mishandles explicit nulls, so a sanitized project never carries
//! one: absent optionals are omitted and free-form payload objects have their
//! null-valued keys pruned. Sanitizing is a serde round trip through
//! `serde_json::Value`, which also drops anything that is not part of the
//! schema. The operation is idempotent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{Breakpoint, LayoutItem, Layouts, Project, WidgetId};

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("failed to serialize project: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("sanitized document does not match the project schema: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Layout item as reported by the grid surface after a drag or resize.
///
/// Carries surface bookkeeping (`moved`, `isBounded`, `resizeHandles`) that
/// is never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceItem {
    #[serde(rename = "i")]
    pub id: WidgetId,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub min_w: Option<u32>,
    #[serde(default)]
    pub max_w: Option<u32>,
    #[serde(default)]
    pub min_h: Option<u32>,
    #[serde(default)]
    pub max_h: Option<u32>,
    #[serde(rename = "static", default)]
    pub is_static: Option<bool>,
    #[serde(default)]
    pub is_draggable: Option<bool>,
    #[serde(default)]
    pub is_resizable: Option<bool>,
    #[serde(default)]
    pub moved: bool,
    #[serde(default)]
    pub is_bounded: Option<bool>,
    #[serde(default)]
    pub resize_handles: Option<Vec<String>>,
}

impl SurfaceItem {
    pub fn from_item(item: &LayoutItem) -> Self {
        Self {
            id: item.id,
            x: item.x,
            y: item.y,
            w: item.w,
            h: item.h,
            min_w: item.min_w,
            max_w: item.max_w,
            min_h: item.min_h,
            max_h: item.max_h,
            is_static: item.is_static,
            is_draggable: item.is_draggable,
            is_resizable: item.is_resizable,
            moved: false,
            is_bounded: None,
            resize_handles: None,
        }
    }
}

impl From<&SurfaceItem> for LayoutItem {
    fn from(item: &SurfaceItem) -> Self {
        LayoutItem {
            id: item.id,
            x: item.x,
            y: item.y,
            w: item.w,
            h: item.h,
            min_w: item.min_w,
            max_w: item.max_w,
            min_h: item.min_h,
            max_h: item.max_h,
            is_static: item.is_static,
            is_draggable: item.is_draggable,
            is_resizable: item.is_resizable,
        }
    }
}

/// Per-breakpoint surface layouts. The surface may report only some tiers.
pub type SurfaceLayouts = BTreeMap<Breakpoint, Vec<SurfaceItem>>;

/// Reduce surface layouts to the persisted subset. Breakpoints the surface
/// did not report keep their entries from `base`.
pub fn sanitize_layouts(surface: &SurfaceLayouts, base: &Layouts) -> Layouts {
    let mut out = base.clone();
    for (bp, items) in surface {
        *out.get_mut(*bp) = items.iter().map(LayoutItem::from).collect();
    }
    out
}

/// Surface view of stored layouts, as handed to the grid renderer.
pub fn surface_layouts(layouts: &Layouts) -> SurfaceLayouts {
    layouts
        .iter()
        .map(|(bp, items)| (bp, items.iter().map(SurfaceItem::from_item).collect()))
        .collect()
}

/// Sanitized JSON document for a project.
pub fn to_document(project: &Project) -> Result<Value, SanitizeError> {
    let mut value = serde_json::to_value(project).map_err(|e| {
        log::warn!("Sanitize: project {} does not serialize: {e}", project.id);
        SanitizeError::Serialize(e)
    })?;
    prune_nulls(&mut value);
    Ok(value)
}

/// Clean copy of `project` fit for persistence and undo snapshots.
pub fn sanitize(project: &Project) -> Result<Project, SanitizeError> {
    let value = to_document(project)?;
    serde_json::from_value(value).map_err(|e| {
        log::warn!("Sanitize: project {} does not round-trip: {e}", project.id);
        SanitizeError::Deserialize(e)
    })
}

fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                prune_nulls(v);
            }
        }
        Value::Array(items) => {
            for v in items {
                prune_nulls(v);
            }
        }
        _ => {}
    }
}
