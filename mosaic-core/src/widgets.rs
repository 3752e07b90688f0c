//! Widget payloads.
//!
//! Every widget type is one variant of [`WidgetData`]. The wire form is
//! internally tagged (`{"type": "note", ...}`) so the renderer side can
//! dispatch on `type` without a wrapper object.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{Breakpoint, Layouts, WidgetId};

/// Color stops offered to freshly created gradient widgets.
const PALETTE: &[&str] = &[
    "#f97316", "#facc15", "#4ade80", "#2dd4bf", "#38bdf8", "#818cf8", "#c084fc", "#f472b6",
    "#fb7185", "#a3e635",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Note,
    Checklist,
    Counter,
    Chart,
    Image,
    Link,
    Folder,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 7] = [
        WidgetKind::Note,
        WidgetKind::Checklist,
        WidgetKind::Counter,
        WidgetKind::Chart,
        WidgetKind::Image,
        WidgetKind::Link,
        WidgetKind::Folder,
    ];

    /// Minimum footprint `(w, h)` in grid cells.
    pub fn min_size(self) -> (u32, u32) {
        match self {
            WidgetKind::Note => (4, 2),
            WidgetKind::Checklist => (4, 3),
            WidgetKind::Counter => (2, 2),
            WidgetKind::Chart => (4, 3),
            WidgetKind::Image => (3, 3),
            WidgetKind::Link => (2, 1),
            WidgetKind::Folder => (4, 3),
        }
    }

    pub fn has_gradient(self) -> bool {
        matches!(self, WidgetKind::Note | WidgetKind::Counter)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gradient {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub user_customized: bool,
}

impl Gradient {
    /// Two distinct palette colors, not marked as user-chosen.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let first = rng.random_range(0..PALETTE.len());
        let mut second = rng.random_range(0..PALETTE.len() - 1);
        if second >= first {
            second += 1;
        }
        Self {
            from: PALETTE[first].to_string(),
            to: PALETTE[second].to_string(),
            user_customized: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteData {
    #[serde(default)]
    pub text: String,
    pub gradient: Gradient,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: f64,
    pub step: f64,
    pub gradient: Gradient,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
}

/// A chart series reading a numeric field of another widget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub widget_id: WidgetId,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: ChartKind,
    #[serde(default)]
    pub sources: Vec<DataSource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkData {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Unfurled page metadata, shape owned by the unfurl service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layouts: Option<Layouts>,
    /// Row-span to restore on expand, per breakpoint.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expanded_h: BTreeMap<Breakpoint, u32>,
}

impl FolderData {
    pub fn nested(&self) -> Option<&Layouts> {
        self.layouts.as_ref()
    }

    pub fn nested_mut(&mut self) -> &mut Layouts {
        self.layouts.get_or_insert_with(Layouts::default)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WidgetData {
    Note(NoteData),
    Checklist(ChecklistData),
    Counter(CounterData),
    Chart(ChartData),
    Image(ImageData),
    Link(LinkData),
    Folder(FolderData),
}

impl WidgetData {
    pub fn kind(&self) -> WidgetKind {
        match self {
            WidgetData::Note(_) => WidgetKind::Note,
            WidgetData::Checklist(_) => WidgetKind::Checklist,
            WidgetData::Counter(_) => WidgetKind::Counter,
            WidgetData::Chart(_) => WidgetKind::Chart,
            WidgetData::Image(_) => WidgetKind::Image,
            WidgetData::Link(_) => WidgetKind::Link,
            WidgetData::Folder(_) => WidgetKind::Folder,
        }
    }

    /// Default payload for a newly added widget of `kind`.
    pub fn default_for<R: Rng + ?Sized>(kind: WidgetKind, rng: &mut R) -> Self {
        match kind {
            WidgetKind::Note => WidgetData::Note(NoteData {
                text: String::new(),
                gradient: Gradient::random(rng),
            }),
            WidgetKind::Checklist => WidgetData::Checklist(ChecklistData {
                title: "Checklist".to_string(),
                items: Vec::new(),
            }),
            WidgetKind::Counter => WidgetData::Counter(CounterData {
                label: "Counter".to_string(),
                value: 0.0,
                step: 1.0,
                gradient: Gradient::random(rng),
            }),
            WidgetKind::Chart => WidgetData::Chart(ChartData {
                title: "Chart".to_string(),
                kind: ChartKind::Bar,
                sources: Vec::new(),
            }),
            WidgetKind::Image => WidgetData::Image(ImageData {
                url: String::new(),
                caption: None,
            }),
            WidgetKind::Link => WidgetData::Link(LinkData {
                url: String::new(),
                title: None,
                preview: None,
            }),
            WidgetKind::Folder => WidgetData::Folder(FolderData {
                title: "Folder".to_string(),
                ..FolderData::default()
            }),
        }
    }

    /// Numeric fields other widgets may chart.
    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        match (self, field) {
            (WidgetData::Counter(c), "value") => Some(c.value),
            (WidgetData::Counter(c), "step") => Some(c.step),
            (WidgetData::Checklist(c), "done") => {
                Some(c.items.iter().filter(|item| item.done).count() as f64)
            }
            (WidgetData::Checklist(c), "total") => Some(c.items.len() as f64),
            _ => None,
        }
    }

    /// Ids of the widgets this payload reads from.
    pub fn dependencies(&self) -> Vec<WidgetId> {
        match self {
            WidgetData::Chart(chart) => chart.sources.iter().map(|s| s.widget_id).collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrite dependency ids found in `remap`; others are left alone.
    pub fn remap_dependencies(&mut self, remap: &FxHashMap<WidgetId, WidgetId>) {
        if let WidgetData::Chart(chart) = self {
            for source in &mut chart.sources {
                if let Some(&new_id) = remap.get(&source.widget_id) {
                    source.widget_id = new_id;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gradient_colors_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let g = Gradient::random(&mut rng);
            assert_ne!(g.from, g.to);
            assert!(!g.user_customized);
        }
    }

    #[test]
    fn test_default_payload_matches_kind() {
        let mut rng = StdRng::seed_from_u64(1);
        for kind in WidgetKind::ALL {
            let data = WidgetData::default_for(kind, &mut rng);
            assert_eq!(data.kind(), kind);
        }
    }

    #[test]
    fn test_internal_tag_on_wire() {
        let mut rng = StdRng::seed_from_u64(3);
        let data = WidgetData::default_for(WidgetKind::Counter, &mut rng);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "counter");
        assert_eq!(json["step"], 1.0);
        let back: WidgetData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_numeric_fields() {
        let checklist = WidgetData::Checklist(ChecklistData {
            title: "Todo".into(),
            items: vec![
                ChecklistItem { id: Uuid::new_v4(), text: "a".into(), done: true },
                ChecklistItem { id: Uuid::new_v4(), text: "b".into(), done: false },
            ],
        });
        assert_eq!(checklist.numeric_field("done"), Some(1.0));
        assert_eq!(checklist.numeric_field("total"), Some(2.0));
        assert_eq!(checklist.numeric_field("value"), None);
    }

    #[test]
    fn test_remap_only_known_dependencies() {
        let inside = Uuid::new_v4();
        let outside = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let mut chart = WidgetData::Chart(ChartData {
            title: String::new(),
            kind: ChartKind::Line,
            sources: vec![
                DataSource { widget_id: inside, field: "value".into(), label: None },
                DataSource { widget_id: outside, field: "value".into(), label: None },
            ],
        });

        let mut remap = FxHashMap::default();
        remap.insert(inside, fresh);
        chart.remap_dependencies(&remap);

        assert_eq!(chart.dependencies(), vec![fresh, outside]);
    }
}
