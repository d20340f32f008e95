//! Declarative layer definitions.
//!
//! A definition arrives as `{ "layer": <kind>, "options": { "id": <dataset>, ... } }`.
//! Each kind accepts a closed set of option keys; anything else is rejected at
//! parse time so a typo never silently falls back to a default.

use crate::layers::base::LayerKind;
use crate::{MapError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A styling option that is either a literal or the name of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Number(f64),
    Text(String),
}

impl StyleValue {
    /// The column this value names, if it is one of `columns`
    pub fn column<'a>(&'a self, has_column: impl Fn(&str) -> bool) -> Option<&'a str> {
        match self {
            Self::Text(s) if has_column(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    Solid,
    Dotted,
    Smalldash,
    Dashed,
}

impl LineType {
    pub fn dash_pattern(&self) -> &'static [f64] {
        match self {
            Self::Solid => &[0.0],
            Self::Dotted => &[3.0, 3.0, 3.0, 3.0],
            Self::Smalldash => &[10.0, 10.0, 10.0, 10.0],
            Self::Dashed => &[25.0, 10.0, 25.0, 10.0],
        }
    }

    pub fn round_cap(&self) -> bool {
        matches!(self, Self::Solid)
    }
}

/// Fixed donut size, or a `[min, max]` range driven by the row totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DonutRadius {
    Fixed(f64),
    Range([f64; 2]),
}

impl Default for DonutRadius {
    fn default() -> Self {
        Self::Fixed(50.0)
    }
}

impl DonutRadius {
    pub fn smallest(&self) -> f64 {
        match self {
            Self::Fixed(r) => *r,
            Self::Range([lo, _]) => *lo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PointsOptions {
    pub id: String,
    pub radius: Option<StyleValue>,
    pub radius_range: [f64; 2],
    pub fill: Option<StyleValue>,
    pub fill_cat: Option<bool>,
    pub categories: Option<Vec<String>>,
    pub label: Option<String>,
    pub scheme: Option<String>,
    pub opacity: f64,
    pub popup: bool,
    pub popup_col: Option<String>,
    pub hover: bool,
    pub lazy: bool,
    pub lazy_zoom: f64,
    pub lazy_margin: Option<f64>,
}

impl Default for PointsOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            radius: None,
            radius_range: [1.0, 20.0],
            fill: None,
            fill_cat: None,
            categories: None,
            label: None,
            scheme: None,
            opacity: 0.8,
            popup: false,
            popup_col: None,
            hover: false,
            lazy: false,
            lazy_zoom: 15.0,
            lazy_margin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinesOptions {
    pub id: String,
    pub width: Option<StyleValue>,
    pub width_range: [f64; 2],
    pub color: Option<StyleValue>,
    pub color_cat: Option<bool>,
    pub label: Option<String>,
    pub scheme: Option<String>,
    pub opacity: f64,
    pub linetype: LineType,
    pub popup: bool,
    pub popup_col: Option<String>,
    pub hover: bool,
    pub lazy: bool,
    pub lazy_zoom: f64,
    pub lazy_margin: Option<f64>,
}

impl Default for LinesOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            width: None,
            width_range: [1.0, 20.0],
            color: None,
            color_cat: None,
            label: None,
            scheme: None,
            opacity: 0.8,
            linetype: LineType::Solid,
            popup: false,
            popup_col: None,
            hover: false,
            lazy: false,
            lazy_zoom: 15.0,
            lazy_margin: None,
        }
    }
}

pub const DEFAULT_HEATMAP_GRADIENT: [&str; 8] = [
    "#4675ed", "#39a2fc", "#1bcfd4", "#24eca6", "#61fc6c", "#a4fc3b", "#d1e834", "#f3363a",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeatmapOptions {
    pub id: String,
    pub radius: f64,
    pub blur: f64,
    pub opacity: f64,
    pub gradient: Vec<String>,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            radius: 5.0,
            blur: 5.0,
            opacity: 1.0,
            gradient: DEFAULT_HEATMAP_GRADIENT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DonutsOptions {
    pub id: String,
    pub counts_col: Option<String>,
    pub show_totals: bool,
    pub categories: Option<Vec<String>>,
    pub scheme: Option<String>,
    pub label: Option<String>,
    pub radius: DonutRadius,
    pub opacity: f64,
    pub popup: bool,
    pub popup_col: Option<String>,
    pub declutter: bool,
    pub lazy: bool,
    pub lazy_zoom: f64,
    pub lazy_margin: Option<f64>,
}

impl Default for DonutsOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            counts_col: None,
            show_totals: false,
            categories: None,
            scheme: None,
            label: None,
            radius: DonutRadius::default(),
            opacity: 0.9,
            popup: true,
            popup_col: None,
            declutter: true,
            lazy: true,
            lazy_zoom: 4.0,
            lazy_margin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IconsOptions {
    pub id: String,
    pub icon: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub scale: Option<f64>,
    pub color: Option<String>,
    pub x_offset: f64,
    pub y_offset: f64,
    pub x_anchor: f64,
    pub y_anchor: f64,
    pub opacity: f64,
    pub popup: bool,
    pub popup_col: Option<String>,
    pub declutter: bool,
    pub lazy: bool,
    pub lazy_zoom: f64,
    pub lazy_margin: Option<f64>,
}

impl Default for IconsOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            icon: None,
            width: None,
            height: None,
            scale: None,
            color: None,
            x_offset: 0.0,
            y_offset: 0.0,
            x_anchor: 0.5,
            y_anchor: 0.5,
            opacity: 1.0,
            popup: false,
            popup_col: None,
            declutter: true,
            lazy: false,
            lazy_zoom: 10.0,
            lazy_margin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextOptions {
    pub id: String,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: f64,
    pub color: Option<String>,
    pub stroke: Option<String>,
    pub opacity: f64,
    pub declutter: bool,
    pub lazy: bool,
    pub lazy_zoom: f64,
    pub lazy_margin: Option<f64>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            text: None,
            font_family: None,
            font_size: 12.0,
            color: None,
            stroke: None,
            opacity: 1.0,
            declutter: true,
            lazy: true,
            lazy_zoom: 15.0,
            lazy_margin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeatmapDeckOptions {
    pub id: String,
    pub radius: f64,
    pub intensity: f64,
    pub threshold: f64,
    pub opacity: f64,
    pub color_range: Option<Vec<String>>,
}

impl Default for HeatmapDeckOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            radius: 30.0,
            intensity: 5.0,
            threshold: 0.05,
            opacity: 0.5,
            color_range: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreengridOptions {
    pub id: String,
    pub cell_size: f64,
    pub opacity: f64,
    pub extruded: bool,
}

impl Default for ScreengridOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            cell_size: 30.0,
            opacity: 0.5,
            extruded: false,
        }
    }
}

/// Option set of one layer, one variant per kind
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOptions {
    Points(PointsOptions),
    Lines(LinesOptions),
    Heatmap(HeatmapOptions),
    Donuts(DonutsOptions),
    Icons(IconsOptions),
    Text(TextOptions),
    HeatmapDeck(HeatmapDeckOptions),
    Screengrid(ScreengridOptions),
}

/// Lazy loading parameters of a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LazySettings {
    pub zoom_slack: f64,
    /// Margin fraction override; the engine default applies when `None`
    pub margin: Option<f64>,
}

impl LayerOptions {
    fn from_value(kind: LayerKind, options: Value) -> Result<Self> {
        fn parse<T: DeserializeOwned>(kind: LayerKind, options: Value) -> Result<T> {
            serde_json::from_value(options)
                .map_err(|e| MapError::Configuration(format!("invalid options for {kind} layer: {e}")))
        }

        Ok(match kind {
            LayerKind::Points => Self::Points(parse(kind, options)?),
            LayerKind::Lines => Self::Lines(parse(kind, options)?),
            LayerKind::Heatmap => Self::Heatmap(parse(kind, options)?),
            LayerKind::Donuts => Self::Donuts(parse(kind, options)?),
            LayerKind::Icons => Self::Icons(parse(kind, options)?),
            LayerKind::Text => Self::Text(parse(kind, options)?),
            LayerKind::HeatmapDeck => Self::HeatmapDeck(parse(kind, options)?),
            LayerKind::Screengrid => Self::Screengrid(parse(kind, options)?),
        })
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Points(_) => LayerKind::Points,
            Self::Lines(_) => LayerKind::Lines,
            Self::Heatmap(_) => LayerKind::Heatmap,
            Self::Donuts(_) => LayerKind::Donuts,
            Self::Icons(_) => LayerKind::Icons,
            Self::Text(_) => LayerKind::Text,
            Self::HeatmapDeck(_) => LayerKind::HeatmapDeck,
            Self::Screengrid(_) => LayerKind::Screengrid,
        }
    }

    pub fn dataset_id(&self) -> &str {
        match self {
            Self::Points(o) => &o.id,
            Self::Lines(o) => &o.id,
            Self::Heatmap(o) => &o.id,
            Self::Donuts(o) => &o.id,
            Self::Icons(o) => &o.id,
            Self::Text(o) => &o.id,
            Self::HeatmapDeck(o) => &o.id,
            Self::Screengrid(o) => &o.id,
        }
    }

    pub fn opacity(&self) -> f64 {
        match self {
            Self::Points(o) => o.opacity,
            Self::Lines(o) => o.opacity,
            Self::Heatmap(o) => o.opacity,
            Self::Donuts(o) => o.opacity,
            Self::Icons(o) => o.opacity,
            Self::Text(o) => o.opacity,
            Self::HeatmapDeck(o) => o.opacity,
            Self::Screengrid(o) => o.opacity,
        }
    }

    pub fn popup(&self) -> bool {
        match self {
            Self::Points(o) => o.popup,
            Self::Lines(o) => o.popup,
            Self::Donuts(o) => o.popup,
            Self::Icons(o) => o.popup,
            _ => false,
        }
    }

    pub fn popup_col(&self) -> Option<&str> {
        match self {
            Self::Points(o) => o.popup_col.as_deref(),
            Self::Lines(o) => o.popup_col.as_deref(),
            Self::Donuts(o) => o.popup_col.as_deref(),
            Self::Icons(o) => o.popup_col.as_deref(),
            _ => None,
        }
    }

    pub fn hover(&self) -> bool {
        match self {
            Self::Points(o) => o.hover,
            Self::Lines(o) => o.hover,
            _ => false,
        }
    }

    /// Lazy loading settings, `None` when the layer materializes everything
    pub fn lazy(&self) -> Option<LazySettings> {
        let (lazy, zoom_slack, margin) = match self {
            Self::Points(o) => (o.lazy, o.lazy_zoom, o.lazy_margin),
            Self::Lines(o) => (o.lazy, o.lazy_zoom, o.lazy_margin),
            Self::Donuts(o) => (o.lazy, o.lazy_zoom, o.lazy_margin),
            Self::Icons(o) => (o.lazy, o.lazy_zoom, o.lazy_margin),
            Self::Text(o) => (o.lazy, o.lazy_zoom, o.lazy_margin),
            _ => return None,
        };
        lazy.then_some(LazySettings { zoom_slack, margin })
    }
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    layer: String,
    #[serde(default)]
    options: Value,
}

/// One declarative layer: its kind, the dataset it draws, and its options
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    pub kind: LayerKind,
    pub dataset_id: String,
    pub options: LayerOptions,
}

impl LayerDefinition {
    pub fn new(options: LayerOptions) -> Self {
        Self {
            kind: options.kind(),
            dataset_id: options.dataset_id().to_string(),
            options,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawDefinition = serde_json::from_value(value.clone())
            .map_err(|e| MapError::Configuration(format!("invalid layer definition: {e}")))?;
        let kind = LayerKind::parse(&raw.layer)?;
        let options = match raw.options {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let options = LayerOptions::from_value(kind, options)?;
        if options.dataset_id().is_empty() {
            return Err(MapError::Configuration(format!(
                "{kind} layer has no dataset id"
            )));
        }
        Ok(Self::new(options))
    }

    /// Parses one definition or an array of them. Each entry succeeds or fails
    /// on its own.
    pub fn parse(value: &Value) -> Vec<Result<Self>> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            single => vec![Self::from_value(single)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_points_defaults() {
        let def = LayerDefinition::from_value(&json!({
            "layer": "points",
            "options": {"id": "d", "fill": "genus", "radius": 4}
        }))
        .unwrap();
        assert_eq!(def.kind, LayerKind::Points);
        assert_eq!(def.dataset_id, "d");
        let LayerOptions::Points(o) = &def.options else {
            panic!("expected points options");
        };
        assert_eq!(o.radius, Some(StyleValue::Number(4.0)));
        assert_eq!(o.fill, Some(StyleValue::Text("genus".into())));
        assert_eq!(o.radius_range, [1.0, 20.0]);
        assert_eq!(o.opacity, 0.8);
        assert!(def.options.lazy().is_none());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = LayerDefinition::from_value(&json!({
            "layer": "lines",
            "options": {"id": "d", "colour": "red"}
        }))
        .unwrap_err();
        assert!(matches!(err, MapError::Configuration(_)));
    }

    #[test]
    fn test_unknown_kind_and_missing_id() {
        let results = LayerDefinition::parse(&json!([
            {"layer": "points", "options": {"id": "a"}},
            {"layer": "bubbles", "options": {"id": "a"}},
            {"layer": "text", "options": {"text": "name"}},
        ]));
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
        assert_eq!(LayerDefinition::parse(&json!({"layer": "screengrid", "options": {"id": "a"}})).len(), 1);
    }

    #[test]
    fn test_lazy_settings_and_kind_defaults() {
        let def = LayerDefinition::from_value(&json!({
            "layer": "donuts",
            "options": {"id": "d", "counts_col": "c", "radius": [10, 40], "lazy_margin": 0.1}
        }))
        .unwrap();
        assert_eq!(
            def.options.lazy(),
            Some(LazySettings { zoom_slack: 4.0, margin: Some(0.1) })
        );
        assert!(def.options.popup());
        let LayerOptions::Donuts(o) = &def.options else {
            panic!("expected donut options");
        };
        assert_eq!(o.radius, DonutRadius::Range([10.0, 40.0]));
        assert_eq!(o.radius.smallest(), 10.0);

        let deck = LayerDefinition::from_value(&json!({"layer": "heatmap_deck", "options": {"id": "d"}})).unwrap();
        assert!(deck.options.lazy().is_none());
        assert!(!deck.options.popup());
        assert_eq!(deck.options.opacity(), 0.5);
    }

    #[test]
    fn test_line_dash_patterns() {
        assert_eq!(LineType::Solid.dash_pattern(), &[0.0]);
        assert!(LineType::Solid.round_cap());
        assert!(!LineType::Dashed.round_cap());
        let def = LayerDefinition::from_value(&json!({
            "layer": "lines",
            "options": {"id": "d", "linetype": "dotted", "width": "n"}
        }))
        .unwrap();
        let LayerOptions::Lines(o) = def.options else {
            panic!("expected line options");
        };
        assert_eq!(o.linetype.dash_pattern(), &[3.0, 3.0, 3.0, 3.0]);
    }
}
