use crate::core::{bounds::Bounds, geo::Point};
use crate::layers::feature::Feature;
use crate::traits::ViewportAware;
use crate::ui::popup::PopupRequest;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Points,
    Lines,
    Heatmap,
    Donuts,
    Icons,
    Text,
    HeatmapDeck,
    Screengrid,
}

impl LayerKind {
    pub const ALL: [LayerKind; 8] = [
        Self::Points,
        Self::Lines,
        Self::Heatmap,
        Self::Donuts,
        Self::Icons,
        Self::Text,
        Self::HeatmapDeck,
        Self::Screengrid,
    ];

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| MapError::unknown_layer_kind(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Lines => "lines",
            Self::Heatmap => "heatmap",
            Self::Donuts => "donuts",
            Self::Icons => "icons",
            Self::Text => "text",
            Self::HeatmapDeck => "heatmap_deck",
            Self::Screengrid => "screengrid",
        }
    }

    /// Kinds whose positions go straight to the GPU aggregation renderer
    pub fn is_aggregation(&self) -> bool {
        matches!(self, Self::HeatmapDeck | Self::Screengrid)
    }

    /// Stacking order: text above the base layers, donuts above text
    pub fn default_z_index(&self) -> i32 {
        match self {
            Self::Text => 5,
            Self::Donuts => 6,
            _ => 0,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide unique layer identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(String);

impl LayerId {
    /// Fresh id scoped by the dataset the layer draws
    pub fn generate(dataset_id: &str) -> Self {
        let seq = NEXT_LAYER_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("lifemap-layer-{dataset_id}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerProperties {
    pub id: LayerId,
    pub kind: LayerKind,
    pub dataset_id: String,
    pub z_index: i32,
    pub opacity: f32,
    pub visible: bool,
    /// Whether pointer events are routed to this layer
    pub interactive: bool,
    /// Whether hovered features get highlighted
    pub hover: bool,
}

impl LayerProperties {
    pub fn new(kind: LayerKind, dataset_id: &str) -> Self {
        Self {
            id: LayerId::generate(dataset_id),
            kind,
            dataset_id: dataset_id.to_string(),
            z_index: kind.default_z_index(),
            opacity: 1.0,
            visible: true,
            interactive: false,
            hover: false,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = (opacity as f32).clamp(0.0, 1.0);
        self
    }
}

/// Common behaviour of every rendered layer
pub trait LayerTrait: ViewportAware + Send + Sync {
    fn properties(&self) -> &LayerProperties;

    fn properties_mut(&mut self) -> &mut LayerProperties;

    fn id(&self) -> &LayerId {
        &self.properties().id
    }

    fn kind(&self) -> LayerKind {
        self.properties().kind
    }

    fn z_index(&self) -> i32 {
        self.properties().z_index
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.properties_mut().z_index = z_index;
    }

    fn opacity(&self) -> f32 {
        self.properties().opacity
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.properties_mut().opacity = opacity.clamp(0.0, 1.0);
    }

    fn is_visible(&self) -> bool {
        self.properties().visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.properties_mut().visible = visible;
    }

    fn is_interactive(&self) -> bool {
        self.properties().interactive
    }

    fn highlights_hover(&self) -> bool {
        self.properties().hover
    }

    /// Currently materialized features
    fn features(&self) -> &[Feature];

    /// Extent of the layer's whole dataset, culled or not
    fn extent(&self) -> Bounds;

    /// Index of the closest feature within `tolerance` of `point`
    fn hit_test(&self, point: &Point, tolerance: f64) -> Option<usize> {
        self.features()
            .iter()
            .enumerate()
            .map(|(i, f)| (i, f.geometry.distance_to(point)))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Sets or clears the hover flag of a feature; false when no such feature
    fn set_hover(&mut self, _feature: usize, _hovered: bool) -> bool {
        false
    }

    fn has_popup(&self) -> bool {
        false
    }

    /// Popup content request for a hit feature, if the layer has popups
    fn popup_request(&self, _feature: usize) -> Option<PopupRequest> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_kind_names() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert_eq!(LayerKind::HeatmapDeck.to_string(), "heatmap_deck");
        assert!(matches!(LayerKind::parse("choropleth"), Err(MapError::Configuration(_))));
    }

    #[test]
    fn test_layer_ids_unique() {
        let a = LayerId::generate("d");
        let b = LayerId::generate("d");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("lifemap-layer-d-"));
    }

    #[test]
    fn test_properties_defaults() {
        let props = LayerProperties::new(LayerKind::Donuts, "d").with_opacity(1.7);
        assert_eq!(props.z_index, 6);
        assert_eq!(props.opacity, 1.0);
        assert!(props.visible);
        assert!(!props.interactive);
        assert_eq!(LayerProperties::new(LayerKind::Text, "d").z_index, 5);
        assert_eq!(LayerProperties::new(LayerKind::Points, "d").z_index, 0);
    }
}
