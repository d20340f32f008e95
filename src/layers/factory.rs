//! Turns a layer definition and its dataset into a renderable layer.
//!
//! Each stylable option resolves to a constant or, when its value names a
//! column of the dataset, to a scale built by [`ScaleEngine`]. Colour scales
//! are returned alongside the layer so the legend can be reconciled.

use crate::constants::{columns, DEFAULT_COLOR};
use crate::core::config::EngineConfig;
use crate::data::dataset::Dataset;
use crate::layers::aggregation::AggregationLayer;
use crate::layers::base::{LayerProperties, LayerTrait};
use crate::layers::definition::{
    DonutRadius, DonutsOptions, IconsOptions, LayerDefinition, LayerOptions,
    LinesOptions, PointsOptions, StyleValue, TextOptions,
};
use crate::layers::feature::{
    parse_counts, ColorChannel, FeatureBuilder, GeometryKind, SizeChannel, SliceChannel,
    TextChannel,
};
use crate::layers::vector::VectorLayer;
use crate::prelude::{Arc, HashMap};
use crate::spatial::culling::ViewportCuller;
use crate::styles::color::{ColorScheme, SerializableColor, DEFAULT_CATEGORICAL_SCHEME};
use crate::styles::scale::{ColorEncoder, ColorRange, ColorScaleOptions, Domain, Scale, ScaleEngine, ScaleKind};
use crate::ui::popup::PopupTemplate;
use crate::{MapError, Result};
use log::debug;

/// Pinned scale domains, keyed by column name
pub type ColorRanges = HashMap<String, ColorRange>;

/// A freshly created layer and the colour scales it contributes to the legend
pub struct BuiltLayer {
    pub layer: Box<dyn LayerTrait>,
    pub scales: Vec<Scale>,
}

pub struct LayerFactory {
    margin_fraction: f64,
    spatial_index_threshold: usize,
    popup_offset: [f64; 2],
}

impl LayerFactory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            margin_fraction: config.lazy.margin_fraction,
            spatial_index_threshold: config.lazy.spatial_index_threshold,
            popup_offset: config.interaction.popup_offset,
        }
    }

    pub fn create_layer(
        &self,
        def: &LayerDefinition,
        dataset: Arc<Dataset>,
        color_ranges: &ColorRanges,
    ) -> Result<BuiltLayer> {
        let properties = LayerProperties::new(def.kind, dataset.id()).with_opacity(def.options.opacity());
        let built = match &def.options {
            LayerOptions::Points(o) => self.points(def, o, properties, dataset, color_ranges)?,
            LayerOptions::Lines(o) => self.lines(def, o, properties, dataset, color_ranges)?,
            LayerOptions::Donuts(o) => self.donuts(def, o, properties, dataset)?,
            LayerOptions::Icons(o) => self.icons(def, o, properties, dataset)?,
            LayerOptions::Text(o) => self.text(def, o, properties, dataset)?,
            LayerOptions::Heatmap(_) => BuiltLayer {
                layer: Box::new(VectorLayer::new(
                    properties,
                    def.options.clone(),
                    dataset.clone(),
                    FeatureBuilder::new(GeometryKind::Point),
                    self.lazy_culler(def, GeometryKind::Point, &dataset),
                )),
                scales: Vec::new(),
            },
            LayerOptions::HeatmapDeck(_) | LayerOptions::Screengrid(_) => BuiltLayer {
                layer: Box::new(AggregationLayer::new(properties, def.options.clone(), &dataset)),
                scales: Vec::new(),
            },
        };
        debug!(
            "created {} layer {} with {} scale(s)",
            def.kind,
            built.layer.id(),
            built.scales.len()
        );
        Ok(built)
    }

    /// The culler of a lazy definition; `None` for eager layers
    fn lazy_culler(&self, def: &LayerDefinition, kind: GeometryKind, dataset: &Dataset) -> Option<ViewportCuller> {
        let lazy = def.options.lazy()?;
        Some(
            ViewportCuller::new(kind, lazy.margin.unwrap_or(self.margin_fraction), lazy.zoom_slack)
                .indexed_from(dataset, self.spatial_index_threshold),
        )
    }

    /// Applies the hover and popup options shared by vector kinds
    fn finish(
        &self,
        def: &LayerDefinition,
        mut layer: VectorLayer,
        popup: Option<PopupTemplate>,
        popup_offset: [f64; 2],
    ) -> VectorLayer {
        if let Some(template) = popup {
            layer = layer.with_popup(template, popup_offset);
        }
        layer.with_hover(def.options.hover())
    }

    fn popup_template(def: &LayerDefinition, fields: Vec<(String, String)>, slice_order: Option<Vec<String>>) -> Option<PopupTemplate> {
        if !def.options.popup() {
            return None;
        }
        Some(match def.options.popup_col() {
            Some(col) => PopupTemplate::Column(col.to_string()),
            None => PopupTemplate::Taxon { fields, slice_order },
        })
    }

    fn points(
        &self,
        def: &LayerDefinition,
        o: &PointsOptions,
        properties: LayerProperties,
        dataset: Arc<Dataset>,
        color_ranges: &ColorRanges,
    ) -> Result<BuiltLayer> {
        let size = size_channel(&dataset, o.radius.as_ref(), o.radius_range, 5.0);
        let (color, scale) = color_channel(
            &dataset,
            o.fill.as_ref(),
            ColorScaleOptions {
                categorical: o.fill_cat,
                categories: o.categories.clone(),
                scheme: parse_scheme(o.scheme.as_deref())?,
                label: o.label.clone(),
            },
            color_ranges,
        )?;
        let fields = channel_fields(&size, &color, o.label.as_deref());
        let builder = FeatureBuilder::new(GeometryKind::Point)
            .with_size(size)
            .with_color(color)
            .attach_rows(o.popup);
        let culler = self.lazy_culler(def, GeometryKind::Point, &dataset);
        let layer = VectorLayer::new(properties, def.options.clone(), dataset, builder, culler);
        let popup = Self::popup_template(def, fields, None);
        Ok(BuiltLayer {
            layer: Box::new(self.finish(def, layer, popup, self.popup_offset)),
            scales: scale.into_iter().collect(),
        })
    }

    fn lines(
        &self,
        def: &LayerDefinition,
        o: &LinesOptions,
        properties: LayerProperties,
        dataset: Arc<Dataset>,
        color_ranges: &ColorRanges,
    ) -> Result<BuiltLayer> {
        let size = size_channel(&dataset, o.width.as_ref(), o.width_range, 3.0);
        let (color, scale) = color_channel(
            &dataset,
            o.color.as_ref(),
            ColorScaleOptions {
                categorical: o.color_cat,
                categories: None,
                scheme: parse_scheme(o.scheme.as_deref())?,
                label: o.label.clone(),
            },
            color_ranges,
        )?;
        let fields = channel_fields(&size, &color, o.label.as_deref());
        let builder = FeatureBuilder::new(GeometryKind::Segment)
            .with_size(size)
            .with_color(color)
            .attach_rows(o.popup);
        let culler = self.lazy_culler(def, GeometryKind::Segment, &dataset);
        let layer = VectorLayer::new(properties, def.options.clone(), dataset, builder, culler);
        let popup = Self::popup_template(def, fields, None);
        Ok(BuiltLayer {
            layer: Box::new(self.finish(def, layer, popup, self.popup_offset)),
            scales: scale.into_iter().collect(),
        })
    }

    fn donuts(
        &self,
        def: &LayerDefinition,
        o: &DonutsOptions,
        properties: LayerProperties,
        dataset: Arc<Dataset>,
    ) -> Result<BuiltLayer> {
        let counts_col = o
            .counts_col
            .clone()
            .ok_or_else(|| MapError::Configuration("donuts layer requires counts_col".to_string()))?;
        if !dataset.is_empty() && !dataset.has_column(&counts_col) {
            return Err(MapError::Configuration(format!(
                "donuts counts column '{counts_col}' not found in dataset '{}'",
                dataset.id()
            )));
        }

        // Category order comes from the first row unless given explicitly
        let domain = match &o.categories {
            Some(categories) => categories.clone(),
            None => {
                let mut keys: Vec<String> = dataset
                    .get(0)
                    .and_then(|row| row.get(&counts_col))
                    .and_then(parse_counts)
                    .map(|counts| counts.into_iter().map(|(k, _)| k).collect())
                    .unwrap_or_default();
                keys.sort();
                keys
            }
        };
        let scheme = parse_scheme(o.scheme.as_deref())?.unwrap_or(DEFAULT_CATEGORICAL_SCHEME);
        let encoder = ColorEncoder::Categorical {
            index: domain.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect(),
            scheme,
        };
        let scale = Scale {
            kind: ScaleKind::Categorical,
            scheme,
            domain: Domain::Categorical(domain.clone()),
            label: o.label.clone().unwrap_or_else(|| counts_col.clone()),
            width: None,
        };

        let size = match o.radius {
            DonutRadius::Fixed(r) => SizeChannel::constant(r),
            DonutRadius::Range(range) => SizeChannel {
                column: Some(columns::TOTAL.to_string()),
                encoder: ScaleEngine::build_size_scale(&dataset, columns::TOTAL, range, None),
            },
        };
        let builder = FeatureBuilder::new(GeometryKind::Point)
            .with_size(size)
            .with_slices(SliceChannel {
                counts_column: counts_col,
                encoder,
            })
            .attach_rows(o.popup);
        let culler = self.lazy_culler(def, GeometryKind::Point, &dataset);
        let layer = VectorLayer::new(properties, def.options.clone(), dataset, builder, culler);
        let popup = Self::popup_template(def, Vec::new(), Some(domain));
        // Donut popups sit above the glyph rather than at a fixed offset
        let offset = [0.0, -o.radius.smallest() / 2.0];
        Ok(BuiltLayer {
            layer: Box::new(self.finish(def, layer, popup, offset)),
            scales: vec![scale],
        })
    }

    fn icons(
        &self,
        def: &LayerDefinition,
        o: &IconsOptions,
        properties: LayerProperties,
        dataset: Arc<Dataset>,
    ) -> Result<BuiltLayer> {
        let mut builder = FeatureBuilder::new(GeometryKind::Point).attach_rows(o.popup);
        if let Some(icon) = &o.icon {
            builder = builder.with_icon(if dataset.has_column(icon) {
                TextChannel::Column(icon.clone())
            } else {
                TextChannel::Constant(icon.clone())
            });
        }
        if let Some(color) = &o.color {
            builder = builder.with_color(ColorChannel::constant(parse_color(color)?));
        }
        let culler = self.lazy_culler(def, GeometryKind::Point, &dataset);
        let layer = VectorLayer::new(properties, def.options.clone(), dataset, builder, culler);
        let popup = Self::popup_template(def, Vec::new(), None);
        Ok(BuiltLayer {
            layer: Box::new(self.finish(def, layer, popup, self.popup_offset)),
            scales: Vec::new(),
        })
    }

    fn text(
        &self,
        def: &LayerDefinition,
        o: &TextOptions,
        properties: LayerProperties,
        dataset: Arc<Dataset>,
    ) -> Result<BuiltLayer> {
        let column = o
            .text
            .clone()
            .ok_or_else(|| MapError::Configuration("text layer requires a text column".to_string()))?;
        if !dataset.is_empty() && !dataset.has_column(&column) {
            return Err(MapError::Configuration(format!(
                "text column '{column}' not found in dataset '{}'",
                dataset.id()
            )));
        }
        let mut builder = FeatureBuilder::new(GeometryKind::Point).with_text(TextChannel::Column(column));
        if let Some(color) = &o.color {
            builder = builder.with_color(ColorChannel::constant(parse_color(color)?));
        }
        let culler = self.lazy_culler(def, GeometryKind::Point, &dataset);
        let layer = VectorLayer::new(properties, def.options.clone(), dataset, builder, culler);
        Ok(BuiltLayer {
            layer: Box::new(self.finish(def, layer, None, self.popup_offset)),
            scales: Vec::new(),
        })
    }
}

fn parse_scheme(name: Option<&str>) -> Result<Option<ColorScheme>> {
    name.map(ColorScheme::parse).transpose()
}

fn parse_color(s: &str) -> Result<SerializableColor> {
    SerializableColor::parse(s).ok_or_else(|| MapError::Configuration(format!("invalid color '{s}'")))
}

fn size_channel(dataset: &Dataset, value: Option<&StyleValue>, range: [f64; 2], default: f64) -> SizeChannel {
    match value {
        Some(v) => match v.column(|c| dataset.has_column(c)) {
            Some(col) => SizeChannel {
                column: Some(col.to_string()),
                encoder: ScaleEngine::build_size_scale(dataset, col, range, None),
            },
            None => SizeChannel::constant(v.as_number().unwrap_or(default)),
        },
        None => SizeChannel::constant(default),
    }
}

fn color_channel(
    dataset: &Dataset,
    value: Option<&StyleValue>,
    opts: ColorScaleOptions,
    color_ranges: &ColorRanges,
) -> Result<(ColorChannel, Option<Scale>)> {
    let Some(value) = value else {
        return Ok((ColorChannel::constant(parse_color(DEFAULT_COLOR)?), None));
    };
    if let Some(col) = value.column(|c| dataset.has_column(c)) {
        let (encoder, scale) =
            ScaleEngine::build_color_scale(dataset, col, &opts, color_ranges.get(col).copied());
        return Ok((
            ColorChannel {
                column: Some(col.to_string()),
                encoder,
            },
            Some(scale),
        ));
    }
    let literal = value
        .as_text()
        .ok_or_else(|| MapError::Configuration("color must be a column name or a color".to_string()))?;
    Ok((ColorChannel::constant(parse_color(literal)?), None))
}

/// Popup rows for the data-driven channels: the size column unless it is also
/// the colour column, then the colour column under its legend label
fn channel_fields(size: &SizeChannel, color: &ColorChannel, label: Option<&str>) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if let Some(size_col) = &size.column {
        if color.column.as_ref() != Some(size_col) {
            fields.push((size_col.clone(), size_col.clone()));
        }
    }
    if let Some(color_col) = &color.column {
        fields.push((label.unwrap_or(color_col).to_string(), color_col.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::test_row;
    use crate::layers::base::LayerKind;
    use crate::layers::feature::Feature;
    use serde_json::{json, Value};

    fn factory() -> LayerFactory {
        LayerFactory::new(&EngineConfig::default())
    }

    fn def(value: Value) -> LayerDefinition {
        LayerDefinition::from_value(&value).unwrap()
    }

    fn points_dataset() -> Arc<Dataset> {
        Arc::new(Dataset::new(
            "d",
            (0..20)
                .map(|i| {
                    test_row(json!({
                        "x": i as f64, "y": 0.0, "taxid": i, "zoom": 1,
                        "v": i, "kingdom": if i % 2 == 0 { "Archaea" } else { "Bacteria" }
                    }))
                })
                .collect(),
        ))
    }

    fn features(built: &BuiltLayer) -> &[Feature] {
        built.layer.features()
    }

    #[test]
    fn test_points_with_column_styles() {
        let built = factory()
            .create_layer(
                &def(json!({"layer": "points", "options": {"id": "d", "radius": "v", "fill": "kingdom"}})),
                points_dataset(),
                &ColorRanges::default(),
            )
            .unwrap();
        assert_eq!(built.scales.len(), 1);
        assert_eq!(built.scales[0].kind, ScaleKind::Categorical);
        let f = features(&built);
        assert_eq!(f.len(), 20);
        assert_eq!(f[0].radius, Some(1.0));
        assert_eq!(f[19].radius, Some(20.0));
        assert_ne!(f[0].fill_color, f[1].fill_color);
        assert!(f[0].row.is_none());
        assert!(!built.layer.is_interactive());
    }

    #[test]
    fn test_constant_styles_and_defaults() {
        let built = factory()
            .create_layer(
                &def(json!({"layer": "points", "options": {"id": "d", "radius": 7, "fill": "#00ff00"}})),
                points_dataset(),
                &ColorRanges::default(),
            )
            .unwrap();
        assert!(built.scales.is_empty());
        assert_eq!(features(&built)[3].radius, Some(7.0));
        assert_eq!(features(&built)[3].fill_color, SerializableColor::parse("#00ff00"));

        let built = factory()
            .create_layer(
                &def(json!({"layer": "points", "options": {"id": "d"}})),
                points_dataset(),
                &ColorRanges::default(),
            )
            .unwrap();
        assert_eq!(features(&built)[0].radius, Some(5.0));
        assert_eq!(features(&built)[0].fill_color, SerializableColor::parse(DEFAULT_COLOR));
    }

    #[test]
    fn test_color_range_override_pins_domain() {
        let mut ranges = ColorRanges::default();
        ranges.insert("v".to_string(), ColorRange { min: 0.0, max: 1000.0 });
        let built = factory()
            .create_layer(
                &def(json!({"layer": "lines", "options": {"id": "d", "color": "v"}})),
                Arc::new(Dataset::new(
                    "d",
                    (0..15)
                        .map(|i| test_row(json!({"x0": 0.0, "y0": 0.0, "x1": 1.0, "y1": i as f64, "v": i})))
                        .collect(),
                )),
                &ranges,
            )
            .unwrap();
        assert_eq!(built.scales[0].linear_domain(), Some([0.0, 1000.0]));
        assert_eq!(features(&built)[0].width_value, Some(3.0));
        assert!(features(&built)[0].color_value.is_some());
    }

    #[test]
    fn test_lazy_points_start_empty() {
        let ds = points_dataset();
        let built = factory()
            .create_layer(
                &def(json!({"layer": "points", "options": {"id": "d", "lazy": true, "popup": true, "hover": true}})),
                ds.clone(),
                &ColorRanges::default(),
            )
            .unwrap();
        assert!(built.layer.features().is_empty());
        // Popup rows were never attached to throwaway features
        assert!(ds.rows().iter().all(|row| Arc::strong_count(row) == 1));
        assert!(built.layer.requires_viewport_updates());
        assert!(built.layer.is_interactive());
        let vector = built.layer.as_any().downcast_ref::<VectorLayer>().unwrap();
        assert!(vector.is_lazy());
    }

    #[test]
    fn test_donuts_scale_and_popup_offset() {
        let ds = Arc::new(Dataset::new(
            "d",
            vec![
                test_row(json!({"x": 0.0, "y": 0.0, "taxid": 2, "total": 10, "c": "{\"b\": 4, \"a\": 6}"})),
                test_row(json!({"x": 1.0, "y": 1.0, "taxid": 3, "total": 2, "c": "{\"a\": 1, \"b\": 1}"})),
            ],
        ));
        let built = factory()
            .create_layer(
                &def(json!({"layer": "donuts", "options": {"id": "d", "counts_col": "c", "radius": [10, 30], "lazy": false}})),
                ds,
                &ColorRanges::default(),
            )
            .unwrap();
        assert_eq!(built.layer.z_index(), 6);
        assert_eq!(built.scales[0].categories(), ["a", "b"]);
        assert_eq!(built.scales[0].label, "c");
        let f = built.layer.features();
        assert_eq!(f[0].radius, Some(30.0));
        assert_eq!(f[1].radius, Some(10.0));
        let req = built.layer.popup_request(0).unwrap();
        assert_eq!(req.offset, [0.0, -5.0]);
    }

    #[test]
    fn test_configuration_errors() {
        let f = factory();
        let ds = points_dataset();
        for bad in [
            json!({"layer": "donuts", "options": {"id": "d"}}),
            json!({"layer": "text", "options": {"id": "d", "text": "nope"}}),
            json!({"layer": "points", "options": {"id": "d", "fill": "not-a-colour"}}),
            json!({"layer": "points", "options": {"id": "d", "fill": "v", "scheme": "sparkly"}}),
        ] {
            let err = f.create_layer(&def(bad), ds.clone(), &ColorRanges::default()).err().unwrap();
            assert!(err.is_layer_local());
        }
    }

    #[test]
    fn test_aggregation_kinds() {
        let built = factory()
            .create_layer(
                &def(json!({"layer": "screengrid", "options": {"id": "d"}})),
                points_dataset(),
                &ColorRanges::default(),
            )
            .unwrap();
        assert_eq!(built.layer.kind(), LayerKind::Screengrid);
        assert!(built.layer.features().is_empty());
        assert!(!built.layer.requires_viewport_updates());
    }
}
