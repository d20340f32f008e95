use crate::constants::columns;
use crate::core::{bounds::Bounds, geo::Point, viewport::ViewportWindow};
use crate::data::dataset::{row_point, Dataset};
use crate::layers::base::{LayerProperties, LayerTrait};
use crate::layers::definition::LayerOptions;
use crate::layers::feature::Feature;
use crate::traits::ViewportAware;

/// Raw positions handed to the GPU aggregation renderer (deck heatmap,
/// screen grid). Aggregation happens on the surface, so these layers hold no
/// features, never cull and never take pointer events.
pub struct AggregationLayer {
    properties: LayerProperties,
    options: LayerOptions,
    positions: Vec<Point>,
    extent: Bounds,
}

impl AggregationLayer {
    pub fn new(properties: LayerProperties, options: LayerOptions, dataset: &Dataset) -> Self {
        let positions: Vec<Point> = dataset
            .rows()
            .iter()
            .filter_map(|row| row_point(row, columns::X, columns::Y))
            .collect();
        let extent = positions.iter().fold(Bounds::empty(), |mut b, p| {
            b.extend(p);
            b
        });
        Self {
            properties,
            options,
            positions,
            extent,
        }
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn options(&self) -> &LayerOptions {
        &self.options
    }
}

impl ViewportAware for AggregationLayer {
    fn on_viewport_settled(&mut self, _viewport: &ViewportWindow) -> bool {
        false
    }

    fn requires_viewport_updates(&self) -> bool {
        false
    }
}

impl LayerTrait for AggregationLayer {
    fn properties(&self) -> &LayerProperties {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut LayerProperties {
        &mut self.properties
    }

    fn features(&self) -> &[Feature] {
        &[]
    }

    fn extent(&self) -> Bounds {
        self.extent.clone()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
