use crate::core::{bounds::Bounds, viewport::ViewportWindow};
use crate::data::dataset::Dataset;
use crate::layers::base::{LayerProperties, LayerTrait};
use crate::layers::definition::LayerOptions;
use crate::layers::feature::{Feature, FeatureBuilder};
use crate::prelude::Arc;
use crate::spatial::culling::ViewportCuller;
use crate::traits::ViewportAware;
use crate::ui::popup::{PopupRequest, PopupTemplate};
use log::debug;

/// A layer of per-row features drawn by the vector rendering surface.
///
/// Eager layers materialize every row once. Lazy layers hold a culler,
/// build nothing at construction and rebuild their features from the culled
/// rows each time the view settles.
pub struct VectorLayer {
    properties: LayerProperties,
    options: LayerOptions,
    dataset: Arc<Dataset>,
    builder: FeatureBuilder,
    culler: Option<ViewportCuller>,
    features: Vec<Feature>,
    popup: Option<PopupTemplate>,
    popup_offset: [f64; 2],
    extent: Bounds,
}

impl VectorLayer {
    pub fn new(
        properties: LayerProperties,
        options: LayerOptions,
        dataset: Arc<Dataset>,
        builder: FeatureBuilder,
        culler: Option<ViewportCuller>,
    ) -> Self {
        let extent = dataset.extent();
        let features = match culler {
            Some(_) => Vec::new(),
            None => builder.build_all(dataset.rows(), 0..dataset.len()),
        };
        Self {
            properties,
            options,
            dataset,
            builder,
            culler,
            features,
            popup: None,
            popup_offset: [0.0, 0.0],
            extent,
        }
    }

    pub fn with_popup(mut self, template: PopupTemplate, offset: [f64; 2]) -> Self {
        self.popup = Some(template);
        self.popup_offset = offset;
        self.properties.interactive = true;
        self
    }

    pub fn with_hover(mut self, hover: bool) -> Self {
        self.properties.hover = hover;
        self.properties.interactive |= hover;
        self
    }

    pub fn options(&self) -> &LayerOptions {
        &self.options
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn is_lazy(&self) -> bool {
        self.culler.is_some()
    }

    pub fn popup_template(&self) -> Option<&PopupTemplate> {
        self.popup.as_ref()
    }
}

impl ViewportAware for VectorLayer {
    fn on_viewport_settled(&mut self, viewport: &ViewportWindow) -> bool {
        let Some(culler) = &self.culler else {
            return false;
        };
        let selected = culler.select(&self.dataset, viewport);
        self.features = self.builder.build_all(self.dataset.rows(), selected);
        debug!(
            "layer {} rebuilt {} features",
            self.properties.id,
            self.features.len()
        );
        true
    }

    fn requires_viewport_updates(&self) -> bool {
        self.culler.is_some()
    }
}

impl LayerTrait for VectorLayer {
    fn properties(&self) -> &LayerProperties {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut LayerProperties {
        &mut self.properties
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn extent(&self) -> Bounds {
        self.extent.clone()
    }

    fn set_hover(&mut self, feature: usize, hovered: bool) -> bool {
        match self.features.get_mut(feature) {
            Some(f) => {
                f.hover = hovered;
                true
            }
            None => false,
        }
    }

    fn has_popup(&self) -> bool {
        self.popup.is_some()
    }

    fn popup_request(&self, feature: usize) -> Option<PopupRequest> {
        let template = self.popup.as_ref()?;
        template.request(&self.properties.id, self.features.get(feature)?, self.popup_offset)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
