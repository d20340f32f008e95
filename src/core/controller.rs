//! Composition controller.
//!
//! Owns the datasets, the active layers, the legend and the interaction
//! state, and sequences every data update as
//! `deserialize -> coordinate refresh -> layer rebuild`, with the view fit
//! computed on request afterwards.

use crate::constants::{DEFAULT_LAT, DEFAULT_LON};
use crate::core::bounds::Bounds;
use crate::core::config::{CenterMode, EngineConfig};
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::ViewportWindow;
use crate::data::dataset::Dataset;
use crate::data::deserialization::{DatasetPayload, JsonColumnarDecoder, RowDecoder};
use crate::input::events::{ClickOutcome, EventHandled, InputEvent, MouseButton};
use crate::input::router::EventRouter;
use crate::layers::base::{LayerId, LayerTrait};
use crate::layers::definition::LayerDefinition;
use crate::layers::factory::{ColorRanges, LayerFactory};
use crate::layers::manager::LayerManager;
use crate::prelude::{Arc, HashMap};
use crate::remote::cache::CoordinateCache;
use crate::remote::lookup::TaxonomyService;
use crate::remote::refresh::{refresh_coordinates, RefreshOutcome};
use crate::styles::scale::Scale;
use crate::traits::ViewportAware;
use crate::ui::legend::{Legend, LegendReconciler, LegendUpdate};
use crate::ui::popup::Popup;
use crate::{MapError, Result};
use log::{debug, error, info, warn};
use serde_json::Value;

/// Where the view should go after layers were rebuilt. `zoom` is `None`
/// when the current zoom should be kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewTarget {
    /// Fit the extent with pixel padding (top, right, bottom, left)
    Fit {
        extent: Bounds,
        padding: [f64; 4],
        zoom: Option<f64>,
    },
    Center { center: Point, zoom: Option<f64> },
    /// Nothing to fit; leave the view where it is
    Keep { zoom: Option<f64> },
}

/// A decoded data update travelling through coordinate refresh.
///
/// The generation is taken when the update is prepared; applying it after a
/// newer update was prepared is a no-op.
#[derive(Debug)]
pub struct DataUpdate {
    generation: u64,
    datasets: HashMap<String, Dataset>,
    refresh: Option<RefreshOutcome>,
}

impl DataUpdate {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    pub fn refresh_outcome(&self) -> Option<RefreshOutcome> {
        self.refresh
    }

    /// Corrects the decoded coordinates through `cache`. Never fails; on
    /// lookup failure the rows keep their decoded coordinates.
    pub async fn refresh_coordinates(
        mut self,
        service: Arc<dyn TaxonomyService>,
        cache: &CoordinateCache,
        max_query_ids: usize,
    ) -> Self {
        let mut datasets: Vec<&mut Dataset> = self.datasets.values_mut().collect();
        let outcome = refresh_coordinates(&mut datasets, service, cache, max_query_ids).await;
        self.refresh = Some(outcome);
        self
    }
}

/// Result of rebuilding the layer set
#[derive(Debug)]
pub struct LayerReport {
    pub built: Vec<LayerId>,
    /// Definitions that could not become layers; the others were built
    pub skipped: Vec<MapError>,
    pub legend: LegendUpdate,
}

/// Result of a settled viewport
#[derive(Debug, Clone, PartialEq)]
pub struct SettleOutcome {
    /// Lazy layers whose features were rebuilt
    pub rebuilt: Vec<LayerId>,
    pub legend: LegendUpdate,
}

pub struct CompositionController {
    config: EngineConfig,
    factory: LayerFactory,
    service: Arc<dyn TaxonomyService>,
    cache: Arc<CoordinateCache>,
    decoder: Arc<dyn RowDecoder>,
    datasets: HashMap<String, Arc<Dataset>>,
    definitions: Option<Value>,
    color_ranges: ColorRanges,
    layers: LayerManager,
    scales: Vec<Scale>,
    legend: LegendReconciler,
    router: EventRouter,
    viewport: Option<ViewportWindow>,
    generation: u64,
    /// User-visible decode failure; operations stay suspended until a valid
    /// data update arrives
    error: Option<String>,
}

impl CompositionController {
    pub fn new(config: EngineConfig, service: Arc<dyn TaxonomyService>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory: LayerFactory::new(&config),
            cache: Arc::new(CoordinateCache::new(&config.cache)),
            decoder: Arc::new(JsonColumnarDecoder),
            datasets: HashMap::default(),
            definitions: None,
            color_ranges: ColorRanges::default(),
            layers: LayerManager::new(),
            scales: Vec::new(),
            legend: LegendReconciler::new(config.legend.width.clone()),
            router: EventRouter::new(&config.interaction),
            viewport: None,
            generation: 0,
            error: None,
            service,
            config,
        })
    }

    /// Shares a coordinate cache between controllers
    pub fn with_cache(mut self, cache: Arc<CoordinateCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn RowDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CoordinateCache> {
        &self.cache
    }

    pub fn service(&self) -> Arc<dyn TaxonomyService> {
        self.service.clone()
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn dataset(&self, id: &str) -> Option<&Arc<Dataset>> {
        self.datasets.get(id)
    }

    /// Scales of the active layers, in definition order, before deduplication
    pub fn scales(&self) -> &[Scale] {
        &self.scales
    }

    pub fn legend(&self) -> &Legend {
        self.legend.legend()
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.router.popup()
    }

    /// The pending user-visible error, if the last data update failed to decode
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn ensure_ready(&self) -> Result<()> {
        match &self.error {
            Some(msg) => Err(MapError::Deserialization(msg.clone())),
            None => Ok(()),
        }
    }

    /// Decodes a `{dataset_id: {serialized, value}}` map and takes a new
    /// generation. A decode failure is kept as the user-visible error.
    pub fn prepare_data(&mut self, payload: &Value) -> Result<DataUpdate> {
        self.generation += 1;
        match self.decode(payload) {
            Ok(datasets) => Ok(DataUpdate {
                generation: self.generation,
                datasets,
                refresh: None,
            }),
            Err(e) => {
                error!("data update failed: {e}");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn decode(&self, payload: &Value) -> Result<HashMap<String, Dataset>> {
        DatasetPayload::parse_map(payload)?
            .into_iter()
            .map(|(id, payload)| {
                let dataset = payload
                    .into_dataset(&id, self.decoder.as_ref())
                    .map_err(|e| match e {
                        MapError::Deserialization(_) => e,
                        other => MapError::Deserialization(other.to_string()),
                    })?;
                Ok((id, dataset))
            })
            .collect()
    }

    /// Installs the datasets of an update and rebuilds the current layer set
    /// over them. Returns `None` when a newer update superseded this one;
    /// otherwise the rebuild report, whose legend update the caller must
    /// honour since the reconciler has already recorded the new scales.
    pub fn apply_data(&mut self, update: DataUpdate) -> Result<Option<LayerReport>> {
        if update.generation != self.generation {
            debug!(
                "discarding data update {} superseded by {}",
                update.generation, self.generation
            );
            return Ok(None);
        }
        info!(
            "applying data update {} ({} datasets)",
            update.generation,
            update.datasets.len()
        );
        self.datasets = update
            .datasets
            .into_iter()
            .map(|(id, ds)| (id, Arc::new(ds)))
            .collect();
        self.error = None;
        Ok(Some(self.rebuild_layers()))
    }

    /// Full data update: decode, refresh coordinates, apply
    pub async fn update_data(&mut self, payload: &Value) -> Result<Option<LayerReport>> {
        let update = self.prepare_data(payload)?;
        let update = update
            .refresh_coordinates(self.service.clone(), &self.cache, self.config.cache.max_query_ids)
            .await;
        self.apply_data(update)
    }

    /// Replaces every layer with the ones described by `definitions` (one
    /// definition or an array). A definition that fails is logged and
    /// skipped; the rest are built.
    pub fn update_layers(&mut self, definitions: &Value, color_ranges: ColorRanges) -> Result<LayerReport> {
        self.ensure_ready()?;
        self.definitions = Some(definitions.clone());
        self.color_ranges = color_ranges;
        Ok(self.rebuild_layers())
    }

    fn rebuild_layers(&mut self) -> LayerReport {
        self.router.reset();
        self.layers.clear();
        self.scales.clear();

        let mut built = Vec::new();
        let mut skipped = Vec::new();
        let definitions = self
            .definitions
            .as_ref()
            .map(LayerDefinition::parse)
            .unwrap_or_default();

        for (i, def) in definitions.into_iter().enumerate() {
            match self.build_layer(def) {
                Ok(id) => built.push(id),
                Err(e) => {
                    warn!("skipping layer {i}: {e}");
                    skipped.push(e);
                }
            }
        }

        let legend = self.legend.reconcile(&self.scales);
        info!(
            "built {} layer(s), skipped {}, legend {}",
            built.len(),
            skipped.len(),
            if legend.changed { "changed" } else { "unchanged" }
        );
        LayerReport {
            built,
            skipped,
            legend,
        }
    }

    fn build_layer(&mut self, def: Result<LayerDefinition>) -> Result<LayerId> {
        let def = def?;
        let dataset = self
            .datasets
            .get(&def.dataset_id)
            .cloned()
            .ok_or_else(|| MapError::missing_dataset(&def.dataset_id))?;
        let mut built = self.factory.create_layer(&def, dataset, &self.color_ranges)?;
        if let Some(viewport) = &self.viewport {
            if built.layer.requires_viewport_updates() {
                built.layer.on_viewport_settled(viewport);
            }
        }
        let id = built.layer.id().clone();
        self.layers.add_layer(built.layer)?;
        self.scales.extend(built.scales);
        Ok(id)
    }

    /// Re-culls lazy layers for the settled view and reconciles the legend
    pub fn on_viewport_settled(&mut self, viewport: ViewportWindow) -> SettleOutcome {
        self.viewport = Some(viewport);
        if self.error.is_some() {
            return SettleOutcome {
                rebuilt: Vec::new(),
                legend: self.unchanged_legend(),
            };
        }
        let rebuilt = self.layers.on_viewport_settled(&viewport);
        for id in &rebuilt {
            self.router.layer_rebuilt(id);
        }
        let legend = self.legend.reconcile(&self.scales);
        debug!(
            "viewport settled at zoom {:.2}: {} layer(s) rebuilt",
            viewport.zoom,
            rebuilt.len()
        );
        SettleOutcome { rebuilt, legend }
    }

    fn unchanged_legend(&self) -> LegendUpdate {
        LegendUpdate {
            changed: false,
            legend: self.legend.legend().clone(),
        }
    }

    /// Routes one input event. Popup titles are resolved before returning;
    /// a click that lands while another popup is open disposes it first.
    pub async fn handle_event(&mut self, event: InputEvent) -> EventHandled {
        if self.error.is_some() {
            return EventHandled::NotHandled;
        }
        let tolerance = event.tolerance(self.router.hit_tolerance_px());
        match event {
            InputEvent::PointerMove { position, .. } => {
                self.router.pointer_move(&mut self.layers, &position, tolerance)
            }
            InputEvent::PointerLeave => self.router.pointer_leave(&mut self.layers),
            InputEvent::Click {
                position,
                button: MouseButton::Left,
                ..
            } => match self.router.click(&self.layers, &position, tolerance) {
                ClickOutcome::Open { sequence, request } => {
                    let popup = request.resolve(self.service.as_ref()).await;
                    self.router.show_popup(sequence, popup);
                    EventHandled::Handled
                }
                ClickOutcome::Closed => EventHandled::Handled,
                ClickOutcome::Ignored => EventHandled::NotHandled,
            },
            InputEvent::Click { .. } => EventHandled::NotHandled,
            InputEvent::PopupClose => {
                if self.router.close_popup() {
                    EventHandled::Handled
                } else {
                    EventHandled::NotHandled
                }
            }
            InputEvent::ViewportSettled(viewport) => {
                self.on_viewport_settled(viewport);
                EventHandled::Handled
            }
        }
    }

    /// Computes where the view should go for the configured centre mode
    pub async fn update_zoom(&self) -> ViewTarget {
        let zoom = self.config.view.zoom;
        let default_center = LatLng::new(DEFAULT_LAT, DEFAULT_LON).to_mercator();
        match self.config.view.center {
            CenterMode::Auto => {
                let extent = self.layers.extent();
                if extent.is_valid() {
                    ViewTarget::Fit {
                        extent,
                        padding: self.config.view.fit_padding,
                        zoom,
                    }
                } else {
                    ViewTarget::Keep { zoom }
                }
            }
            CenterMode::Taxid(taxid) => match self.service.locate(taxid).await {
                Ok(Some(location)) => ViewTarget::Center {
                    center: location.point,
                    zoom: zoom.or(Some(location.zoom - 3.0)),
                },
                Ok(None) => {
                    warn!("taxid {taxid} not found in Lifemap taxids");
                    ViewTarget::Center {
                        center: default_center,
                        zoom,
                    }
                }
                Err(e) => {
                    warn!("locating taxid {taxid} failed: {e}");
                    ViewTarget::Center {
                        center: default_center,
                        zoom,
                    }
                }
            },
            CenterMode::Default => ViewTarget::Center {
                center: default_center,
                zoom,
            },
        }
    }

    /// Drops layers, datasets and interaction state and clears the
    /// coordinate cache
    pub fn teardown(&mut self) {
        self.layers.clear();
        self.scales.clear();
        self.datasets.clear();
        self.definitions = None;
        self.router.reset();
        self.legend.reset();
        self.cache.clear();
        self.viewport = None;
        self.error = None;
        info!("composition torn down");
    }
}
