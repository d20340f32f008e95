use crate::core::{bounds::Bounds, geo::Point, viewport::ViewportWindow};
use crate::layers::base::{LayerId, LayerTrait};
use crate::prelude::HashMap;
use crate::traits::ViewportAware;
use crate::Result;

/// Holds the active layers, ordered for drawing by z-index
pub struct LayerManager {
    /// All layers indexed by ID
    layers: HashMap<LayerId, Box<dyn LayerTrait>>,
    /// Layer IDs in draw order; equal z-indices keep insertion order
    render_order: Vec<LayerId>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self {
            layers: HashMap::default(),
            render_order: Vec::new(),
        }
    }

    pub fn add_layer(&mut self, layer: Box<dyn LayerTrait>) -> Result<()> {
        let layer_id = layer.id().clone();
        let z_index = layer.z_index();

        self.layers.insert(layer_id.clone(), layer);

        let insert_pos = self
            .render_order
            .iter()
            .position(|id| {
                self.layers
                    .get(id)
                    .map(|l| l.z_index() > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());

        self.render_order.insert(insert_pos, layer_id);
        Ok(())
    }

    pub fn remove_layer(&mut self, layer_id: &LayerId) -> Option<Box<dyn LayerTrait>> {
        self.render_order.retain(|id| id != layer_id);
        self.layers.remove(layer_id)
    }

    /// Drops every layer
    pub fn clear(&mut self) {
        self.layers.clear();
        self.render_order.clear();
    }

    pub fn get_layer(&self, layer_id: &LayerId) -> Option<&dyn LayerTrait> {
        self.layers.get(layer_id).map(|l| l.as_ref())
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, layer_id: &LayerId, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layers.get_mut(layer_id).map(|layer| f(layer.as_mut()))
    }

    /// Layer IDs in draw order
    pub fn list_layers(&self) -> Vec<LayerId> {
        self.render_order.clone()
    }

    /// Gets all layers in render order
    pub fn layers(&self) -> Vec<&dyn LayerTrait> {
        self.render_order
            .iter()
            .filter_map(|id| self.layers.get(id).map(|l| l.as_ref()))
            .collect()
    }

    /// Applies a function to each layer mutably in render order
    pub fn for_each_layer_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn LayerTrait),
    {
        for id in &self.render_order {
            if let Some(layer) = self.layers.get_mut(id) {
                f(layer.as_mut());
            }
        }
    }

    /// Forwards a settled viewport to the layers that follow the view and
    /// returns the ones that rebuilt their features
    pub fn on_viewport_settled(&mut self, viewport: &ViewportWindow) -> Vec<LayerId> {
        let mut rebuilt = Vec::new();
        self.for_each_layer_mut(|layer| {
            if layer.requires_viewport_updates() && layer.on_viewport_settled(viewport) {
                rebuilt.push(layer.id().clone());
            }
        });
        rebuilt
    }

    /// Union of the extents of all visible layers
    pub fn extent(&self) -> Bounds {
        self.layers()
            .into_iter()
            .filter(|l| l.is_visible())
            .fold(Bounds::empty(), |acc, l| acc.extend_with(&l.extent()))
    }

    /// Topmost interactive layer feature within `tolerance` of `point`
    pub fn hit_test(&self, point: &Point, tolerance: f64) -> Option<(LayerId, usize)> {
        self.hit_test_by(point, tolerance, |_| true)
    }

    /// Like [`hit_test`](Self::hit_test), restricted to layers accepted by `filter`
    pub fn hit_test_by<F>(&self, point: &Point, tolerance: f64, filter: F) -> Option<(LayerId, usize)>
    where
        F: Fn(&dyn LayerTrait) -> bool,
    {
        self.render_order.iter().rev().find_map(|id| {
            let layer = self.layers.get(id)?;
            if !layer.is_visible() || !layer.is_interactive() || !filter(layer.as_ref()) {
                return None;
            }
            layer.hit_test(point, tolerance).map(|i| (id.clone(), i))
        })
    }

    /// Re-sorts the draw order after z-indices changed
    pub fn update_render_order(&mut self) {
        self.render_order.sort_by(|a, b| {
            let z_a = self.layers.get(a).map(|l| l.z_index()).unwrap_or(0);
            let z_b = self.layers.get(b).map(|l| l.z_index()).unwrap_or(0);
            z_a.cmp(&z_b)
        });
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}
