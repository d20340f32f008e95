//! Hover and popup state machines.
//!
//! Hover goes `Idle -> Hovered -> Idle`, with at most one hovered feature
//! across every layer. The popup independently goes `Closed -> Pending ->
//! Open -> Closed`; each click that hits a feature takes a new sequence
//! number so a slow title lookup cannot reopen a popup the user already
//! replaced or dismissed.

use crate::core::config::InteractionConfig;
use crate::core::geo::Point;
use crate::input::events::{ClickOutcome, EventHandled};
use crate::layers::base::{LayerId, LayerTrait};
use crate::layers::manager::LayerManager;
use crate::ui::popup::Popup;
use log::debug;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovered { layer: LayerId, feature: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PopupState {
    #[default]
    Closed,
    /// Content is being resolved for this click
    Pending { sequence: u64 },
    Open { sequence: u64, popup: Popup },
}

#[derive(Debug, Clone)]
pub struct EventRouter {
    hover: HoverState,
    popup: PopupState,
    sequence: u64,
    hit_tolerance_px: f64,
}

impl EventRouter {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            hover: HoverState::Idle,
            popup: PopupState::Closed,
            sequence: 0,
            hit_tolerance_px: config.hit_tolerance_px,
        }
    }

    pub fn hover_state(&self) -> &HoverState {
        &self.hover
    }

    pub fn popup_state(&self) -> &PopupState {
        &self.popup
    }

    /// The open popup, if any
    pub fn popup(&self) -> Option<&Popup> {
        match &self.popup {
            PopupState::Open { popup, .. } => Some(popup),
            _ => None,
        }
    }

    pub fn hit_tolerance_px(&self) -> f64 {
        self.hit_tolerance_px
    }

    /// Moves the hover highlight to the feature under the pointer, clearing
    /// the previous one even when nothing is hit
    pub fn pointer_move(
        &mut self,
        layers: &mut LayerManager,
        position: &Point,
        tolerance: f64,
    ) -> EventHandled {
        let hit = layers.hit_test_by(position, tolerance, |l| l.highlights_hover());
        if let (HoverState::Hovered { layer, feature }, Some((hit_layer, hit_feature))) =
            (&self.hover, &hit)
        {
            if layer == hit_layer && feature == hit_feature {
                return EventHandled::Handled;
            }
        }

        self.clear_hover(layers);
        match hit {
            Some((layer, feature)) => {
                if layers
                    .with_layer_mut(&layer, |l| l.set_hover(feature, true))
                    .unwrap_or(false)
                {
                    self.hover = HoverState::Hovered { layer, feature };
                }
                EventHandled::Handled
            }
            None => EventHandled::NotHandled,
        }
    }

    pub fn pointer_leave(&mut self, layers: &mut LayerManager) -> EventHandled {
        if self.hover == HoverState::Idle {
            return EventHandled::NotHandled;
        }
        self.clear_hover(layers);
        EventHandled::Handled
    }

    fn clear_hover(&mut self, layers: &mut LayerManager) {
        if let HoverState::Hovered { layer, feature } = std::mem::take(&mut self.hover) {
            layers.with_layer_mut(&layer, |l| l.set_hover(feature, false));
        }
    }

    /// Disposes any open popup, then starts a new one if a popup-enabled
    /// feature is under the click
    pub fn click(&mut self, layers: &LayerManager, position: &Point, tolerance: f64) -> ClickOutcome {
        let was_open = self.popup != PopupState::Closed;
        self.popup = PopupState::Closed;

        let request = layers
            .hit_test_by(position, tolerance, |l| l.has_popup())
            .and_then(|(layer, feature)| layers.get_layer(&layer)?.popup_request(feature));

        match request {
            Some(request) => {
                self.sequence += 1;
                debug!("popup {} requested on {}", self.sequence, request.layer_id);
                self.popup = PopupState::Pending {
                    sequence: self.sequence,
                };
                ClickOutcome::Open {
                    sequence: self.sequence,
                    request,
                }
            }
            None if was_open => ClickOutcome::Closed,
            None => ClickOutcome::Ignored,
        }
    }

    /// Shows a resolved popup unless its click has since been superseded
    pub fn show_popup(&mut self, sequence: u64, popup: Popup) -> bool {
        match self.popup {
            PopupState::Pending { sequence: pending } if pending == sequence => {
                self.popup = PopupState::Open { sequence, popup };
                true
            }
            _ => {
                debug!("discarding stale popup {sequence}");
                false
            }
        }
    }

    pub fn close_popup(&mut self) -> bool {
        let was_open = self.popup != PopupState::Closed;
        self.popup = PopupState::Closed;
        was_open
    }

    /// Forgets a hovered feature of a layer whose features were rebuilt;
    /// the rebuilt features start unhovered
    pub fn layer_rebuilt(&mut self, layer_id: &LayerId) {
        if matches!(&self.hover, HoverState::Hovered { layer, .. } if layer == layer_id) {
            self.hover = HoverState::Idle;
        }
    }

    /// Drops all state, for when the layer set is replaced
    pub fn reset(&mut self) {
        self.hover = HoverState::Idle;
        self.popup = PopupState::Closed;
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(&InteractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{test_row, Dataset};
    use crate::layers::base::{LayerKind, LayerProperties};
    use crate::layers::definition::{LayerOptions, PointsOptions};
    use crate::layers::feature::{FeatureBuilder, GeometryKind};
    use crate::layers::vector::VectorLayer;
    use crate::prelude::Arc;
    use crate::ui::popup::{PopupContent, PopupTemplate};
    use serde_json::json;

    fn manager(hover: bool, popup: bool) -> (LayerManager, LayerId) {
        let ds = Arc::new(Dataset::new(
            "d",
            (0..3)
                .map(|i| test_row(json!({"x": i as f64 * 10.0, "y": 0.0, "name": format!("n{i}")})))
                .collect(),
        ));
        let mut layer = VectorLayer::new(
            LayerProperties::new(LayerKind::Points, "d"),
            LayerOptions::Points(PointsOptions::default()),
            ds,
            FeatureBuilder::new(GeometryKind::Point).attach_rows(popup),
            None,
        )
        .with_hover(hover);
        if popup {
            layer = layer.with_popup(PopupTemplate::Column("name".into()), [0.0, -5.0]);
        }
        let id = layer.id().clone();
        let mut manager = LayerManager::new();
        manager.add_layer(Box::new(layer)).unwrap();
        (manager, id)
    }

    fn hovered(layers: &LayerManager, id: &LayerId) -> Vec<usize> {
        layers
            .get_layer(id)
            .unwrap()
            .features()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.hover)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_single_hovered_feature() {
        let (mut layers, id) = manager(true, false);
        let mut router = EventRouter::default();

        router.pointer_move(&mut layers, &Point::new(0.5, 0.0), 1.0);
        assert_eq!(hovered(&layers, &id), vec![0]);
        router.pointer_move(&mut layers, &Point::new(10.2, 0.0), 1.0);
        assert_eq!(hovered(&layers, &id), vec![1]);
        assert_eq!(
            router.hover_state(),
            &HoverState::Hovered {
                layer: id.clone(),
                feature: 1
            }
        );

        // Off every feature: nothing stays highlighted
        assert_eq!(
            router.pointer_move(&mut layers, &Point::new(5.0, 5.0), 1.0),
            EventHandled::NotHandled
        );
        assert!(hovered(&layers, &id).is_empty());
        assert_eq!(router.hover_state(), &HoverState::Idle);

        router.pointer_move(&mut layers, &Point::new(20.0, 0.0), 1.0);
        router.pointer_leave(&mut layers);
        assert!(hovered(&layers, &id).is_empty());
    }

    #[test]
    fn test_hover_ignores_layers_without_hover() {
        let (mut layers, id) = manager(false, true);
        let mut router = EventRouter::default();
        router.pointer_move(&mut layers, &Point::new(0.0, 0.0), 1.0);
        assert!(hovered(&layers, &id).is_empty());
    }

    #[test]
    fn test_at_most_one_popup() {
        let (layers, _) = manager(false, true);
        let mut router = EventRouter::default();

        let ClickOutcome::Open { sequence: first, request } =
            router.click(&layers, &Point::new(0.0, 0.0), 1.0)
        else {
            panic!("expected a popup");
        };
        assert!(router.show_popup(first, popup_from(request)));
        assert!(router.popup().is_some());

        let ClickOutcome::Open { sequence: second, request } =
            router.click(&layers, &Point::new(10.0, 0.0), 1.0)
        else {
            panic!("expected a popup");
        };
        // The first popup is gone before the second resolves
        assert!(router.popup().is_none());
        assert!(!router.show_popup(first, popup_from(request.clone())));
        assert!(router.show_popup(second, popup_from(request)));
        assert_eq!(router.popup().unwrap().content, PopupContent::text("n1"));

        assert_eq!(router.click(&layers, &Point::new(50.0, 50.0), 1.0), ClickOutcome::Closed);
        assert!(router.popup().is_none());
        assert_eq!(router.click(&layers, &Point::new(50.0, 50.0), 1.0), ClickOutcome::Ignored);
    }

    #[test]
    fn test_close_control_and_late_resolution() {
        let (layers, _) = manager(false, true);
        let mut router = EventRouter::default();
        let ClickOutcome::Open { sequence, request } =
            router.click(&layers, &Point::new(0.0, 0.0), 1.0)
        else {
            panic!("expected a popup");
        };
        assert!(router.close_popup());
        assert!(!router.show_popup(sequence, popup_from(request)));
        assert!(!router.close_popup());
    }

    fn popup_from(request: crate::ui::popup::PopupRequest) -> Popup {
        let crate::ui::popup::PopupBody::Ready(content) = request.body else {
            panic!("column popups are ready");
        };
        Popup {
            layer_id: request.layer_id,
            anchor: request.anchor,
            offset: request.offset,
            content,
        }
    }
}
