use crate::core::geo::Point;
use crate::core::viewport::ViewportWindow;
use crate::ui::popup::PopupRequest;
use serde::{Deserialize, Serialize};

/// Input events routed to the composition.
///
/// Positions are in map coordinates. `resolution` is the number of map units
/// per screen pixel at the time of the event, used to turn pixel pick
/// tolerances into map distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Pointer moved over the map
    PointerMove { position: Point, resolution: f64 },
    /// Pointer left the map surface
    PointerLeave,
    /// Single click/tap
    Click {
        position: Point,
        resolution: f64,
        button: MouseButton,
    },
    /// The popup's own close control
    PopupClose,
    /// Pan or zoom ended
    ViewportSettled(ViewportWindow),
}

/// Mouse button types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Whether an event was handled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventHandled {
    Handled,
    NotHandled,
}

/// What a click did to the popup
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// A feature was hit; any previous popup is already disposed. The
    /// sequence number must accompany the resolved popup.
    Open { sequence: u64, request: PopupRequest },
    /// Empty space was clicked and the open popup disposed
    Closed,
    /// Nothing to do
    Ignored,
}

impl InputEvent {
    /// Gets the primary position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            InputEvent::PointerMove { position, .. } | InputEvent::Click { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }

    /// Checks if this is a mouse/pointer event
    pub fn is_pointer_event(&self) -> bool {
        matches!(
            self,
            InputEvent::PointerMove { .. } | InputEvent::PointerLeave | InputEvent::Click { .. }
        )
    }

    /// Pick tolerance in map units for a pixel tolerance
    pub fn tolerance(&self, tolerance_px: f64) -> f64 {
        match self {
            InputEvent::PointerMove { resolution, .. } | InputEvent::Click { resolution, .. } => {
                tolerance_px * resolution
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_event_position() {
        let click = InputEvent::Click {
            position: Point::new(100.0, 200.0),
            resolution: 2.0,
            button: MouseButton::Left,
        };
        assert_eq!(click.position(), Some(Point::new(100.0, 200.0)));
        assert_eq!(click.tolerance(5.0), 10.0);
        assert_eq!(InputEvent::PopupClose.position(), None);
    }

    #[test]
    fn test_event_type_checks() {
        assert!(InputEvent::PointerLeave.is_pointer_event());
        let settled = InputEvent::ViewportSettled(ViewportWindow::new(0.0, 0.0, 1.0, 1.0, 3.0));
        assert!(!settled.is_pointer_event());
        assert_eq!(settled.tolerance(5.0), 0.0);
    }
}
