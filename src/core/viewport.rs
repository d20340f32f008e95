use crate::core::bounds::Bounds;
use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// The settled map view: visible extent in map coordinates plus zoom level.
///
/// A new window is derived every time the view stops moving; components only
/// ever read it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportWindow {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub zoom: f64,
}

impl ViewportWindow {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, zoom: f64) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmax.max(xmin),
            ymax: ymax.max(ymin),
            zoom,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_coords(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    pub fn x_range(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn y_range(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Window padded on both axes by `fraction` of the viewport range
    pub fn padded(&self, fraction: f64) -> Bounds {
        self.bounds().padded(fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_normalizes_corners() {
        let w = ViewportWindow::new(10.0, 5.0, -10.0, -5.0, 3.0);
        assert_eq!(w.xmin, -10.0);
        assert_eq!(w.xmax, 10.0);
        assert_eq!(w.x_range(), 20.0);
        assert_eq!(w.y_range(), 10.0);
    }

    #[test]
    fn test_padded_window() {
        let w = ViewportWindow::new(0.0, 0.0, 100.0, 50.0, 2.0);
        let padded = w.padded(0.05);
        assert_eq!(padded.min, Point::new(-5.0, -2.5));
        assert_eq!(padded.max, Point::new(105.0, 52.5));
    }
}
