use crate::constants::columns;
use crate::core::{bounds::Bounds, viewport::ViewportWindow};
use crate::data::dataset::{as_number, row_point, Dataset, Row};
use crate::layers::feature::GeometryKind;
use crate::spatial::index::{RowEndpoint, RowIndex};
use log::debug;

/// Viewport-driven row selection for lazily loaded layers.
///
/// A row survives when its geometry falls inside the viewport widened by
/// `margin_fraction` of the viewport range on each axis, and when its zoom
/// threshold is at most `zoom + zoom_slack`. A non-positive slack lifts the
/// upper bound, but rows without a threshold are never shown. Segments are
/// kept whole when either endpoint is inside.
pub struct ViewportCuller {
    kind: GeometryKind,
    margin_fraction: f64,
    zoom_slack: f64,
    index: Option<RowIndex>,
}

impl ViewportCuller {
    pub fn new(kind: GeometryKind, margin_fraction: f64, zoom_slack: f64) -> Self {
        Self {
            kind,
            margin_fraction,
            zoom_slack,
            index: None,
        }
    }

    /// Builds an R-tree over the dataset when it has at least `threshold` rows
    pub fn indexed_from(mut self, dataset: &Dataset, threshold: usize) -> Self {
        if dataset.len() >= threshold && !dataset.is_empty() {
            self.index = Some(self.build_index(dataset));
            debug!(
                "indexed {} rows of dataset '{}' for culling",
                dataset.len(),
                dataset.id()
            );
        }
        self
    }

    fn build_index(&self, dataset: &Dataset) -> RowIndex {
        let mut endpoints = Vec::with_capacity(dataset.len());
        for (i, row) in dataset.rows().iter().enumerate() {
            for (x, y) in self.kind.coordinate_columns() {
                if let Some(p) = row_point(row, x, y) {
                    endpoints.push(RowEndpoint::new(i, p));
                }
            }
        }
        RowIndex::bulk_load(endpoints, dataset.len())
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn margin_fraction(&self) -> f64 {
        self.margin_fraction
    }

    pub fn zoom_slack(&self) -> f64 {
        self.zoom_slack
    }

    /// Indices of the rows relevant to `viewport`, in dataset order
    pub fn select(&self, dataset: &Dataset, viewport: &ViewportWindow) -> Vec<usize> {
        let window = viewport.padded(self.margin_fraction);

        let selected: Vec<usize> = match &self.index {
            Some(index) if index.row_count() == dataset.len() => index
                .query(&window)
                .into_iter()
                .filter(|i| {
                    dataset
                        .get(*i)
                        .map(|row| self.zoom_visible(row, viewport.zoom))
                        .unwrap_or(false)
                })
                .collect(),
            _ => dataset
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| {
                    self.in_window(row, &window) && self.zoom_visible(row, viewport.zoom)
                })
                .map(|(i, _)| i)
                .collect(),
        };

        debug!(
            "culled dataset '{}' to {}/{} rows at zoom {:.2}",
            dataset.id(),
            selected.len(),
            dataset.len(),
            viewport.zoom
        );
        selected
    }

    fn in_window(&self, row: &Row, window: &Bounds) -> bool {
        self.kind
            .coordinate_columns()
            .iter()
            .any(|(x, y)| row_point(row, x, y).is_some_and(|p| window.contains(&p)))
    }

    fn zoom_visible(&self, row: &Row, zoom: f64) -> bool {
        let limit = if self.zoom_slack > 0.0 {
            zoom + self.zoom_slack
        } else {
            f64::INFINITY
        };
        row.get(columns::ZOOM)
            .and_then(as_number)
            .is_some_and(|threshold| threshold <= limit)
    }
}
