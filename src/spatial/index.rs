use crate::core::{bounds::Bounds, geo::Point};
use rstar::{RTree, RTreeObject, AABB};

/// One indexed endpoint of a dataset row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowEndpoint {
    pub row: usize,
    pub position: [f64; 2],
}

impl RowEndpoint {
    pub fn new(row: usize, point: Point) -> Self {
        Self {
            row,
            position: [point.x, point.y],
        }
    }
}

impl RTreeObject for RowEndpoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// R-tree over row endpoints, bulk loaded once per dataset.
///
/// A segment row contributes both endpoints; a window query returns each
/// matching row once, in dataset order.
pub struct RowIndex {
    rtree: RTree<RowEndpoint>,
    rows: usize,
}

impl RowIndex {
    pub fn bulk_load(endpoints: Vec<RowEndpoint>, rows: usize) -> Self {
        Self {
            rtree: RTree::bulk_load(endpoints),
            rows,
        }
    }

    /// Rows with at least one endpoint inside `window` (edges inclusive)
    pub fn query(&self, window: &Bounds) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [window.min.x, window.min.y],
            [window.max.x, window.max.y],
        );
        let mut hit = vec![false; self.rows];
        for endpoint in self.rtree.locate_in_envelope(&envelope) {
            if let Some(slot) = hit.get_mut(endpoint.row) {
                *slot = true;
            }
        }
        hit.iter()
            .enumerate()
            .filter_map(|(i, h)| h.then_some(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// Number of dataset rows the index was built for
    pub fn row_count(&self) -> usize {
        self.rows
    }
}
