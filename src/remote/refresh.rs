//! Coordinate correction of freshly decoded datasets.

use crate::constants::columns;
use crate::core::geo::Point;
use crate::data::dataset::{as_taxid, Dataset, Row, TaxId};
use crate::prelude::{Arc, HashMap};
use crate::remote::cache::CoordinateCache;
use crate::remote::lookup::TaxonomyService;
use log::{debug, info, warn};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// More distinct ids than the query cap allows
    Skipped { ids: usize },
    /// No row carries an entity id
    Empty,
    /// The lookup failed; rows keep their decoded coordinates
    Failed,
    /// Number of rows whose coordinates changed
    Applied { rows: usize },
}

/// Replaces the coordinates of every row with the current ones from the
/// taxonomy service, through `cache`.
///
/// One batched lookup covers the union of ids across all datasets. Failures
/// are logged and leave the datasets untouched.
pub async fn refresh_coordinates(
    datasets: &mut [&mut Dataset],
    service: Arc<dyn TaxonomyService>,
    cache: &CoordinateCache,
    max_query_ids: usize,
) -> RefreshOutcome {
    let mut ids: Vec<TaxId> = datasets
        .iter()
        .flat_map(|ds| ds.taxids())
        .collect::<crate::prelude::HashSet<_>>()
        .into_iter()
        .collect();
    if ids.is_empty() {
        return RefreshOutcome::Empty;
    }
    if ids.len() > max_query_ids {
        info!(
            "too many taxids to refresh coordinates ({} > {max_query_ids})",
            ids.len()
        );
        return RefreshOutcome::Skipped { ids: ids.len() };
    }
    ids.sort_unstable();

    info!("refreshing coordinates of {} taxids", ids.len());
    let entry = match cache.get_or_fetch(&ids, service).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!("coordinate refresh failed, keeping decoded coordinates: {e}");
            return RefreshOutcome::Failed;
        }
    };

    let rows: usize = datasets
        .iter_mut()
        .map(|ds| apply_coordinates(ds, &entry.value))
        .sum();
    debug!("refreshed coordinates of {rows} rows");
    RefreshOutcome::Applied { rows }
}

/// Writes coordinates into the rows of one dataset and returns how many rows
/// changed. Rows without a matching id are left alone.
pub fn apply_coordinates(dataset: &mut Dataset, coords: &HashMap<TaxId, Point>) -> usize {
    let mut changed = 0;
    for row in dataset.rows_mut() {
        let own = row.get(columns::TAXID).and_then(as_taxid).and_then(|id| coords.get(&id));
        let parent = row
            .get(columns::PARENT)
            .and_then(as_taxid)
            .and_then(|id| coords.get(&id));
        if own.is_none() && parent.is_none() {
            continue;
        }
        let row = Arc::make_mut(row);
        let mut touched = false;
        if let Some(p) = own {
            touched |= set_if_present(row, columns::X, columns::Y, p);
            touched |= set_if_present(row, columns::X0, columns::Y0, p);
        }
        if let Some(p) = parent {
            set_point(row, columns::X1, columns::Y1, p);
            touched = true;
        }
        if touched {
            changed += 1;
        }
    }
    changed
}

fn set_if_present(row: &mut Row, x: &str, y: &str, p: &Point) -> bool {
    if !row.contains_key(x) {
        return false;
    }
    set_point(row, x, y, p);
    true
}

fn set_point(row: &mut Row, x: &str, y: &str, p: &Point) {
    row.insert(x.to_string(), Value::from(p.x));
    row.insert(y.to_string(), Value::from(p.y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CoordinateCacheConfig;
    use crate::data::dataset::test_row;
    use crate::remote::lookup::TaxonLocation;
    use crate::{MapError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(Option<HashMap<TaxId, Point>>);

    #[async_trait]
    impl TaxonomyService for Fixed {
        async fn coordinates(&self, _ids: &[TaxId]) -> Result<HashMap<TaxId, Point>> {
            self.0
                .clone()
                .ok_or_else(|| MapError::RemoteLookup("down".into()))
        }

        async fn name(&self, _taxid: TaxId) -> Result<Option<String>> {
            Ok(None)
        }

        async fn locate(&self, _taxid: TaxId) -> Result<Option<TaxonLocation>> {
            Ok(None)
        }
    }

    fn coords() -> HashMap<TaxId, Point> {
        let mut c = HashMap::default();
        c.insert(2, Point::new(10.0, 20.0));
        c.insert(1, Point::new(-1.0, -2.0));
        c
    }

    #[test]
    fn test_apply_points_and_segments() {
        let mut ds = Dataset::new(
            "d",
            vec![
                test_row(json!({"taxid": 2, "x": 0.0, "y": 0.0})),
                test_row(json!({"taxid": 2, "parent": 1, "x0": 0.0, "y0": 0.0, "x1": 0.0, "y1": 0.0})),
                test_row(json!({"taxid": 99, "x": 5.0, "y": 5.0})),
            ],
        );
        assert_eq!(apply_coordinates(&mut ds, &coords()), 2);
        let rows = ds.rows();
        assert_eq!(rows[0]["x"], json!(10.0));
        assert_eq!(rows[1]["y0"], json!(20.0));
        assert_eq!(rows[1]["x1"], json!(-1.0));
        assert_eq!(rows[2]["x"], json!(5.0));
        assert!(!rows[0].contains_key("x0"));
    }

    #[tokio::test]
    async fn test_failure_leaves_rows() {
        let cache = CoordinateCache::new(&CoordinateCacheConfig::default());
        let mut ds = Dataset::new("d", vec![test_row(json!({"taxid": 2, "x": 3.0, "y": 4.0}))]);
        let outcome =
            refresh_coordinates(&mut [&mut ds], Arc::new(Fixed(None)), &cache, 100).await;
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert_eq!(ds.rows()[0]["x"], json!(3.0));
    }

    #[tokio::test]
    async fn test_cap_and_empty() {
        let cache = CoordinateCache::new(&CoordinateCacheConfig::default());
        let service = Arc::new(Fixed(Some(coords())));
        let mut ds = Dataset::new(
            "d",
            (0..5).map(|i| test_row(json!({"taxid": i, "x": 0.0, "y": 0.0}))).collect(),
        );
        let outcome = refresh_coordinates(&mut [&mut ds], service.clone(), &cache, 4).await;
        assert_eq!(outcome, RefreshOutcome::Skipped { ids: 5 });

        let mut bare = Dataset::new("e", vec![test_row(json!({"x": 0.0}))]);
        let outcome = refresh_coordinates(&mut [&mut bare], service.clone(), &cache, 4).await;
        assert_eq!(outcome, RefreshOutcome::Empty);

        let outcome = refresh_coordinates(&mut [&mut ds], service, &cache, 10).await;
        assert_eq!(outcome, RefreshOutcome::Applied { rows: 2 });
    }
}
