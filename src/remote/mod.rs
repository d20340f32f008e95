//! Remote taxonomy lookups and the coordinate cache in front of them.

pub mod cache;
pub mod lookup;
pub mod refresh;
pub mod store;

pub use cache::{CacheEntry, CoordinateCache};
pub use lookup::{SolrTaxonomyService, TaxonLocation, TaxonomyService, DEFAULT_TAXONOMY_URL};
pub use refresh::{apply_coordinates, refresh_coordinates, RefreshOutcome};
pub use store::{CacheStore, FileCacheStore};
