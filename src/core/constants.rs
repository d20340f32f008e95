//! Engine-wide constants.
//! Keeping them in a single place makes it easier to tweak magic numbers.

/// A column with at most this many distinct values is encoded categorically
/// unless the caller forces a classification.
pub const CATEGORICAL_THRESHOLD: usize = 10;

/// Coordinate refresh is skipped when more entity ids than this are requested.
pub const MAX_COORDINATE_QUERY: usize = 100_000;

/// Lifetime of a cached coordinate lookup, in seconds.
pub const COORDINATE_CACHE_TTL_SECS: u64 = 3600;

/// Prefix of canonical coordinate cache keys.
pub const COORDINATE_CACHE_KEY_PREFIX: &str = "taxids_";

/// Viewport padding used by lazy layers, as a fraction of the viewport range.
pub const DEFAULT_LAZY_MARGIN: f64 = 0.05;

/// Lazy layers over at least this many rows cull through an R-tree.
pub const SPATIAL_INDEX_THRESHOLD: usize = 100_000;

/// Pixel offset applied to every popup anchor.
pub const POPUP_OFFSET: [f64; 2] = [0.0, -5.0];

/// Label shown for the root of the taxonomy (entity id 0).
pub const ROOT_LABEL: &str = "LUCA";

/// Fill colour of hovered features.
pub const HOVER_COLOR: &str = "#ff0000";

/// Default feature colour when no colour option is given.
pub const DEFAULT_COLOR: &str = "#DD0000";

/// Default view centre (longitude, latitude).
pub const DEFAULT_LON: f64 = 0.0;
pub const DEFAULT_LAT: f64 = -4.226497;

/// Padding (top, right, bottom, left) in pixels used when fitting the view to data.
pub const FIT_PADDING: [f64; 4] = [50.0, 150.0, 50.0, 50.0];

/// Well-known row columns.
pub mod columns {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const X0: &str = "x0";
    pub const Y0: &str = "y0";
    pub const X1: &str = "x1";
    pub const Y1: &str = "y1";
    pub const ZOOM: &str = "zoom";
    pub const TAXID: &str = "taxid";
    pub const PARENT: &str = "parent";
    pub const TOTAL: &str = "total";
}
