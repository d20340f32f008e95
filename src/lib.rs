//! # Lifemap
//!
//! Layer composition and incremental rendering engine for very large
//! hierarchical geospatial datasets.
//!
//! The crate turns declarative layer definitions and tabular datasets into
//! renderable layers, keeps a deduplicated legend in sync with the active
//! colour encodings, and refreshes only what the current viewport needs. Pixel
//! drawing, projection and the columnar wire codec stay with the embedding
//! rendering surface.

pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod remote;
pub mod spatial;
pub mod styles;
pub mod traits;
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Bounds,
    config::{EngineConfig, EngineProfile},
    controller::{CompositionController, ViewTarget},
    geo::{LatLng, Point},
    viewport::ViewportWindow,
};

pub use data::{
    dataset::{Dataset, Row},
    deserialization::{DatasetPayload, JsonColumnarDecoder, RowDecoder},
};

pub use layers::{
    base::{LayerId, LayerKind, LayerTrait},
    definition::LayerDefinition,
    factory::LayerFactory,
    feature::{Feature, FeatureBuilder, Geometry},
    manager::LayerManager,
};

pub use input::{events::InputEvent, router::EventRouter};

pub use remote::{
    cache::CoordinateCache,
    lookup::{SolrTaxonomyService, TaxonomyService},
    refresh::refresh_coordinates,
};

pub use spatial::culling::ViewportCuller;

pub use styles::scale::{Scale, ScaleEngine};

pub use ui::{legend::LegendReconciler, popup::Popup};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Error taxonomy of the composition engine
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Unknown layer kind, missing dataset, invalid option set
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Coordinate, title or locate lookup failed
    #[error("Remote lookup error: {0}")]
    RemoteLookup(String),

    /// Dataset payload could not be decoded into rows
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Persisted cache store rejected a write
    #[error("Cache write error: {0}")]
    CacheWrite(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MapError {
    pub fn unknown_layer_kind(kind: &str) -> Self {
        Self::Configuration(format!("invalid layer type: {kind}"))
    }

    pub fn missing_dataset(id: &str) -> Self {
        Self::Configuration(format!("no dataset with id '{id}'"))
    }

    /// Whether this error only affects a single layer and the others may proceed.
    pub fn is_layer_local(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Error type alias for convenience
pub type Error = MapError;
