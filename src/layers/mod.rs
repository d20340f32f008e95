pub mod aggregation;
pub mod base;
pub mod definition;
pub mod factory;
pub mod feature;
pub mod manager;
pub mod vector;

pub use aggregation::AggregationLayer;
pub use base::{LayerId, LayerKind, LayerProperties, LayerTrait};
pub use definition::{LayerDefinition, LayerOptions};
pub use factory::{BuiltLayer, ColorRanges, LayerFactory};
pub use feature::{Feature, FeatureBuilder, Geometry, GeometryKind};
pub use manager::LayerManager;
pub use vector::VectorLayer;
