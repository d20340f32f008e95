//! Prelude module for common lifemap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use lifemap::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{
        CenterMode, CoordinateCacheConfig, EngineConfig, EngineProfile, InteractionConfig,
        LazyLoadingConfig, LegendConfig, ViewConfig,
    },
    controller::{CompositionController, DataUpdate, LayerReport, SettleOutcome, ViewTarget},
    geo::{LatLng, Point},
    viewport::ViewportWindow,
};

pub use crate::data::{
    dataset::{Dataset, Row, TaxId},
    deserialization::{DatasetPayload, JsonColumnarDecoder, RowDecoder},
};

pub use crate::layers::{
    base::{LayerId, LayerKind, LayerProperties, LayerTrait},
    definition::{LayerDefinition, LayerOptions},
    factory::{BuiltLayer, ColorRanges, LayerFactory},
    feature::{Feature, FeatureBuilder, Geometry, GeometryKind},
    manager::LayerManager,
};

pub use crate::input::{
    events::{ClickOutcome, EventHandled, InputEvent},
    router::{EventRouter, HoverState, PopupState},
};

pub use crate::remote::{
    cache::{CacheEntry, CoordinateCache},
    lookup::{SolrTaxonomyService, TaxonLocation, TaxonomyService},
    refresh::{refresh_coordinates, RefreshOutcome},
    store::{CacheStore, FileCacheStore},
};

pub use crate::spatial::culling::ViewportCuller;

pub use crate::styles::{
    color::{ColorScheme, SerializableColor},
    scale::{ColorEncoder, Scale, ScaleEngine, ScaleKind, SizeEncoder},
};

pub use crate::traits::{CacheStats, Cacheable, ViewportAware};

pub use crate::ui::{
    legend::{Legend, LegendReconciler, LegendUpdate},
    popup::{Popup, PopupContent, PopupRequest},
};

pub use crate::{Error as MapError, Result};

pub use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
