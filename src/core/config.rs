//! Configuration system for the composition engine
//!
//! Hierarchical configuration grouped by concern. Every group has sensible
//! defaults, can be loaded from JSON with missing fields filled in, and can be
//! selected through a preset profile.

use crate::constants::{
    COORDINATE_CACHE_TTL_SECS, DEFAULT_LAZY_MARGIN, FIT_PADDING, HOVER_COLOR,
    MAX_COORDINATE_QUERY, POPUP_OFFSET, SPATIAL_INDEX_THRESHOLD,
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineProfile {
    #[default]
    Balanced,
    /// Tuned for datasets in the hundreds of thousands of rows
    LargeDataset,
    Custom(EngineConfig),
}

impl EngineProfile {
    pub fn resolve(&self) -> EngineConfig {
        match self {
            Self::Balanced => EngineConfig::default(),
            Self::LargeDataset => EngineConfig {
                lazy: LazyLoadingConfig {
                    margin_fraction: 0.02,
                    spatial_index_threshold: 20_000,
                },
                cache: CoordinateCacheConfig {
                    capacity: 64,
                    ..CoordinateCacheConfig::default()
                },
                ..EngineConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lazy: LazyLoadingConfig,
    pub cache: CoordinateCacheConfig,
    pub legend: LegendConfig,
    pub interaction: InteractionConfig,
    pub view: ViewConfig,
}

impl EngineConfig {
    /// Parses a JSON configuration; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lazy.margin_fraction >= 0.0) {
            return Err(MapError::Configuration(format!(
                "lazy.margin_fraction must be >= 0, got {}",
                self.lazy.margin_fraction
            )));
        }
        if self.cache.ttl_secs == 0 {
            return Err(MapError::Configuration(
                "cache.ttl_secs must be positive".to_string(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(MapError::Configuration(
                "cache.capacity must be positive".to_string(),
            ));
        }
        if !(self.interaction.hit_tolerance_px >= 0.0) {
            return Err(MapError::Configuration(
                "interaction.hit_tolerance_px must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyLoadingConfig {
    /// Culling margin as a fraction of the viewport range
    pub margin_fraction: f64,
    /// Datasets with at least this many rows are culled through an R-tree
    pub spatial_index_threshold: usize,
}

impl Default for LazyLoadingConfig {
    fn default() -> Self {
        Self {
            margin_fraction: DEFAULT_LAZY_MARGIN,
            spatial_index_threshold: SPATIAL_INDEX_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateCacheConfig {
    pub ttl_secs: u64,
    pub max_query_ids: usize,
    /// Number of distinct id sets kept in memory
    pub capacity: usize,
}

impl CoordinateCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CoordinateCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: COORDINATE_CACHE_TTL_SECS,
            max_query_ids: MAX_COORDINATE_QUERY,
            capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendConfig {
    /// CSS-like width stamped on every legend scale
    pub width: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub popup_offset: [f64; 2],
    pub hover_color: String,
    /// Pick radius in pixels used by the built-in hit test
    pub hit_tolerance_px: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            popup_offset: POPUP_OFFSET,
            hover_color: HOVER_COLOR.to_string(),
            hit_tolerance_px: 5.0,
        }
    }
}

/// How the view is positioned after layers are rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterMode {
    #[default]
    Default,
    /// Fit the union of all layer extents
    Auto,
    /// Center on one entity of the taxonomy
    Taxid(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub center: CenterMode,
    pub zoom: Option<f64>,
    pub fit_padding: [f64; 4],
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: CenterMode::Default,
            zoom: None,
            fit_padding: FIT_PADDING,
        }
    }
}
