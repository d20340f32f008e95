//! Data-driven colour and size encodings.
//!
//! A column is classified as categorical or linear, a domain is derived from
//! its values (or taken from an override), and the result is an encoder that
//! maps cell values to colours or sizes together with the [`Scale`] descriptor
//! the legend is built from.

use crate::constants::CATEGORICAL_THRESHOLD;
use crate::data::dataset::{as_number, stringify, Dataset};
use crate::prelude::{HashMap, HashSet};
use crate::styles::color::{
    ColorScheme, SerializableColor, DEFAULT_CATEGORICAL_SCHEME, DEFAULT_LINEAR_SCHEME,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Categorical,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Domain {
    Linear([f64; 2]),
    Categorical(Vec<String>),
}

/// Legend-facing description of one colour encoding.
///
/// Two scales are the same legend entry exactly when [`Scale::canonical_key`]
/// agrees, which covers kind, scheme, domain, label and width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub kind: ScaleKind,
    pub scheme: ColorScheme,
    pub domain: Domain,
    pub label: String,
    #[serde(default)]
    pub width: Option<String>,
}

impl Scale {
    pub fn canonical_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_width(mut self, width: Option<String>) -> Self {
        self.width = width;
        self
    }

    pub fn linear_domain(&self) -> Option<[f64; 2]> {
        match &self.domain {
            Domain::Linear(d) => Some(*d),
            Domain::Categorical(_) => None,
        }
    }

    pub fn categories(&self) -> &[String] {
        match &self.domain {
            Domain::Categorical(c) => c,
            Domain::Linear(_) => &[],
        }
    }
}

/// Externally pinned `[min, max]` for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub min: f64,
    pub max: f64,
}

/// How a colour channel driven by a column should be built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorScaleOptions {
    /// `Some(true)` forces a categorical scale, `Some(false)` a linear one,
    /// `None` leaves it to [`ScaleEngine::classify`]
    pub categorical: Option<bool>,
    pub categories: Option<Vec<String>>,
    pub scheme: Option<ColorScheme>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorEncoder {
    Constant(SerializableColor),
    Linear {
        min: f64,
        max: f64,
        scheme: ColorScheme,
    },
    Categorical {
        index: HashMap<String, usize>,
        scheme: ColorScheme,
    },
}

impl ColorEncoder {
    /// Colour for a cell value, `None` when the value has no reading on this
    /// scale (non-numeric on a linear scale, unknown category)
    pub fn encode(&self, value: &Value) -> Option<SerializableColor> {
        match self {
            Self::Constant(c) => Some(*c),
            Self::Linear { min, max, scheme } => {
                let v = as_number(value)?;
                Some(scheme.interpolate(normalize(v, *min, *max)))
            }
            Self::Categorical { index, scheme } => {
                index.get(&stringify(value)).map(|i| scheme.ordinal(*i))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeEncoder {
    Constant(f64),
    /// Linear remap of `[min, max]` onto `range`
    Linear { min: f64, max: f64, range: [f64; 2] },
}

impl SizeEncoder {
    pub fn encode(&self, value: &Value) -> Option<f64> {
        match self {
            Self::Constant(v) => Some(*v),
            Self::Linear { min, max, range } => {
                let v = as_number(value)?;
                Some(range[0] + normalize(v, *min, *max) * (range[1] - range[0]))
            }
        }
    }
}

/// Position of `v` in `[min, max]`; a degenerate domain pins to 0
fn normalize(v: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span == 0.0 || !span.is_finite() {
        0.0
    } else {
        (v - min) / span
    }
}

/// Builds colour and size encodings from dataset columns
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleEngine;

impl ScaleEngine {
    /// Categorical when forced or when the column has at most
    /// [`CATEGORICAL_THRESHOLD`] distinct values, linear otherwise. Value type
    /// plays no part: twelve distinct strings classify as linear.
    pub fn classify<'a>(values: impl IntoIterator<Item = &'a Value>, force_categorical: bool) -> ScaleKind {
        if force_categorical {
            return ScaleKind::Categorical;
        }
        let mut distinct = HashSet::default();
        for v in values {
            distinct.insert(stringify(v));
            if distinct.len() > CATEGORICAL_THRESHOLD {
                return ScaleKind::Linear;
            }
        }
        ScaleKind::Categorical
    }

    /// `[min, max]` of the numeric-coerced column, or the override when given
    pub fn linear_domain(dataset: &Dataset, column: &str, range: Option<ColorRange>) -> [f64; 2] {
        if let Some(r) = range {
            return [r.min, r.max];
        }
        dataset
            .numeric_extent(column)
            .map(|(lo, hi)| [lo, hi])
            .unwrap_or([0.0, 0.0])
    }

    /// Sorted distinct stringified values of the column
    pub fn categorical_domain(dataset: &Dataset, column: &str) -> Vec<String> {
        let mut values: Vec<String> = dataset
            .column(column)
            .map(stringify)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        values.sort();
        values
    }

    pub fn build_color_scale(
        dataset: &Dataset,
        column: &str,
        opts: &ColorScaleOptions,
        range: Option<ColorRange>,
    ) -> (ColorEncoder, Scale) {
        let label = opts.label.clone().unwrap_or_else(|| column.to_string());
        let kind = match opts.categorical {
            Some(true) => ScaleKind::Categorical,
            Some(false) => ScaleKind::Linear,
            None => Self::classify(dataset.column(column), opts.categories.is_some()),
        };
        match kind {
            ScaleKind::Categorical => {
                let categories = opts
                    .categories
                    .clone()
                    .unwrap_or_else(|| Self::categorical_domain(dataset, column));
                let scheme = opts.scheme.unwrap_or(DEFAULT_CATEGORICAL_SCHEME);
                let index = categories
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.clone(), i))
                    .collect();
                (
                    ColorEncoder::Categorical { index, scheme },
                    Scale {
                        kind: ScaleKind::Categorical,
                        scheme,
                        domain: Domain::Categorical(categories),
                        label,
                        width: None,
                    },
                )
            }
            ScaleKind::Linear => {
                let [min, max] = Self::linear_domain(dataset, column, range);
                let scheme = opts.scheme.unwrap_or(DEFAULT_LINEAR_SCHEME);
                (
                    ColorEncoder::Linear { min, max, scheme },
                    Scale {
                        kind: ScaleKind::Linear,
                        scheme,
                        domain: Domain::Linear([min, max]),
                        label,
                        width: None,
                    },
                )
            }
        }
    }

    /// Size encoding for a column remapped onto `output`
    pub fn build_size_scale(
        dataset: &Dataset,
        column: &str,
        output: [f64; 2],
        range: Option<ColorRange>,
    ) -> SizeEncoder {
        let [min, max] = Self::linear_domain(dataset, column, range);
        SizeEncoder::Linear {
            min,
            max,
            range: output,
        }
    }
}
