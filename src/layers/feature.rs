//! Row to feature conversion.
//!
//! Every derived attribute is computed here, at build time, so the rendering
//! surface only reads plain values. Features depend on nothing but the row and
//! the encoders, which makes them safe to throw away and rebuild on each cull.

use crate::constants::columns;
use crate::core::geo::Point;
use crate::data::dataset::{as_number, row_point, stringify, Row};
use crate::prelude::Arc;
use crate::styles::color::SerializableColor;
use crate::styles::scale::{ColorEncoder, SizeEncoder};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Segment,
}

impl GeometryKind {
    /// Coordinate column pairs a row of this kind is located by
    pub fn coordinate_columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Point => &[(columns::X, columns::Y)],
            Self::Segment => &[(columns::X0, columns::Y0), (columns::X1, columns::Y1)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Point(Point),
    Segment(Point, Point),
}

impl Geometry {
    /// Where a popup for this geometry is anchored
    pub fn anchor(&self) -> Point {
        match self {
            Self::Point(p) => *p,
            Self::Segment(a, b) => a.midpoint(b),
        }
    }

    pub fn distance_to(&self, p: &Point) -> f64 {
        match self {
            Self::Point(q) => q.distance_to(p),
            Self::Segment(a, b) => p.distance_to_segment(a, b),
        }
    }
}

/// One wedge of a donut glyph
#[derive(Debug, Clone, PartialEq)]
pub struct DonutSlice {
    pub category: String,
    pub count: f64,
    pub color: Option<SerializableColor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    /// Position of the source row in its dataset
    pub source_index: usize,
    pub radius: Option<f64>,
    pub fill_color: Option<SerializableColor>,
    pub width_value: Option<f64>,
    pub color_value: Option<SerializableColor>,
    pub hover: bool,
    pub text: Option<String>,
    pub icon: Option<String>,
    pub slices: Vec<DonutSlice>,
    /// Only set for popup-enabled layers
    pub row: Option<Arc<Row>>,
}

impl Feature {
    pub fn new(geometry: Geometry, source_index: usize) -> Self {
        Self {
            geometry,
            source_index,
            radius: None,
            fill_color: None,
            width_value: None,
            color_value: None,
            hover: false,
            text: None,
            icon: None,
            slices: Vec::new(),
            row: None,
        }
    }

    pub fn slice_total(&self) -> f64 {
        self.slices.iter().map(|s| s.count).sum()
    }
}

/// A size attribute: constant, or a column through an encoder
#[derive(Debug, Clone, PartialEq)]
pub struct SizeChannel {
    pub column: Option<String>,
    pub encoder: SizeEncoder,
}

impl SizeChannel {
    pub fn constant(value: f64) -> Self {
        Self {
            column: None,
            encoder: SizeEncoder::Constant(value),
        }
    }

    pub fn value(&self, row: &Row) -> Option<f64> {
        match &self.column {
            Some(col) => row.get(col).and_then(|v| self.encoder.encode(v)),
            None => self.encoder.encode(&Value::Null),
        }
    }
}

/// A colour attribute: constant, or a column through a scale
#[derive(Debug, Clone, PartialEq)]
pub struct ColorChannel {
    pub column: Option<String>,
    pub encoder: ColorEncoder,
}

impl ColorChannel {
    pub fn constant(color: SerializableColor) -> Self {
        Self {
            column: None,
            encoder: ColorEncoder::Constant(color),
        }
    }

    pub fn value(&self, row: &Row) -> Option<SerializableColor> {
        match &self.column {
            Some(col) => row.get(col).and_then(|v| self.encoder.encode(v)),
            None => self.encoder.encode(&Value::Null),
        }
    }
}

/// A string attribute taken verbatim or from a column
#[derive(Debug, Clone, PartialEq)]
pub enum TextChannel {
    Constant(String),
    Column(String),
}

impl TextChannel {
    pub fn value(&self, row: &Row) -> Option<String> {
        match self {
            Self::Constant(s) => Some(s.clone()),
            Self::Column(col) => row.get(col).filter(|v| !v.is_null()).map(stringify),
        }
    }
}

/// Per-row category counts drawn as a donut
#[derive(Debug, Clone, PartialEq)]
pub struct SliceChannel {
    pub counts_column: String,
    pub encoder: ColorEncoder,
}

impl SliceChannel {
    pub fn slices(&self, row: &Row) -> Vec<DonutSlice> {
        let Some(counts) = row.get(&self.counts_column).and_then(parse_counts) else {
            return Vec::new();
        };
        counts
            .into_iter()
            .map(|(category, count)| DonutSlice {
                color: self.encoder.encode(&Value::String(category.clone())),
                category,
                count,
            })
            .collect()
    }
}

/// Category counts stored either as a JSON object or as its string encoding
pub fn parse_counts(value: &Value) -> Option<Vec<(String, f64)>> {
    let parsed;
    let object = match value {
        Value::Object(map) => map,
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).ok()?;
            parsed.as_object()?
        }
        _ => return None,
    };
    Some(
        object
            .iter()
            .map(|(k, v)| (k.clone(), as_number(v).unwrap_or(0.0)))
            .collect(),
    )
}

/// Builds the features of one layer from its encoders
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    geometry: GeometryKind,
    size: Option<SizeChannel>,
    color: Option<ColorChannel>,
    text: Option<TextChannel>,
    icon: Option<TextChannel>,
    slices: Option<SliceChannel>,
    attach_rows: bool,
}

impl FeatureBuilder {
    pub fn new(geometry: GeometryKind) -> Self {
        Self {
            geometry,
            size: None,
            color: None,
            text: None,
            icon: None,
            slices: None,
            attach_rows: false,
        }
    }

    /// Radius for point geometry, width for segments
    pub fn with_size(mut self, size: SizeChannel) -> Self {
        self.size = Some(size);
        self
    }

    /// Fill for point geometry, stroke colour for segments
    pub fn with_color(mut self, color: ColorChannel) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_text(mut self, text: TextChannel) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_icon(mut self, icon: TextChannel) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_slices(mut self, slices: SliceChannel) -> Self {
        self.slices = Some(slices);
        self
    }

    /// Keep a reference to the source row on each feature (popup layers)
    pub fn attach_rows(mut self, attach: bool) -> Self {
        self.attach_rows = attach;
        self
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        self.geometry
    }

    /// Builds the feature for one row; rows without usable coordinates yield
    /// nothing
    pub fn make_feature(&self, index: usize, row: &Arc<Row>) -> Option<Feature> {
        let geometry = match self.geometry {
            GeometryKind::Point => Geometry::Point(row_point(row, columns::X, columns::Y)?),
            GeometryKind::Segment => Geometry::Segment(
                row_point(row, columns::X0, columns::Y0)?,
                row_point(row, columns::X1, columns::Y1)?,
            ),
        };

        let mut feature = Feature::new(geometry, index);
        let size = self.size.as_ref().and_then(|s| s.value(row));
        let color = self.color.as_ref().and_then(|c| c.value(row));
        match self.geometry {
            GeometryKind::Point => {
                feature.radius = size;
                feature.fill_color = color;
            }
            GeometryKind::Segment => {
                feature.width_value = size;
                feature.color_value = color;
            }
        }
        feature.text = self.text.as_ref().and_then(|t| t.value(row));
        feature.icon = self.icon.as_ref().and_then(|t| t.value(row));
        if let Some(slices) = &self.slices {
            feature.slices = slices.slices(row);
        }
        if self.attach_rows {
            feature.row = Some(Arc::clone(row));
        }
        Some(feature)
    }

    /// Features for the given row indices, skipping rows without geometry
    pub fn build_all(&self, rows: &[Arc<Row>], indices: impl IntoIterator<Item = usize>) -> Vec<Feature> {
        indices
            .into_iter()
            .filter_map(|i| rows.get(i).and_then(|row| self.make_feature(i, row)))
            .collect()
    }
}
