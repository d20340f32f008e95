use crate::constants::columns;
use crate::core::{bounds::Bounds, geo::Point};
use crate::prelude::{Arc, HashMap, HashSet};
use serde_json::Value;

/// One row of a dataset: column name to scalar value
pub type Row = HashMap<String, Value>;

/// Identifier of a taxonomic node
pub type TaxId = u64;

/// An ordered, immutable sequence of rows keyed by a logical dataset id.
///
/// Rows are shared (`Arc`) so features of popup-enabled layers can point back
/// at them without copying. The only in-place mutation ever applied is
/// coordinate correction, done before the dataset is handed to layers.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    id: String,
    rows: Vec<Arc<Row>>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            id: id.into(),
            rows: rows.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn from_shared(id: impl Into<String>, rows: Vec<Arc<Row>>) -> Self {
        Self {
            id: id.into(),
            rows,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Arc<Row>> {
        &mut self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Row>> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `name` is a column of this dataset, judged on its first row
    pub fn has_column(&self, name: &str) -> bool {
        self.rows
            .first()
            .map(|row| row.contains_key(name))
            .unwrap_or(false)
    }

    /// Values of a column, skipping rows where it is absent
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().filter_map(move |row| row.get(name))
    }

    /// Minimum and maximum of the numeric-coerced column
    pub fn numeric_extent(&self, name: &str) -> Option<(f64, f64)> {
        self.column(name)
            .filter_map(as_number)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Distinct entity ids referenced by the rows
    pub fn taxids(&self) -> HashSet<TaxId> {
        self.column(columns::TAXID).filter_map(as_taxid).collect()
    }

    /// Extent of all point and segment geometry in the dataset
    pub fn extent(&self) -> Bounds {
        let mut bounds = Bounds::empty();
        for row in &self.rows {
            for (x, y) in [
                (columns::X, columns::Y),
                (columns::X0, columns::Y0),
                (columns::X1, columns::Y1),
            ] {
                if let Some(p) = row_point(row, x, y) {
                    bounds.extend(&p);
                }
            }
        }
        bounds
    }
}

/// Numeric coercion of a scalar cell. Nulls, non-numeric strings and nested
/// values have no numeric reading.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok()?
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

/// String form of a scalar cell, integers printed without a fractional part
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                format_number(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Formats a float the way a plain number reads: `3` rather than `3.0`
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

pub fn as_taxid(value: &Value) -> Option<TaxId> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a point from two coordinate columns of a row
pub fn row_point(row: &Row, x_col: &str, y_col: &str) -> Option<Point> {
    let x = row.get(x_col).and_then(as_number)?;
    let y = row.get(y_col).and_then(as_number)?;
    Some(Point::new(x, y))
}

/// Builds a row from a JSON object literal
#[cfg(test)]
pub(crate) fn test_row(value: Value) -> Row {
    serde_json::from_value(value).expect("row literal must be a JSON object")
}
