//! Dataset wire format and the codec boundary.
//!
//! Datasets arrive as `{ "serialized": bool, "value": ... }`. Plain payloads
//! already hold an array of row objects; serialized payloads hold columnar
//! bytes that an external [`RowDecoder`] turns into rows.

use crate::data::dataset::{Dataset, Row};
use crate::prelude::HashMap;
use crate::{MapError, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Turns columnar-encoded bytes into row objects
pub trait RowDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Row>>;
}

/// One dataset as received on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetPayload {
    Serialized(Vec<u8>),
    Rows(Vec<Row>),
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    serialized: bool,
    value: Value,
}

impl<'de> Deserialize<'de> for DatasetPayload {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let raw = RawPayload::deserialize(deserializer)?;
        if raw.serialized {
            let bytes: Vec<u8> = serde_json::from_value(raw.value).map_err(D::Error::custom)?;
            Ok(Self::Serialized(bytes))
        } else {
            let rows: Vec<Row> = serde_json::from_value(raw.value).map_err(D::Error::custom)?;
            Ok(Self::Rows(rows))
        }
    }
}

impl DatasetPayload {
    /// Parses a map of dataset id to payload
    pub fn parse_map(json: &Value) -> Result<HashMap<String, DatasetPayload>> {
        serde_json::from_value(json.clone())
            .map_err(|e| MapError::Deserialization(format!("invalid dataset payload: {e}")))
    }

    /// Decodes into a dataset, using `decoder` for serialized bytes
    pub fn into_dataset(self, id: &str, decoder: &dyn RowDecoder) -> Result<Dataset> {
        let rows = match self {
            Self::Rows(rows) => rows,
            Self::Serialized(bytes) => decoder.decode(&bytes)?,
        };
        Ok(Dataset::new(id, rows))
    }
}

/// Decoder for a JSON object of equal-length column arrays:
/// `{"x": [1, 2], "y": [3, 4]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonColumnarDecoder;

impl RowDecoder for JsonColumnarDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Row>> {
        let columns: serde_json::Map<String, Value> = serde_json::from_slice(bytes)
            .map_err(|e| MapError::Deserialization(format!("invalid columnar payload: {e}")))?;

        let mut len = None;
        let mut arrays = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            let Value::Array(values) = column else {
                return Err(MapError::Deserialization(format!(
                    "column '{name}' is not an array"
                )));
            };
            match len {
                None => len = Some(values.len()),
                Some(n) if n != values.len() => {
                    return Err(MapError::Deserialization(format!(
                        "column '{name}' has {} values, expected {n}",
                        values.len()
                    )))
                }
                _ => {}
            }
            arrays.push((name, values));
        }

        let len = len.unwrap_or(0);
        let mut rows: Vec<Row> = (0..len).map(|_| Row::default()).collect();
        for (name, values) in arrays {
            for (row, value) in rows.iter_mut().zip(values) {
                row.insert(name.clone(), value);
            }
        }
        Ok(rows)
    }
}
