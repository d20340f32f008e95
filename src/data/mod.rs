pub mod dataset;
pub mod deserialization;

pub use dataset::{Dataset, Row, TaxId};
pub use deserialization::{DatasetPayload, JsonColumnarDecoder, RowDecoder};
