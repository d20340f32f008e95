pub mod culling;
pub mod index;

pub use culling::ViewportCuller;
pub use index::{RowEndpoint, RowIndex};
