pub mod color;
pub mod scale;

pub use color::{ColorScheme, SerializableColor};
pub use scale::{ColorEncoder, ColorRange, ColorScaleOptions, Scale, ScaleEngine, ScaleKind, SizeEncoder};
