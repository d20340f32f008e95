pub mod legend;
pub mod popup;

pub use legend::{Legend, LegendEntry, LegendReconciler, LegendUpdate};
pub use popup::{Popup, PopupBody, PopupContent, PopupRequest, PopupSlice, PopupTemplate};
