pub mod events;
pub mod router;

// Re-export the essential types
pub use events::{ClickOutcome, EventHandled, InputEvent, MouseButton};
pub use router::{EventRouter, HoverState, PopupState};
