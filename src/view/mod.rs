//! Camera, picking, labels and colours. Nothing in here touches the DOM.

/// Gestures, hit tests and the selection.
pub mod interaction;
/// Label placement and templates.
pub mod labels;
/// Per-label colours and hide toggles.
pub mod palette;
/// The camera.
pub mod viewport;

pub use interaction::{Button, CanvasAction, Command, Interaction, Menu, MenuKind, NodeAction, Scene, Selection};
pub use labels::{LabelScene, PlacedLabel};
pub use palette::{Palette, PaletteKind};
pub use viewport::Viewport;
