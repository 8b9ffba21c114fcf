mod component;
mod overlay;
mod render;
mod state;
mod types;

pub use component::GraphVisCanvas;
pub use types::UiAction;
