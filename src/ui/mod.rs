//! Plain terminal output for everything that runs outside the dashboard.

pub mod plain_renderer;
pub mod renderer;
pub mod table;
pub mod theme;

pub use plain_renderer::PlainRenderer;
pub use renderer::{
    KeyValue, MessageBlock, Renderer, SpinnerHandle, StepState, TableSpec, UiError, UiResult,
};
pub use theme::{OutputMode, Theme};
