pub mod canvas;
pub mod draw;
pub mod traits;
pub mod view;

// Re-export key types for convenient access
pub use draw::{DrawCommand, Frame, Rect};
pub use traits::Presenter;
