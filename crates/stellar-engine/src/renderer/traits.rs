//! Presenter trait: the collaborator that turns a `Frame` into pixels.
//!
//! The engine never touches a window. Backends (a software canvas, SDL, a
//! GPU swap chain) implement `Presenter` and own display-mode and device
//! scale negotiation.

use super::draw::Frame;

/// Presenter trait for display backends.
///
/// # Example Implementation
///
/// ```ignore
/// struct SdlPresenter {
///     canvas: sdl2::render::WindowCanvas,
///     background: sdl2::render::Texture,
/// }
///
/// impl Presenter for SdlPresenter {
///     fn backend(&self) -> &'static str { "sdl2" }
///
///     fn present(&mut self, frame: &Frame) {
///         // Restore dirty regions, blit draws, flip...
///     }
/// }
/// ```
pub trait Presenter {
    /// Backend identifier (e.g., "canvas", "sdl2", "wgpu").
    fn backend(&self) -> &'static str;

    /// Blit one frame and flip.
    fn present(&mut self, frame: &Frame);

    /// Handle a resize of the display surface. Hosts go through
    /// `Game::resize` (or a `Resize` input event under `Game::run`), which
    /// also makes the next frame a full redraw.
    fn resize(&mut self, _width: u32, _height: u32) {}
}
