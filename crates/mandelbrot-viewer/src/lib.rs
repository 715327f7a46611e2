//! Interactive Mandelbrot viewer.
//!
//! Gestures mutate a `Viewport`; each frame its screen-to-plane map is uploaded to an
//! escape-time compute kernel whose output is blitted to the window.

pub mod app;
pub mod config;
pub mod frame;
pub mod gesture;
pub mod gpu;
pub mod input;
pub mod renderer;
pub mod ui;
pub mod viewport;
