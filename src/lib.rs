//! Vulkan triangle renderer.
//!
//! `backend` holds the Vulkan stages (device selection, swapchain, pipeline,
//! frame synchronization). `renderer` wires them together for one window and
//! `render_loop` drives it until the window closes.

pub mod backend;
pub mod config;
pub mod render_loop;
pub mod renderer;
pub mod window;

pub use backend::{RenderError, RenderResult};
pub use config::Config;
pub use render_loop::{FrameCycle, LoopWindow, RenderLoop};
pub use renderer::{Renderer, RendererConfig};
