// =============================================================================
// VULKAN TRIANGLE
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  AppWindow (winit, pumped once per tick)                        │
// │    └── RenderLoop (events, frame cycle, frame rate)             │
// │          └── Renderer                                           │
// │                └── Instance, Surface, LogicalDevice             │
// │                └── Swapchain, Pipeline, FrameSynchronizer       │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Pump window events, stop on close request
// 2. Wait for the previous frame's fence
// 3. Acquire swapchain image
// 4. Record and submit the triangle draw
// 5. Present rendered image to screen
//
// =============================================================================

use anyhow::{Context, Result};
use std::path::PathBuf;

use vk_triangle::window::AppWindow;
use vk_triangle::{Config, RenderLoop, Renderer};

fn main() -> Result<()> {
    // Optional first argument: path to the config file
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref());

    init_logging(&config);
    log::info!("Starting Vulkan triangle");

    let mut window = AppWindow::new(&config.window)?;
    let mut renderer = Renderer::new(&window, &config.renderer_config())
        .context("Failed to initialize Vulkan")?;

    log::info!(
        "Rendering {}x{} with {} swapchain images",
        renderer.extent().width,
        renderer.extent().height,
        renderer.image_count()
    );

    let frames = RenderLoop::new(
        &mut window,
        &mut renderer,
        config.window.title.as_str(),
        config.debug.show_fps,
    )
    .run()
    .context("Render loop failed")?;

    let stats = renderer.stats();
    log::info!(
        "{} frames: {} submitted, {} presented, {} failed, {} released",
        frames,
        stats.submissions,
        stats.presentations,
        stats.failures,
        stats.released
    );

    // The surface must go before the window it was created from
    drop(renderer);
    drop(window);
    Ok(())
}

/// Initialize logging. RUST_LOG wins; otherwise debug mode logs at Debug.
fn init_logging(config: &Config) {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(if config.debug.enabled {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
    }
    builder.init();
}
