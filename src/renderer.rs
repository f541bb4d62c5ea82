// Renderer - owns every Vulkan object for one window
//
// Construction runs the stages in order:
//
//   instance -> surface -> device -> swapchain + views -> pipeline -> frames
//
// Field order matters for Drop: the teardown list is released explicitly,
// then the device, surface and instance drop in that order.

use ash::vk;

use crate::backend::frame::FrameStats;
use crate::backend::{
    FrameOutcome, FrameSynchronizer, FsShaderLoader, Instance, LogicalDevice, PipelineConfig,
    PipelineState, RenderResult, ShaderLoader, Surface, SurfaceSource, SwapchainState,
    TeardownList,
};
use crate::render_loop::FrameCycle;

/// Everything the renderer needs from the application.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub app_name: String,
    /// Validation layers and debug messenger
    pub debug: bool,
    pub clear_color: [f32; 4],
    pub pipeline: PipelineConfig,
}

pub struct Renderer {
    frames: FrameSynchronizer,
    swapchain: SwapchainState,
    teardown: TeardownList,
    device: LogicalDevice,
    // Must outlive the device
    _surface: Surface,
    _instance: Instance,
}

impl Renderer {
    /// Build a renderer for `window`, loading shaders from the filesystem.
    pub fn new(window: &impl SurfaceSource, config: &RendererConfig) -> RenderResult<Self> {
        Self::with_loader(window, config, &FsShaderLoader::new())
    }

    pub fn with_loader(
        window: &impl SurfaceSource,
        config: &RendererConfig,
        loader: &impl ShaderLoader,
    ) -> RenderResult<Self> {
        log::info!("Initializing Vulkan...");

        let instance = Instance::new(&config.app_name, config.debug, window.display_handle())?;
        let surface = Surface::new(&instance, window)?;
        let device = LogicalDevice::select(&instance, &surface)?;

        let mut teardown = TeardownList::new();
        let stages = Self::build_stages(&device, &surface, window, config, loader, &mut teardown);
        let (swapchain, frames) = match stages {
            Ok(stages) => stages,
            Err(e) => {
                // Device, surface and instance drop on return
                if let Err(idle) = teardown.release(&device) {
                    log::error!("{}", idle);
                }
                return Err(e);
            }
        };

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            frames,
            swapchain,
            teardown,
            device,
            _surface: surface,
            _instance: instance,
        })
    }

    fn build_stages(
        device: &LogicalDevice,
        surface: &Surface,
        window: &impl SurfaceSource,
        config: &RendererConfig,
        loader: &impl ShaderLoader,
        teardown: &mut TeardownList,
    ) -> RenderResult<(SwapchainState, FrameSynchronizer)> {
        let (width, height) = window.inner_size();
        let swapchain = SwapchainState::new(device, surface, width, height, teardown)?;
        let views = swapchain.create_image_views(device, teardown)?;

        let pipeline = PipelineState::new(device, &swapchain, &config.pipeline, loader, teardown)?;

        let frames = FrameSynchronizer::new(
            device,
            &swapchain,
            &views,
            &pipeline,
            config.clear_color,
            teardown,
        )?;

        Ok((swapchain, frames))
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    pub fn stats(&self) -> FrameStats {
        self.frames.stats()
    }
}

impl FrameCycle for Renderer {
    fn render_frame(&mut self) -> RenderResult<FrameOutcome> {
        self.frames.render_frame(&self.device)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        if let Err(e) = self.teardown.release(&self.device) {
            log::error!("{}", e);
        }
        log::info!("Cleanup complete");
    }
}
