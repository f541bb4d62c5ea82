// Ordered GPU object release
//
// Every device-level object is pushed here right after it is created.
// `release` waits for the device to go idle and then destroys the objects
// in exact reverse creation order, so a pipeline always goes before its
// render pass and a framebuffer before the image view it wraps.

use ash::vk;
use super::{LogicalDevice, RenderResult};

/// A device-level handle owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuObject {
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    PipelineLayout(vk::PipelineLayout),
    RenderPass(vk::RenderPass),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    /// Destroying the pool also frees its command buffers
    CommandPool(vk::CommandPool),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
}

/// Device operations needed to release GPU objects.
pub trait ReleaseDevice {
    fn wait_idle(&self) -> RenderResult<()>;

    /// Destroy one object. Callers guarantee the device is idle.
    fn destroy(&self, object: GpuObject);
}

#[derive(Debug, Default)]
pub struct TeardownList {
    objects: Vec<GpuObject>,
}

impl TeardownList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: GpuObject) {
        self.objects.push(object);
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Wait for the device to go idle, then destroy everything newest-first.
    ///
    /// A failed idle wait (usually a lost device) is returned, but the objects
    /// are still destroyed: nothing else will ever release them.
    pub fn release<D: ReleaseDevice>(&mut self, device: &D) -> RenderResult<()> {
        if self.objects.is_empty() {
            return Ok(());
        }

        let idle = device.wait_idle();
        if let Err(ref e) = idle {
            log::error!("Device idle wait failed before teardown: {}", e);
        }

        log::debug!("Releasing {} GPU objects", self.objects.len());
        while let Some(object) = self.objects.pop() {
            device.destroy(object);
        }

        idle
    }
}

impl Drop for TeardownList {
    fn drop(&mut self) {
        if !self.objects.is_empty() {
            log::warn!("{} GPU objects were never released", self.objects.len());
        }
    }
}

impl ReleaseDevice for LogicalDevice {
    fn wait_idle(&self) -> RenderResult<()> {
        LogicalDevice::wait_idle(self)
    }

    fn destroy(&self, object: GpuObject) {
        let device = &self.raw;
        unsafe {
            match object {
                GpuObject::Swapchain(h) => self.swapchain_loader.destroy_swapchain(h, None),
                GpuObject::ImageView(h) => device.destroy_image_view(h, None),
                GpuObject::PipelineLayout(h) => device.destroy_pipeline_layout(h, None),
                GpuObject::RenderPass(h) => device.destroy_render_pass(h, None),
                GpuObject::Pipeline(h) => device.destroy_pipeline(h, None),
                GpuObject::Framebuffer(h) => device.destroy_framebuffer(h, None),
                GpuObject::CommandPool(h) => device.destroy_command_pool(h, None),
                GpuObject::Semaphore(h) => device.destroy_semaphore(h, None),
                GpuObject::Fence(h) => device.destroy_fence(h, None),
            }
        }
    }
}
