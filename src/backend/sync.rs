// Synchronization primitives
//
// One image-available semaphore, one render-finished semaphore and one
// in-flight fence shared by every frame resource. The single fence means
// the host never records frame N+1 while the GPU still works on frame N.

use ash::vk;
use super::{GpuObject, RenderError, RenderResult, TeardownList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncObjects {
    /// Signaled by acquire, waited on by the submit
    pub image_available: vk::Semaphore,
    /// Signaled by the submit, waited on by present
    pub render_finished: vk::Semaphore,
    /// Signaled when the submitted command buffer retires
    pub in_flight: vk::Fence,
}

impl SyncObjects {
    pub fn new(device: &ash::Device, teardown: &mut TeardownList) -> RenderResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signaled so the very first wait returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let image_available = unsafe { device.create_semaphore(&semaphore_info, None) }
            .map_err(RenderError::sync("create image-available semaphore"))?;
        teardown.push(GpuObject::Semaphore(image_available));

        let render_finished = unsafe { device.create_semaphore(&semaphore_info, None) }
            .map_err(RenderError::sync("create render-finished semaphore"))?;
        teardown.push(GpuObject::Semaphore(render_finished));

        let in_flight = unsafe { device.create_fence(&fence_info, None) }
            .map_err(RenderError::sync("create in-flight fence"))?;
        teardown.push(GpuObject::Fence(in_flight));

        log::debug!("Created frame synchronization objects");

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}
