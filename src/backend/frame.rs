// Frame synchronizer
//
// Owns one FrameResource per swapchain image plus the shared sync objects,
// and runs the per-tick cycle:
//
//   wait fence -> reset fence -> acquire -> record -> submit -> present
//
// Host-side blocking happens only in the fence wait and inside acquire.
// GPU-side ordering (acquire -> submit -> present) is carried entirely by
// the two semaphores.
//
// When recording or submitting fails after an image was acquired, the image
// is handed back with an empty batch plus a present, so neither the image nor
// the image-available signal is left dangling.
//
// Known limitation: a single fence gates every frame, so CPU and GPU never
// overlap across frames even when the swapchain holds several images.

use ash::vk;
use super::sync::SyncObjects;
use super::{
    GpuObject, LogicalDevice, PipelineState, RenderError, RenderResult, SwapchainState,
    TeardownList,
};

/// Device calls issued by the frame cycle.
pub trait FrameDevice {
    fn wait_for_fence(&self, fence: vk::Fence) -> RenderResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()>;
    /// Returns the index of the next swapchain image; `signal` fires once it is ready.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RenderResult<u32>;
    fn record(&self, command_buffer: vk::CommandBuffer, pass: &RecordPass) -> RenderResult<()>;
    fn submit(&self, submission: &Submission) -> RenderResult<()>;
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RenderResult<()>;
}

/// Everything needed to record one frame's commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordPass {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// `None` for a release batch that only moves the semaphores and the fence
    pub command_buffer: Option<vk::CommandBuffer>,
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

/// Lifecycle of a frame's command buffer within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Recording,
    Submitted,
    Presented,
}

/// Working set for one swapchain image.
#[derive(Debug)]
pub struct FrameResource {
    /// Owned by the swapchain
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub command_buffer: vk::CommandBuffer,
    state: FrameState,
}

impl FrameResource {
    pub fn new(
        image: vk::Image,
        view: vk::ImageView,
        framebuffer: vk::Framebuffer,
        command_buffer: vk::CommandBuffer,
    ) -> Self {
        Self {
            image,
            view,
            framebuffer,
            command_buffer,
            state: FrameState::Idle,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }
}

/// Handles that stay fixed for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
    pub swapchain: vk::SwapchainKHR,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Result of one completed tick.
#[derive(Debug)]
pub enum FrameOutcome {
    Presented { image_index: u32 },
    /// Record, submit or present failed. Reported, never retried.
    Failed { image_index: u32, error: RenderError },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub submissions: u64,
    pub presentations: u64,
    pub failures: u64,
    /// Acquired images handed back without being rendered
    pub released: u64,
}

pub struct FrameSynchronizer {
    frames: Vec<FrameResource>,
    sync: SyncObjects,
    target: FrameTarget,
    /// False when the fence was reset but no submission will signal it
    fence_pending: bool,
    stats: FrameStats,
}

impl FrameSynchronizer {
    /// Create framebuffers, command buffers and sync objects for every swapchain image.
    pub fn new(
        device: &LogicalDevice,
        swapchain: &SwapchainState,
        views: &[vk::ImageView],
        pipeline: &PipelineState,
        clear_color: [f32; 4],
        teardown: &mut TeardownList,
    ) -> RenderResult<Self> {
        debug_assert_eq!(views.len(), swapchain.images.len());

        let framebuffers = create_framebuffers(
            &device.raw,
            views,
            pipeline.render_pass,
            swapchain.extent,
            teardown,
        )?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.families.graphics)
            // RESET: command buffers are re-recorded every frame
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.raw.create_command_pool(&pool_info, None) }
            .map_err(RenderError::frame_setup("create command pool"))?;
        teardown.push(GpuObject::CommandPool(command_pool));

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(swapchain.images.len() as u32);
        let command_buffers = unsafe { device.raw.allocate_command_buffers(&alloc_info) }
            .map_err(RenderError::frame_setup("allocate command buffers"))?;

        let sync = SyncObjects::new(&device.raw, teardown)?;

        let frames = swapchain
            .images
            .iter()
            .zip(views)
            .zip(framebuffers)
            .zip(command_buffers)
            .map(|(((&image, &view), framebuffer), command_buffer)| {
                FrameResource::new(image, view, framebuffer, command_buffer)
            })
            .collect::<Vec<_>>();

        log::info!("Created {} frame resources", frames.len());

        Ok(Self::from_parts(
            frames,
            sync,
            FrameTarget {
                swapchain: swapchain.handle,
                render_pass: pipeline.render_pass,
                pipeline: pipeline.pipeline,
                extent: swapchain.extent,
                clear_color,
            },
        ))
    }

    pub fn from_parts(frames: Vec<FrameResource>, sync: SyncObjects, target: FrameTarget) -> Self {
        Self {
            frames,
            sync,
            target,
            fence_pending: true,
            stats: FrameStats::default(),
        }
    }

    pub fn frames(&self) -> &[FrameResource] {
        &self.frames
    }

    pub fn sync(&self) -> &SyncObjects {
        &self.sync
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Run one full wait/acquire/record/submit/present cycle.
    ///
    /// Fence and acquire failures are returned as errors. Record, submit and
    /// present failures come back as `FrameOutcome::Failed` so the caller can
    /// report them and keep looping.
    pub fn render_frame<D: FrameDevice>(&mut self, device: &D) -> RenderResult<FrameOutcome> {
        let sync = self.sync;
        let target = self.target;

        // Wait for the previous submission to retire
        if self.fence_pending {
            device.wait_for_fence(sync.in_flight)?;
            device.reset_fence(sync.in_flight)?;
            self.fence_pending = false;

            // The fence covers every earlier submission
            for frame in &mut self.frames {
                frame.state = FrameState::Idle;
            }
        }

        let image_index = device.acquire_next_image(target.swapchain, sync.image_available)?;
        let index = image_index as usize;
        let frame = self
            .frames
            .get_mut(index)
            .ok_or(RenderError::SynchronizationFailure {
                stage: "acquired image index out of range",
                result: vk::Result::ERROR_UNKNOWN,
            })?;
        debug_assert_eq!(frame.state, FrameState::Idle);

        frame.state = FrameState::Recording;
        let command_buffer = frame.command_buffer;
        let pass = RecordPass {
            render_pass: target.render_pass,
            framebuffer: frame.framebuffer,
            pipeline: target.pipeline,
            extent: target.extent,
            clear_color: target.clear_color,
        };
        if let Err(error) = device.record(command_buffer, &pass) {
            frame.state = FrameState::Idle;
            return self.release_image(device, image_index, error);
        }

        if let Err(error) = device.submit(&self.batch(Some(command_buffer))) {
            // Nothing was queued, so the command buffer is free again
            self.frames[index].state = FrameState::Idle;
            return self.release_image(device, image_index, error);
        }
        self.frames[index].state = FrameState::Submitted;
        self.fence_pending = true;
        self.stats.submissions += 1;

        match device.present(target.swapchain, image_index, sync.render_finished) {
            Ok(()) => {
                // Returns to Idle once the next fence wait retires the submission
                self.frames[index].state = FrameState::Presented;
                self.stats.presentations += 1;
                Ok(FrameOutcome::Presented { image_index })
            }
            Err(error) => {
                // Stays Submitted: the queued work still has to retire
                self.stats.failures += 1;
                Ok(FrameOutcome::Failed { image_index, error })
            }
        }
    }

    /// Submission wired to the shared semaphores and fence.
    fn batch(&self, command_buffer: Option<vk::CommandBuffer>) -> Submission {
        Submission {
            command_buffer,
            wait_semaphore: self.sync.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: self.sync.render_finished,
            fence: self.sync.in_flight,
        }
    }

    /// Hand an acquired but unrendered image back to the presentation engine.
    ///
    /// An empty batch consumes the image-available signal and signals
    /// render-finished and the fence; presenting then returns the image. If
    /// the queue rejects the empty batch too, the image stays acquired and
    /// the acquire semaphore stays signaled, so `error` ends the loop.
    fn release_image<D: FrameDevice>(
        &mut self,
        device: &D,
        image_index: u32,
        error: RenderError,
    ) -> RenderResult<FrameOutcome> {
        self.stats.failures += 1;

        if let Err(release) = device.submit(&self.batch(None)) {
            log::error!("Could not release image {}: {}", image_index, release);
            return Err(error);
        }
        self.fence_pending = true;
        self.stats.released += 1;

        let returned = device.present(self.target.swapchain, image_index, self.sync.render_finished);
        if let Err(present) = returned {
            log::warn!("Presenting released image {} failed: {}", image_index, present);
        }

        Ok(FrameOutcome::Failed { image_index, error })
    }
}

fn create_framebuffers(
    device: &ash::Device,
    views: &[vk::ImageView],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    teardown: &mut TeardownList,
) -> RenderResult<Vec<vk::Framebuffer>> {
    views
        .iter()
        .map(|&view| {
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None) }
                .map_err(RenderError::frame_setup("create framebuffer"))?;
            teardown.push(GpuObject::Framebuffer(framebuffer));
            Ok(framebuffer)
        })
        .collect()
}

impl FrameDevice for LogicalDevice {
    fn wait_for_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        unsafe { self.raw.wait_for_fences(&[fence], true, u64::MAX) }
            .map_err(RenderError::sync("wait for in-flight fence"))
    }

    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        unsafe { self.raw.reset_fences(&[fence]) }
            .map_err(RenderError::sync("reset in-flight fence"))
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RenderResult<u32> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, signal, vk::Fence::null())
        };

        // Suboptimal images are still presentable; there is no recreation path
        match result {
            Ok((index, _suboptimal)) => Ok(index),
            Err(result) => Err(RenderError::SynchronizationFailure {
                stage: "acquire next image",
                result,
            }),
        }
    }

    fn record(&self, command_buffer: vk::CommandBuffer, pass: &RecordPass) -> RenderResult<()> {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: pass.clear_color,
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(pass.render_pass)
            .framebuffer(pass.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: pass.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.raw
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(RenderError::RecordFailed)?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            self.raw
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RenderError::RecordFailed)?;

            self.raw.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            self.raw.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pass.pipeline,
            );
            // Geometry comes from gl_VertexIndex in the vertex shader
            self.raw.cmd_draw(command_buffer, 3, 1, 0, 0);
            self.raw.cmd_end_render_pass(command_buffer);

            self.raw
                .end_command_buffer(command_buffer)
                .map_err(RenderError::RecordFailed)
        }
    }

    fn submit(&self, submission: &Submission) -> RenderResult<()> {
        let wait_semaphores = [submission.wait_semaphore];
        let wait_stages = [submission.wait_stage];
        let command_buffers = submission.command_buffer.as_slice();
        let signal_semaphores = [submission.signal_semaphore];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.raw
                .queue_submit(self.graphics_queue, &[submit_info.build()], submission.fence)
        }
        .map_err(RenderError::SubmitFailed)
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RenderResult<()> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // OUT_OF_DATE is reported like any other error
        unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present_info)
        }
        .map(|_suboptimal| ())
        .map_err(RenderError::PresentFailed)
    }
}
