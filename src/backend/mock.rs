// Host-side stand-in for a Vulkan device. Records every call so tests can
// check ordering; the "GPU" finishes each submission instantly. Calls that
// are made to fail are not recorded.

use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell};

use super::frame::{FrameDevice, FrameResource, FrameSynchronizer, FrameTarget, RecordPass, Submission};
use super::sync::SyncObjects;
use super::teardown::{GpuObject, ReleaseDevice};
use super::{RenderError, RenderResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire { image_index: u32 },
    Record {
        command_buffer: vk::CommandBuffer,
        pass: RecordPass,
    },
    Submit(Submission),
    Present { image_index: u32, wait: vk::Semaphore },
    WaitIdle,
    Destroy(GpuObject),
}

pub struct MockDevice {
    image_count: u32,
    calls: RefCell<Vec<Call>>,
    next_image: Cell<u32>,
    fence_signaled: Cell<bool>,
    record_attempts: Cell<usize>,
    submit_attempts: Cell<usize>,
    present_attempts: Cell<usize>,
    fail_record_at: Cell<Option<usize>>,
    fail_all_records: Cell<bool>,
    fail_submit_at: Cell<Option<usize>>,
    fail_present_at: Cell<Option<usize>>,
    fail_fence_wait: Cell<bool>,
    fail_wait_idle: Cell<bool>,
}

impl MockDevice {
    pub fn new(image_count: u32) -> Self {
        Self {
            image_count,
            calls: RefCell::new(Vec::new()),
            next_image: Cell::new(0),
            // Matches the pre-signaled fence
            fence_signaled: Cell::new(true),
            record_attempts: Cell::new(0),
            submit_attempts: Cell::new(0),
            present_attempts: Cell::new(0),
            fail_record_at: Cell::new(None),
            fail_all_records: Cell::new(false),
            fail_submit_at: Cell::new(None),
            fail_present_at: Cell::new(None),
            fail_fence_wait: Cell::new(false),
            fail_wait_idle: Cell::new(false),
        }
    }

    /// Make the `nth` recording (1-based) fail.
    pub fn fail_record(&self, nth: usize) {
        self.fail_record_at.set(Some(nth));
    }

    pub fn fail_all_records(&self) {
        self.fail_all_records.set(true);
    }

    /// Make the `nth` submission (1-based, release batches included) fail.
    pub fn fail_submit(&self, nth: usize) {
        self.fail_submit_at.set(Some(nth));
    }

    /// Make the `nth` present (1-based) fail.
    pub fn fail_present(&self, nth: usize) {
        self.fail_present_at.set(Some(nth));
    }

    pub fn fail_fence_wait(&self) {
        self.fail_fence_wait.set(true);
    }

    pub fn fail_wait_idle(&self) {
        self.fail_wait_idle.set(true);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn destroyed(&self) -> Vec<GpuObject> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Destroy(object) => Some(*object),
                _ => None,
            })
            .collect()
    }

    fn log(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl FrameDevice for MockDevice {
    fn wait_for_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        self.log(Call::WaitFence(fence));
        // An unsignaled fence with nothing pending would block forever
        if self.fail_fence_wait.get() || !self.fence_signaled.get() {
            return Err(RenderError::SynchronizationFailure {
                stage: "wait for in-flight fence",
                result: vk::Result::TIMEOUT,
            });
        }
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        self.log(Call::ResetFence(fence));
        self.fence_signaled.set(false);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _signal: vk::Semaphore,
    ) -> RenderResult<u32> {
        let image_index = self.next_image.get();
        self.next_image.set((image_index + 1) % self.image_count);
        self.log(Call::Acquire { image_index });
        Ok(image_index)
    }

    fn record(&self, command_buffer: vk::CommandBuffer, pass: &RecordPass) -> RenderResult<()> {
        let attempt = self.record_attempts.get() + 1;
        self.record_attempts.set(attempt);
        if self.fail_all_records.get() || self.fail_record_at.get() == Some(attempt) {
            return Err(RenderError::RecordFailed(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        self.log(Call::Record {
            command_buffer,
            pass: *pass,
        });
        Ok(())
    }

    fn submit(&self, submission: &Submission) -> RenderResult<()> {
        let attempt = self.submit_attempts.get() + 1;
        self.submit_attempts.set(attempt);
        if self.fail_submit_at.get() == Some(attempt) {
            return Err(RenderError::SubmitFailed(vk::Result::ERROR_DEVICE_LOST));
        }
        self.log(Call::Submit(*submission));
        self.fence_signaled.set(true);
        Ok(())
    }

    fn present(
        &self,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RenderResult<()> {
        let attempt = self.present_attempts.get() + 1;
        self.present_attempts.set(attempt);
        if self.fail_present_at.get() == Some(attempt) {
            return Err(RenderError::PresentFailed(vk::Result::ERROR_OUT_OF_DATE_KHR));
        }
        self.log(Call::Present { image_index, wait });
        Ok(())
    }
}

impl ReleaseDevice for MockDevice {
    fn wait_idle(&self) -> RenderResult<()> {
        self.log(Call::WaitIdle);
        if self.fail_wait_idle.get() {
            return Err(RenderError::sync("device wait idle")(vk::Result::ERROR_DEVICE_LOST));
        }
        Ok(())
    }

    fn destroy(&self, object: GpuObject) {
        self.log(Call::Destroy(object));
    }
}

/// A synchronizer over fake handles, one frame resource per image.
pub fn synchronizer(image_count: u32) -> FrameSynchronizer {
    let frames = (0..u64::from(image_count))
        .map(|i| {
            FrameResource::new(
                vk::Image::from_raw(100 + i),
                vk::ImageView::from_raw(200 + i),
                vk::Framebuffer::from_raw(300 + i),
                vk::CommandBuffer::from_raw(400 + i),
            )
        })
        .collect();

    let sync = SyncObjects {
        image_available: vk::Semaphore::from_raw(1),
        render_finished: vk::Semaphore::from_raw(2),
        in_flight: vk::Fence::from_raw(3),
    };

    let target = FrameTarget {
        swapchain: vk::SwapchainKHR::from_raw(10),
        render_pass: vk::RenderPass::from_raw(11),
        pipeline: vk::Pipeline::from_raw(12),
        extent: vk::Extent2D {
            width: 800,
            height: 600,
        },
        clear_color: [0.0, 0.0, 0.0, 1.0],
    };

    FrameSynchronizer::from_parts(frames, sync, target)
}
