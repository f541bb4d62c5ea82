// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash. Instance, surface and device own themselves and
// release in Drop; everything created on the device is tracked by a
// TeardownList and released in reverse creation order.

pub mod device;
pub mod error;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod report;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod teardown;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{LogicalDevice, QueueFamilies};
pub use error::{RenderError, RenderResult};
pub use frame::{FrameDevice, FrameOutcome, FrameStats, FrameSynchronizer};
pub use instance::{Instance, Surface, SurfaceSource};
pub use pipeline::{PipelineConfig, PipelineState};
pub use shader::{FsShaderLoader, ShaderLoader};
pub use swapchain::SwapchainState;
pub use teardown::{GpuObject, ReleaseDevice, TeardownList};
