// Renderer error taxonomy
//
// Construction-time variants abort startup. SubmitFailed, PresentFailed and
// RecordFailed are steady-state failures: the frame loop reports them and
// keeps going.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Required {kind} not supported: {}", .names.join(", "))]
    ExtensionUnsupported {
        kind: &'static str,
        names: Vec<String>,
    },

    #[error("Failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("No suitable GPU found (need a discrete GPU supporting VK_KHR_swapchain)")]
    NoSuitableDevice,

    #[error("Queue families incomplete (graphics: {graphics:?}, present: {present:?})")]
    QueueFamilyIncomplete {
        graphics: Option<u32>,
        present: Option<u32>,
    },

    #[error("Failed to create window surface: {0}")]
    SurfaceCreationFailed(vk::Result),

    /// Surface capability / support queries
    #[error("Surface query failed ({stage}): {result}")]
    SurfaceQueryFailed {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Failed to create swapchain ({stage}): {reason}")]
    SwapchainCreationFailed {
        stage: &'static str,
        reason: String,
    },

    #[error("Failed to load shader {}: {source}", .path.display())]
    ShaderLoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create pipeline ({stage}): {result}")]
    PipelineCreationFailed {
        stage: &'static str,
        result: vk::Result,
    },

    /// Framebuffers, command pool and command buffers
    #[error("Failed to set up frame resources ({stage}): {result}")]
    FrameSetupFailed {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("Synchronization failure ({stage}): {result}")]
    SynchronizationFailure {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("Command buffer recording failed: {0}")]
    RecordFailed(vk::Result),

    #[error("Queue submit failed: {0}")]
    SubmitFailed(vk::Result),

    #[error("Present failed: {0}")]
    PresentFailed(vk::Result),
}

impl RenderError {
    pub(crate) fn swapchain(stage: &'static str, result: vk::Result) -> Self {
        Self::SwapchainCreationFailed {
            stage,
            reason: result.to_string(),
        }
    }

    pub(crate) fn pipeline(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::PipelineCreationFailed { stage, result }
    }

    pub(crate) fn frame_setup(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::FrameSetupFailed { stage, result }
    }

    pub(crate) fn sync(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::SynchronizationFailure { stage, result }
    }

    /// True for failures the render loop reports and survives.
    pub fn is_steady_state(&self) -> bool {
        matches!(
            self,
            Self::RecordFailed(_) | Self::SubmitFailed(_) | Self::PresentFailed(_)
        )
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
