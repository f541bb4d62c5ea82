// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Selection policies are plain functions over the surface's reported
// capabilities so they can be checked without a GPU.

use ash::vk;

use super::device::QueueFamilies;
use super::{report, GpuObject, LogicalDevice, RenderError, RenderResult, Surface, TeardownList};

/// Canonical surface format: 32-bit BGRA in the sRGB non-linear color space.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// What the surface supports on the chosen device.
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query(surface: &Surface, physical_device: vk::PhysicalDevice) -> RenderResult<Self> {
        let loader = surface.loader();
        let query_failed =
            |stage: &'static str| move |result: vk::Result| RenderError::SurfaceQueryFailed { stage, result };

        let capabilities = unsafe {
            loader.get_physical_device_surface_capabilities(physical_device, surface.handle)
        }
        .map_err(query_failed("surface capabilities"))?;

        let formats = unsafe {
            loader.get_physical_device_surface_formats(physical_device, surface.handle)
        }
        .map_err(query_failed("surface formats"))?;

        let present_modes = unsafe {
            loader.get_physical_device_surface_present_modes(physical_device, surface.handle)
        }
        .map_err(query_failed("present modes"))?;

        let support = Self {
            capabilities,
            formats,
            present_modes,
        };
        support.log_details();
        Ok(support)
    }

    fn log_details(&self) {
        let caps = &self.capabilities;
        log::debug!("Swapchain capabilities:");
        log::debug!("  image count: {}..{}", caps.min_image_count, caps.max_image_count);
        log::debug!(
            "  current extent: {}x{}",
            caps.current_extent.width,
            caps.current_extent.height
        );
        log::debug!(
            "  extent range: {}x{} .. {}x{}",
            caps.min_image_extent.width,
            caps.min_image_extent.height,
            caps.max_image_extent.width,
            caps.max_image_extent.height
        );
        log::debug!("  max array layers: {}", caps.max_image_array_layers);
        log::debug!(
            "  supported transforms: {:?}",
            report::transform_names(caps.supported_transforms)
        );
        log::debug!(
            "  current transform: {:?}",
            report::transform_names(caps.current_transform)
        );
        log::debug!(
            "  composite alpha: {:?}",
            report::composite_alpha_names(caps.supported_composite_alpha)
        );
        log::debug!(
            "  usage flags: {:?}",
            report::image_usage_names(caps.supported_usage_flags)
        );

        log::debug!("{} surface formats supported", self.formats.len());
        for format in &self.formats {
            log::debug!("  {:?} / {:?}", format.format, format.color_space);
        }

        let modes: Vec<_> = self
            .present_modes
            .iter()
            .map(|&mode| report::present_mode_name(mode))
            .collect();
        log::debug!("Present modes: {:?}", modes);
    }
}

/// Pick the surface format.
///
/// A lone `UNDEFINED` entry means the surface has no preference, so the
/// canonical format is used. Otherwise the canonical format wins wherever it
/// appears, and failing that the first reported format is taken as-is.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RenderResult<vk::SurfaceFormatKHR> {
    match formats {
        [] => Err(RenderError::SwapchainCreationFailed {
            stage: "choose surface format",
            reason: "surface reports no formats".to_string(),
        }),
        [only] if only.format == vk::Format::UNDEFINED => Ok(PREFERRED_SURFACE_FORMAT),
        [first, ..] => Ok(formats
            .iter()
            .copied()
            .find(|&f| f == PREFERRED_SURFACE_FORMAT)
            .unwrap_or(*first)),
    }
}

/// MAILBOX if offered anywhere, else IMMEDIATE if offered, else FIFO.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut best = vk::PresentModeKHR::FIFO; // FIFO is always supported
    for &mode in present_modes {
        if mode == vk::PresentModeKHR::MAILBOX {
            return mode;
        }
        if mode == vk::PresentModeKHR::IMMEDIATE {
            best = mode;
        }
    }
    best
}

/// The surface's fixed extent if it has one, else the request clamped to its limits.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One image more than the minimum, capped by the maximum. A maximum of zero
/// means the surface has no upper limit.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

/// Images are shared concurrently only when graphics and present live in
/// different families.
pub fn choose_sharing(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// The presentable image chain.
#[derive(Debug, Clone)]
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Owned by the swapchain, in presentation-engine order
    pub images: Vec<vk::Image>,
}

impl SwapchainState {
    pub fn new(
        device: &LogicalDevice,
        surface: &Surface,
        width: u32,
        height: u32,
        teardown: &mut TeardownList,
    ) -> RenderResult<Self> {
        log::info!("Creating swapchain: {}x{}", width, height);

        let support = SwapchainSupport::query(surface, device.physical_device)?;
        let caps = &support.capabilities;

        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(caps, width, height);
        let image_count = choose_image_count(caps);
        let (sharing_mode, queue_family_indices) = choose_sharing(device.families);

        log::info!(
            "Present mode: {}, format: {:?}, extent: {}x{}, sharing: {:?}",
            report::present_mode_name(present_mode),
            surface_format.format,
            extent.width,
            extent.height,
            sharing_mode
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let handle = unsafe { device.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| RenderError::swapchain("create swapchain", e))?;
        teardown.push(GpuObject::Swapchain(handle));

        let images = unsafe { device.swapchain_loader.get_swapchain_images(handle) }
            .map_err(|e| RenderError::swapchain("get swapchain images", e))?;

        log::info!("Created swapchain with {} images", images.len());

        Ok(Self {
            handle,
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode,
            extent,
            images,
        })
    }

    /// Create one color view per swapchain image, in image order.
    pub fn create_image_views(
        &self,
        device: &LogicalDevice,
        teardown: &mut TeardownList,
    ) -> RenderResult<Vec<vk::ImageView>> {
        self.images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                let view = unsafe { device.raw.create_image_view(&create_info, None) }
                    .map_err(|e| RenderError::swapchain("create image view", e))?;
                teardown.push(GpuObject::ImageView(view));
                Ok(view)
            })
            .collect()
    }
}
