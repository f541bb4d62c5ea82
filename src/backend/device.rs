// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device enumeration and selection (first discrete GPU with
//   swapchain support wins, no scoring)
// - Graphics/present queue family discovery
// - Logical device + queue creation

use ash::extensions::khr;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

use super::{report, Instance, RenderError, RenderResult, Surface};

/// Device extensions every candidate must advertise.
pub fn required_device_extensions() -> [&'static CStr; 1] {
    [khr::Swapchain::name()]
}

/// One enumerable physical device, queried once at startup.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub extensions: BTreeSet<String>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
}

impl DeviceCandidate {
    /// Query every physical device the instance can see, in driver order.
    pub fn enumerate(instance: &Instance) -> RenderResult<Vec<Self>> {
        let devices = unsafe { instance.raw.enumerate_physical_devices() }
            .map_err(RenderError::DeviceCreationFailed)?;

        log::debug!("Found {} physical device(s)", devices.len());

        devices
            .into_iter()
            .map(|handle| {
                let properties = unsafe { instance.raw.get_physical_device_properties(handle) };
                let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned();

                let extensions = unsafe {
                    instance.raw.enumerate_device_extension_properties(handle)
                }
                .map_err(RenderError::DeviceCreationFailed)?
                .iter()
                .map(|ext| {
                    unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                        .to_string_lossy()
                        .into_owned()
                })
                .collect::<BTreeSet<_>>();

                let queue_families = unsafe {
                    instance.raw.get_physical_device_queue_family_properties(handle)
                };

                log::debug!(
                    "Device: {} ({}), API {}.{}.{}, {} extensions, {} queue families",
                    name,
                    report::device_type_name(properties.device_type),
                    vk::api_version_major(properties.api_version),
                    vk::api_version_minor(properties.api_version),
                    vk::api_version_patch(properties.api_version),
                    extensions.len(),
                    queue_families.len()
                );

                Ok(Self {
                    handle,
                    name,
                    device_type: properties.device_type,
                    extensions,
                    queue_families,
                })
            })
            .collect()
    }

    pub fn supports_extensions(&self, required: &[&CStr]) -> bool {
        required
            .iter()
            .all(|name| self.extensions.contains(&*name.to_string_lossy()))
    }

    /// Discrete GPU that can drive a swapchain.
    pub fn is_suitable(&self) -> bool {
        self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            && self.supports_extensions(&required_device_extensions())
    }
}

/// First suitable candidate in enumeration order.
pub fn select_device(candidates: &[DeviceCandidate]) -> RenderResult<&DeviceCandidate> {
    let chosen = candidates
        .iter()
        .find(|candidate| candidate.is_suitable())
        .ok_or(RenderError::NoSuitableDevice)?;

    log::info!("Selected GPU: {}", chosen.name);
    Ok(chosen)
}

/// Queue family slots as discovered; either may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolve(self) -> RenderResult<QueueFamilies> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Ok(QueueFamilies { graphics, present }),
            (graphics, present) => Err(RenderError::QueueFamilyIncomplete { graphics, present }),
        }
    }
}

/// Resolved graphics and present families; they may be the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct families, graphics first. One queue is created per entry.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Scan families in order, keeping the first graphics-capable family and the
/// first family `present_support` accepts.
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut present_support: F,
) -> RenderResult<QueueFamilyIndices>
where
    F: FnMut(u32) -> RenderResult<bool>,
{
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in (0u32..).zip(families) {
        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            log::debug!(
                "Queue family {} supports graphics ({} queues)",
                index,
                family.queue_count
            );
            indices.graphics = Some(index);
        }

        if indices.present.is_none() && present_support(index)? {
            log::debug!("Queue family {} supports presentation", index);
            indices.present = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Opened logical device with its queues.
///
/// Dropped last: waits for the device to go idle, then destroys it.
pub struct LogicalDevice {
    pub(crate) raw: ash::Device,
    pub(crate) swapchain_loader: khr::Swapchain,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub families: QueueFamilies,
}

impl LogicalDevice {
    /// Select a device for `surface` and open it.
    pub fn select(instance: &Instance, surface: &Surface) -> RenderResult<Self> {
        let candidates = DeviceCandidate::enumerate(instance)?;
        let chosen = select_device(&candidates)?;
        let families = find_queue_families(&chosen.queue_families, |index| {
            surface.supports_present(chosen.handle, index)
        })?
        .resolve()?;

        Self::new(instance, chosen.handle, families)
    }

    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        families: QueueFamilies,
    ) -> RenderResult<Self> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let extensions = required_device_extensions().map(CStr::as_ptr);
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let raw = unsafe { instance.raw.create_device(physical_device, &create_info, None) }
            .map_err(RenderError::DeviceCreationFailed)?;

        let graphics_queue = unsafe { raw.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { raw.get_device_queue(families.present, 0) };
        let swapchain_loader = khr::Swapchain::new(&instance.raw, &raw);

        log::info!(
            "Logical device created (graphics family {}, present family {})",
            families.graphics,
            families.present
        );

        Ok(Self {
            raw,
            swapchain_loader,
            physical_device,
            graphics_queue,
            present_queue,
            families,
        })
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.raw.device_wait_idle() }.map_err(RenderError::sync("device wait idle"))
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        log::info!("Destroying logical device...");
        if let Err(e) = self.wait_idle() {
            log::error!("{}", e);
        }
        unsafe { self.raw.destroy_device(None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn candidate(id: u64, device_type: vk::PhysicalDeviceType, swapchain: bool) -> DeviceCandidate {
        let mut extensions = BTreeSet::from(["VK_KHR_maintenance1".to_string()]);
        if swapchain {
            extensions.insert("VK_KHR_swapchain".to_string());
        }
        DeviceCandidate {
            handle: vk::PhysicalDevice::from_raw(id),
            name: format!("gpu{}", id),
            device_type,
            extensions,
            queue_families: vec![family(vk::QueueFlags::GRAPHICS)],
        }
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn first_discrete_device_with_swapchain_wins() {
        let candidates = vec![
            candidate(1, vk::PhysicalDeviceType::INTEGRATED_GPU, true),
            candidate(2, vk::PhysicalDeviceType::DISCRETE_GPU, false),
            candidate(3, vk::PhysicalDeviceType::DISCRETE_GPU, true),
            candidate(4, vk::PhysicalDeviceType::DISCRETE_GPU, true),
        ];

        for _ in 0..3 {
            let chosen = select_device(&candidates).unwrap();
            assert_eq!(chosen.handle.as_raw(), 3);
        }
    }

    #[test]
    fn no_discrete_device_is_an_error() {
        let candidates = vec![
            candidate(1, vk::PhysicalDeviceType::INTEGRATED_GPU, true),
            candidate(2, vk::PhysicalDeviceType::CPU, true),
            candidate(3, vk::PhysicalDeviceType::DISCRETE_GPU, false),
        ];
        assert!(matches!(
            select_device(&candidates),
            Err(RenderError::NoSuitableDevice)
        ));
        assert!(matches!(select_device(&[]), Err(RenderError::NoSuitableDevice)));
    }

    #[test]
    fn shared_graphics_and_present_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let resolved = find_queue_families(&families, |i| Ok(i >= 1))
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(resolved, QueueFamilies { graphics: 1, present: 1 });
        assert!(resolved.is_shared());
        assert_eq!(resolved.unique(), vec![1]);
    }

    #[test]
    fn separate_families_keep_first_of_each() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let resolved = find_queue_families(&families, |i| Ok(i == 1 || i == 3))
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(resolved, QueueFamilies { graphics: 0, present: 1 });
        assert_eq!(resolved.unique(), vec![0, 1]);
    }

    #[test]
    fn stops_querying_once_complete() {
        let families = [family(vk::QueueFlags::GRAPHICS); 4];
        let mut queried = Vec::new();
        find_queue_families(&families, |i| {
            queried.push(i);
            Ok(true)
        })
        .unwrap();
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn missing_present_family_is_incomplete() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, |_| Ok(false)).unwrap();
        assert!(!indices.is_complete());
        assert!(matches!(
            indices.resolve(),
            Err(RenderError::QueueFamilyIncomplete {
                graphics: Some(0),
                present: None,
            })
        ));
    }

    #[test]
    fn present_query_errors_propagate() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| {
            Err(RenderError::SurfaceQueryFailed {
                stage: "present support",
                result: vk::Result::ERROR_SURFACE_LOST_KHR,
            })
        });
        assert!(matches!(result, Err(RenderError::SurfaceQueryFailed { .. })));
    }
}
