// Vulkan instance and presentation surface
//
// Responsibilities:
// - Load the Vulkan library and create the instance
// - Verify required instance extensions/layers before asking the driver
// - Validation layer + debug messenger in debug mode
// - Create the window surface from raw platform handles

use ash::extensions::{ext::DebugUtils, khr};
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CStr, CString};

use super::{RenderError, RenderResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Something that can host a presentation surface, usually a native window.
pub trait SurfaceSource {
    fn display_handle(&self) -> RawDisplayHandle;
    fn window_handle(&self) -> RawWindowHandle;
    /// Current drawable size in pixels.
    fn inner_size(&self) -> (u32, u32);
}

/// Vulkan instance with optional validation messenger.
pub struct Instance {
    pub(crate) raw: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub(crate) entry: Entry,
}

impl Instance {
    /// Create the instance with every extension the display needs for surfaces.
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `debug` - Enable the Khronos validation layer and route its messages to `log`
    /// * `display` - Display the surface will be created on
    pub fn new(app_name: &str, debug: bool, display: RawDisplayHandle) -> RenderResult<Self> {
        log::info!("Creating Vulkan instance: {}", app_name);

        let entry = unsafe { Entry::load() }?;

        if let Ok(Some(version)) = entry.try_enumerate_instance_version() {
            log::debug!(
                "Loader supports Vulkan {}.{}.{}",
                vk::api_version_major(version),
                vk::api_version_minor(version),
                vk::api_version_patch(version)
            );
        }

        let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
            .map_err(RenderError::SurfaceCreationFailed)?
            .to_vec();
        if debug {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layers: Vec<*const c_char> = if debug {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        Self::check_support(&entry, &extensions, &layers)?;

        let app_name_cstr =
            CString::new(app_name).unwrap_or_else(|_| CString::from(c"vk-triangle"));
        let engine_name = c"vk-triangle";

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let raw = unsafe { entry.create_instance(&create_info, None) }
            .map_err(RenderError::InstanceCreationFailed)?;

        let debug_utils = if debug {
            match Self::setup_debug_messenger(&entry, &raw) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { raw.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            raw,
            debug_utils,
            entry,
        })
    }

    fn check_support(
        entry: &Entry,
        extensions: &[*const c_char],
        layers: &[*const c_char],
    ) -> RenderResult<()> {
        let supported_extensions = entry
            .enumerate_instance_extension_properties(None)
            .map_err(RenderError::InstanceCreationFailed)?;
        let supported_extensions: Vec<&CStr> = supported_extensions
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();
        for name in &supported_extensions {
            log::debug!("Supported instance extension: {}", name.to_string_lossy());
        }

        let required: Vec<&CStr> = extensions
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();
        let missing = missing_names(&required, &supported_extensions);
        if !missing.is_empty() {
            return Err(RenderError::ExtensionUnsupported {
                kind: "instance extension",
                names: missing,
            });
        }

        let supported_layers = entry
            .enumerate_instance_layer_properties()
            .map_err(RenderError::InstanceCreationFailed)?;
        let supported_layers: Vec<&CStr> = supported_layers
            .iter()
            .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) })
            .collect();

        let required: Vec<&CStr> = layers
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();
        let missing = missing_names(&required, &supported_layers);
        if !missing.is_empty() {
            return Err(RenderError::ExtensionUnsupported {
                kind: "instance layer",
                names: missing,
            });
        }

        Ok(())
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> RenderResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(RenderError::InstanceCreationFailed)?;

        log::debug!("Debug messenger created");
        Ok((debug_utils, messenger))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.raw.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

/// Presentation surface bound to one window.
pub struct Surface {
    loader: khr::Surface,
    pub(crate) handle: vk::SurfaceKHR,
}

impl Surface {
    pub fn new(instance: &Instance, source: &impl SurfaceSource) -> RenderResult<Self> {
        let handle = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.raw,
                source.display_handle(),
                source.window_handle(),
                None,
            )
        }
        .map_err(RenderError::SurfaceCreationFailed)?;

        log::debug!("Window surface created");

        Ok(Self {
            loader: khr::Surface::new(&instance.entry, &instance.raw),
            handle,
        })
    }

    /// Whether `queue_family` on `physical_device` can present to this surface.
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> RenderResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.handle)
        }
        .map_err(|result| RenderError::SurfaceQueryFailed {
            stage: "present support",
            result,
        })
    }

    pub(crate) fn loader(&self) -> &khr::Surface {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
        log::debug!("Window surface destroyed");
    }
}

/// Names in `required` that do not appear in `available`, in request order.
pub fn missing_names(required: &[&CStr], available: &[&CStr]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(*name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

// Route validation layer messages into the log
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_missing_names() {
        let required = [c"VK_KHR_surface", c"VK_EXT_debug_utils", c"VK_KHR_xlib_surface"];
        let available = [c"VK_KHR_xlib_surface", c"VK_KHR_surface"];
        assert_eq!(missing_names(&required, &available), vec!["VK_EXT_debug_utils"]);
        assert!(missing_names(&[], &available).is_empty());
    }
}
