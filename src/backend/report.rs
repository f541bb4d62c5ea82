// Enumeration reporting
//
// Turns Vulkan enums and flag sets into readable names for the debug log.

use ash::vk;

pub fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

pub fn present_mode_name(mode: vk::PresentModeKHR) -> &'static str {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => "Immediate",
        vk::PresentModeKHR::MAILBOX => "Mailbox",
        vk::PresentModeKHR::FIFO => "Fifo",
        vk::PresentModeKHR::FIFO_RELAXED => "Fifo relaxed",
        _ => "Unknown",
    }
}

const TRANSFORM_NAMES: &[(vk::SurfaceTransformFlagsKHR, &str)] = &[
    (vk::SurfaceTransformFlagsKHR::IDENTITY, "Identity"),
    (vk::SurfaceTransformFlagsKHR::ROTATE_90, "Rotate 90"),
    (vk::SurfaceTransformFlagsKHR::ROTATE_180, "Rotate 180"),
    (vk::SurfaceTransformFlagsKHR::ROTATE_270, "Rotate 270"),
    (vk::SurfaceTransformFlagsKHR::HORIZONTAL_MIRROR, "Horizontal mirror"),
    (vk::SurfaceTransformFlagsKHR::HORIZONTAL_MIRROR_ROTATE_90, "Horizontal mirror rotate 90"),
    (vk::SurfaceTransformFlagsKHR::HORIZONTAL_MIRROR_ROTATE_180, "Horizontal mirror rotate 180"),
    (vk::SurfaceTransformFlagsKHR::HORIZONTAL_MIRROR_ROTATE_270, "Horizontal mirror rotate 270"),
    (vk::SurfaceTransformFlagsKHR::INHERIT, "Inherit"),
];

const COMPOSITE_ALPHA_NAMES: &[(vk::CompositeAlphaFlagsKHR, &str)] = &[
    (vk::CompositeAlphaFlagsKHR::OPAQUE, "Opaque"),
    (vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED, "Pre-multiplied"),
    (vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED, "Post-multiplied"),
    (vk::CompositeAlphaFlagsKHR::INHERIT, "Inherit"),
];

const IMAGE_USAGE_NAMES: &[(vk::ImageUsageFlags, &str)] = &[
    (vk::ImageUsageFlags::TRANSFER_SRC, "Transfer source"),
    (vk::ImageUsageFlags::TRANSFER_DST, "Transfer destination"),
    (vk::ImageUsageFlags::SAMPLED, "Sampled"),
    (vk::ImageUsageFlags::STORAGE, "Storage"),
    (vk::ImageUsageFlags::COLOR_ATTACHMENT, "Color attachment"),
    (vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT, "Depth stencil attachment"),
    (vk::ImageUsageFlags::TRANSIENT_ATTACHMENT, "Transient attachment"),
    (vk::ImageUsageFlags::INPUT_ATTACHMENT, "Input attachment"),
];

pub fn transform_names(flags: vk::SurfaceTransformFlagsKHR) -> Vec<&'static str> {
    TRANSFORM_NAMES
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|&(_, name)| name)
        .collect()
}

pub fn composite_alpha_names(flags: vk::CompositeAlphaFlagsKHR) -> Vec<&'static str> {
    COMPOSITE_ALPHA_NAMES
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|&(_, name)| name)
        .collect()
}

pub fn image_usage_names(flags: vk::ImageUsageFlags) -> Vec<&'static str> {
    IMAGE_USAGE_NAMES
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|&(_, name)| name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flag_sets_in_declaration_order() {
        let flags = vk::SurfaceTransformFlagsKHR::INHERIT | vk::SurfaceTransformFlagsKHR::IDENTITY;
        assert_eq!(transform_names(flags), vec!["Identity", "Inherit"]);

        let usage = vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST;
        assert_eq!(image_usage_names(usage), vec!["Transfer destination", "Color attachment"]);

        assert!(composite_alpha_names(vk::CompositeAlphaFlagsKHR::empty()).is_empty());
    }

    #[test]
    fn names_enum_values() {
        assert_eq!(device_type_name(vk::PhysicalDeviceType::DISCRETE_GPU), "Discrete GPU");
        assert_eq!(device_type_name(vk::PhysicalDeviceType::OTHER), "Other");
        assert_eq!(present_mode_name(vk::PresentModeKHR::MAILBOX), "Mailbox");
    }
}
