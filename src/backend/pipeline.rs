// Graphics pipeline creation
//
// The pipeline is fixed: no vertex buffers (positions come from
// gl_VertexIndex), a triangle list covering the swapchain extent, one color
// attachment and no depth. Creation order is shader modules, layout, render
// pass, pipeline; the modules are gone again before `new` returns.

use ash::vk;
use std::path::PathBuf;

use super::shader::{ShaderLoader, ShaderModule};
use super::{GpuObject, LogicalDevice, RenderError, RenderResult, SwapchainState, TeardownList};

const ENTRY_POINT: &std::ffi::CStr = c"main";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub cull_mode: vk::CullModeFlags,
}

/// Handles created by the pipeline builder. Destruction goes through the
/// teardown list.
#[derive(Debug, Clone, Copy)]
pub struct PipelineState {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
}

impl PipelineState {
    pub fn new(
        device: &LogicalDevice,
        swapchain: &SwapchainState,
        config: &PipelineConfig,
        loader: &impl ShaderLoader,
        teardown: &mut TeardownList,
    ) -> RenderResult<Self> {
        log::info!(
            "Building pipeline: {} + {}",
            config.vertex_shader.display(),
            config.fragment_shader.display()
        );

        // Dropped at the end of this function whatever the outcome
        let vert = ShaderModule::load(device, loader, &config.vertex_shader)?;
        let frag = ShaderModule::load(device, loader, &config.fragment_shader)?;

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { device.raw.create_pipeline_layout(&layout_info, None) }
            .map_err(RenderError::pipeline("create pipeline layout"))?;
        teardown.push(GpuObject::PipelineLayout(layout));

        let render_pass = create_render_pass(&device.raw, swapchain.format)?;
        teardown.push(GpuObject::RenderPass(render_pass));

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert.handle)
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag.handle)
                .name(ENTRY_POINT)
                .build(),
        ];

        let fixed = FixedFunction::new(swapchain.extent, config.cull_mode);

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [fixed.viewport];
        let scissors = [fixed.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments = [fixed.blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&fixed.rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            device
                .raw
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| RenderError::pipeline("create graphics pipeline")(e))?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or(RenderError::PipelineCreationFailed {
                stage: "create graphics pipeline",
                result: vk::Result::ERROR_UNKNOWN,
            })?;
        teardown.push(GpuObject::Pipeline(pipeline));

        log::info!("Graphics pipeline created");

        Ok(Self {
            layout,
            render_pass,
            pipeline,
        })
    }
}

/// Fixed-function state that depends only on the extent and cull mode.
#[derive(Clone, Copy)]
pub struct FixedFunction {
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub rasterizer: vk::PipelineRasterizationStateCreateInfo,
    pub blend_attachment: vk::PipelineColorBlendAttachmentState,
}

impl FixedFunction {
    pub fn new(extent: vk::Extent2D, cull_mode: vk::CullModeFlags) -> Self {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .build();

        let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();

        Self {
            viewport,
            scissor,
            rasterizer,
            blend_attachment,
        }
    }
}

/// The single color attachment: cleared on load, presented afterwards.
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

fn create_render_pass(device: &ash::Device, format: vk::Format) -> RenderResult<vk::RenderPass> {
    let attachments = [color_attachment(format)];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];

    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .build()];

    // The layout transition must wait for the acquire semaphore's stage
    let dependencies = [vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build()];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&render_pass_info, None) }
        .map_err(RenderError::pipeline("create render pass"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_and_scissor_cover_the_extent() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let fixed = FixedFunction::new(extent, vk::CullModeFlags::BACK);

        assert_eq!(fixed.viewport.width, 800.0);
        assert_eq!(fixed.viewport.height, 600.0);
        assert_eq!((fixed.viewport.min_depth, fixed.viewport.max_depth), (0.0, 1.0));
        assert_eq!(fixed.scissor.offset, vk::Offset2D { x: 0, y: 0 });
        assert_eq!(fixed.scissor.extent, extent);
    }

    #[test]
    fn rasterizer_fills_clockwise_with_configured_culling() {
        let extent = vk::Extent2D {
            width: 1,
            height: 1,
        };
        for cull in [
            vk::CullModeFlags::NONE,
            vk::CullModeFlags::BACK,
            vk::CullModeFlags::FRONT_AND_BACK,
        ] {
            let r = FixedFunction::new(extent, cull).rasterizer;
            assert_eq!(r.cull_mode, cull);
            assert_eq!(r.front_face, vk::FrontFace::CLOCKWISE);
            assert_eq!(r.polygon_mode, vk::PolygonMode::FILL);
            assert_eq!(r.depth_clamp_enable, vk::FALSE);
            assert_eq!(r.line_width, 1.0);
        }
    }

    #[test]
    fn blending_is_off_with_full_write_mask() {
        let blend = FixedFunction::new(vk::Extent2D::default(), vk::CullModeFlags::BACK)
            .blend_attachment;
        assert_eq!(blend.blend_enable, vk::FALSE);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn color_attachment_goes_from_undefined_to_present() {
        let attachment = color_attachment(vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }
}
