use std::ffi::CStr;
use std::io::Cursor;

use ash::vk;
use log::debug;

use super::shader::{
    compile_glsl_shader, create_layouts_from_reflection, create_shader_module,
    reflect_shader_stages, ShaderReflect,
};
use super::Device;

/// Everything needed to build (and identify) a graphics pipeline. Two descs
/// compare equal when they would produce interchangeable pipelines, which is
/// what the graph's pipeline cache keys on.
#[derive(Clone, Debug, Default)]
pub struct PipelineDesc {
    pub vertex_path: &'static str,
    pub fragment_path: &'static str,
    pub topology: vk::PrimitiveTopology,
    pub vertex_input_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_input_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub color_attachment_formats: Vec<vk::Format>,
}

impl PartialEq for PipelineDesc {
    fn eq(&self, other: &Self) -> bool {
        // The vertex layout follows from the shader pair, so paths, topology
        // and attachment formats identify the pipeline.
        self.vertex_path == other.vertex_path
            && self.fragment_path == other.fragment_path
            && self.topology == other.topology
            && self.color_attachment_formats == other.color_attachment_formats
    }
}

impl PipelineDesc {
    pub fn builder() -> PipelineDescBuilder {
        PipelineDescBuilder::default()
    }
}

#[derive(Default)]
pub struct PipelineDescBuilder {
    desc: PipelineDesc,
}

impl PipelineDescBuilder {
    pub fn vertex_path(mut self, path: &'static str) -> Self {
        self.desc.vertex_path = path;
        self
    }

    pub fn fragment_path(mut self, path: &'static str) -> Self {
        self.desc.fragment_path = path;
        self
    }

    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.desc.topology = topology;
        self
    }

    pub fn vertex_bindings(
        mut self,
        bindings: Vec<vk::VertexInputBindingDescription>,
        attributes: Vec<vk::VertexInputAttributeDescription>,
    ) -> Self {
        self.desc.vertex_input_bindings = bindings;
        self.desc.vertex_input_attributes = attributes;
        self
    }

    pub fn color_attachment_formats(mut self, formats: Vec<vk::Format>) -> Self {
        self.desc.color_attachment_formats = formats;
        self
    }

    pub fn build(self) -> PipelineDesc {
        self.desc
    }
}

pub struct Pipeline {
    pub handle: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    pub reflection: ShaderReflect,
    pub pipeline_desc: PipelineDesc,
}

impl Pipeline {
    pub fn new(device: &Device, pipeline_desc: PipelineDesc) -> Pipeline {
        debug!(
            "Creating pipeline: {} + {}",
            pipeline_desc.vertex_path, pipeline_desc.fragment_path
        );

        let vertex_spirv = compile_glsl_shader(pipeline_desc.vertex_path, shaderc::ShaderKind::Vertex);
        let fragment_spirv =
            compile_glsl_shader(pipeline_desc.fragment_path, shaderc::ShaderKind::Fragment);

        let reflection = reflect_shader_stages(&[&vertex_spirv, &fragment_spirv]);
        let (pipeline_layout, descriptor_set_layouts) =
            create_layouts_from_reflection(device.device(), &reflection);

        let vertex_module = create_shader_module(Cursor::new(&vertex_spirv[..]), device.device());
        let fragment_module =
            create_shader_module(Cursor::new(&fragment_spirv[..]), device.device());

        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(entry_point)
                .build(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&pipeline_desc.vertex_input_bindings)
            .vertex_attribute_descriptions(&pipeline_desc.vertex_input_attributes);

        let input_assembly_state =
            vk::PipelineInputAssemblyStateCreateInfo::builder().topology(pipeline_desc.topology);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = pipeline_desc
            .color_attachment_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::builder()
                    .blend_enable(false)
                    .color_write_mask(
                        vk::ColorComponentFlags::R
                            | vk::ColorComponentFlags::G
                            | vk::ColorComponentFlags::B
                            | vk::ColorComponentFlags::A,
                    )
                    .build()
            })
            .collect();

        let color_blend_state =
            vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        // Rendering is done with dynamic rendering; the pipeline carries the
        // attachment formats instead of a render pass object. No depth format
        // is set, the passes in this crate do not use a depth attachment.
        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&pipeline_desc.color_attachment_formats);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .push_next(&mut rendering_info)
            .build();

        let handle = unsafe {
            device
                .device()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .expect("Error creating graphics pipeline")[0]
        };

        unsafe {
            device.device().destroy_shader_module(vertex_module, None);
            device.device().destroy_shader_module(fragment_module, None);
        }

        Pipeline {
            handle,
            pipeline_layout,
            descriptor_set_layouts,
            reflection,
            pipeline_desc,
        }
    }

    pub fn clean_vk_resources(&self, device: &Device) {
        unsafe {
            device.ash_device.destroy_pipeline(self.handle, None);
            device
                .ash_device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            for layout in &self.descriptor_set_layouts {
                device.ash_device.destroy_descriptor_set_layout(*layout, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shading_desc() -> PipelineDesc {
        PipelineDesc::builder()
            .vertex_path("assets/shaders/fullscreen_quad.vert")
            .fragment_path("assets/shaders/shading.frag")
            .topology(vk::PrimitiveTopology::TRIANGLE_STRIP)
            .color_attachment_formats(vec![vk::Format::R32G32B32A32_SFLOAT; 2])
            .build()
    }

    #[test]
    fn descs_with_same_shaders_compare_equal() {
        assert_eq!(shading_desc(), shading_desc());
    }

    #[test]
    fn descs_with_different_attachments_compare_unequal() {
        let mut other = shading_desc();
        other.color_attachment_formats = vec![vk::Format::R32G32B32A32_SFLOAT];
        assert_ne!(shading_desc(), other);

        let mut other = shading_desc();
        other.fragment_path = "assets/shaders/other.frag";
        assert_ne!(shading_desc(), other);
    }

    #[test]
    fn builder_fills_every_field() {
        let desc = shading_desc();
        assert_eq!(desc.vertex_path, "assets/shaders/fullscreen_quad.vert");
        assert_eq!(desc.topology, vk::PrimitiveTopology::TRIANGLE_STRIP);
        assert_eq!(desc.color_attachment_formats.len(), 2);
    }
}
