use std::sync::Arc;

use ash::vk;

use crate::render_graph::{
    Attachment, BufferId, GraphResources, GraphTexture, PipelineId, TextureResource, UniformData,
    DESCRIPTOR_SET_INDEX_INPUT_TEXTURES, DESCRIPTOR_SET_INDEX_UNIFORMS,
};

use super::descriptor::{DescriptorIdentifier, DescriptorSet};
use super::{Buffer, Device, Image, Pipeline};

pub struct RenderPass {
    pub name: String,
    pub pipeline_handle: PipelineId,
    pub render_func:
        Option<Box<dyn Fn(&Device, &vk::CommandBuffer, &RenderPass, &GraphResources)>>,
    pub reads: Vec<TextureResource>,
    pub writes: Vec<Attachment>,
    pub uniforms: Option<(String, UniformData)>,
    pub uniform_buffer: Option<BufferId>,
    pub read_resources_descriptor_set: Option<DescriptorSet>,
    pub uniform_descriptor_set: Option<DescriptorSet>,
    device: Arc<Device>,
}

impl RenderPass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        pipeline_handle: PipelineId,
        reads: Vec<TextureResource>,
        writes: Vec<Attachment>,
        uniforms: Option<(String, UniformData)>,
        uniform_buffer: Option<BufferId>,
        render_func: Option<
            Box<dyn Fn(&Device, &vk::CommandBuffer, &RenderPass, &GraphResources)>,
        >,
        device: Arc<Device>,
    ) -> RenderPass {
        RenderPass {
            name,
            pipeline_handle,
            render_func,
            reads,
            writes,
            uniforms,
            uniform_buffer,
            read_resources_descriptor_set: None,
            uniform_descriptor_set: None,
            device,
        }
    }

    /// Creates the input-texture descriptor set. Reads are bound in
    /// declaration order, which must match the shader's binding order in the
    /// input-texture set.
    pub fn try_create_read_resources_descriptor_set(
        &mut self,
        pipelines: &[Pipeline],
        textures: &[GraphTexture],
    ) {
        if self.reads.is_empty() || self.read_resources_descriptor_set.is_some() {
            return;
        }

        let pipeline = &pipelines[self.pipeline_handle];
        let descriptor_set_read_resources = DescriptorSet::new(
            self.device.clone(),
            pipeline.descriptor_set_layouts[DESCRIPTOR_SET_INDEX_INPUT_TEXTURES as usize],
            pipeline
                .reflection
                .get_set_mappings(DESCRIPTOR_SET_INDEX_INPUT_TEXTURES),
        );

        for (idx, read) in self.reads.iter().enumerate() {
            descriptor_set_read_resources.write_combined_image(
                DescriptorIdentifier::Index(idx as u32),
                &textures[read.texture].texture,
            );
        }

        self.read_resources_descriptor_set
            .replace(descriptor_set_read_resources);
    }

    pub fn try_create_uniform_buffer_descriptor_set(
        &mut self,
        pipelines: &[Pipeline],
        buffers: &[Buffer],
    ) {
        if self.uniforms.is_none() || self.uniform_descriptor_set.is_some() {
            return;
        }

        let pipeline = &pipelines[self.pipeline_handle];
        let descriptor_set = DescriptorSet::new(
            self.device.clone(),
            pipeline.descriptor_set_layouts[DESCRIPTOR_SET_INDEX_UNIFORMS as usize],
            pipeline
                .reflection
                .get_set_mappings(DESCRIPTOR_SET_INDEX_UNIFORMS),
        );

        let buffer_id = self
            .uniform_buffer
            .expect("Pass with uniforms has no uniform buffer");
        descriptor_set.write_uniform_buffer(DescriptorIdentifier::Index(0), &buffers[buffer_id]);

        self.uniform_descriptor_set.replace(descriptor_set);
    }

    pub fn update_uniform_buffer_memory(&self, buffers: &mut [Buffer]) {
        if let (Some(buffer_id), Some((_, uniform_data))) = (self.uniform_buffer, &self.uniforms) {
            buffers[buffer_id].update_memory(&uniform_data.data[..uniform_data.size as usize]);
        }
    }

    pub fn prepare_render(
        &self,
        command_buffer: &vk::CommandBuffer,
        color_attachments: &[(Image, vk::AttachmentLoadOp)],
        extent: vk::Extent2D,
        pipelines: &[Pipeline],
    ) {
        let color_attachments = color_attachments
            .iter()
            .map(|(image, load_op)| {
                vk::RenderingAttachmentInfo::builder()
                    .image_view(image.image_view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(*load_op)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: [0.0, 0.0, 0.0, 1.0],
                        },
                    })
                    .build()
            })
            .collect::<Vec<_>>();

        let rendering_info = vk::RenderingInfo::builder()
            .layer_count(1)
            .color_attachments(&color_attachments)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .build();

        unsafe {
            self.device
                .device()
                .cmd_begin_rendering(*command_buffer, &rendering_info);

            self.device.device().cmd_bind_pipeline(
                *command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipelines[self.pipeline_handle].handle,
            );

            // Flipped viewport so the world keeps a y-up orientation.
            let viewports = [vk::Viewport {
                x: 0.0,
                y: extent.height as f32,
                width: extent.width as f32,
                height: -(extent.height as f32),
                min_depth: 0.0,
                max_depth: 1.0,
            }];

            let scissors = [vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            }];

            self.device
                .device()
                .cmd_set_viewport(*command_buffer, 0, &viewports);
            self.device
                .device()
                .cmd_set_scissor(*command_buffer, 0, &scissors);
        }
    }
}
