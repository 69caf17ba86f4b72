use std::sync::Arc;

use ash::vk;

use crate::vulkan::{
    image_pipeline_barrier, Buffer, Device, ImageDesc, Pipeline, PipelineDesc,
    PipelineDescBuilder, RenderPass,
};
use crate::Texture;

pub type TextureId = usize;
pub type BufferId = usize;
pub type PipelineId = usize;

/// Fixed descriptor-set convention for every pipeline in this crate:
/// sampled input textures live in set 0, the pass uniform block in set 1.
pub const DESCRIPTOR_SET_INDEX_INPUT_TEXTURES: u32 = 0;
pub const DESCRIPTOR_SET_INDEX_UNIFORMS: u32 = 1;

pub const MAX_UNIFORMS_SIZE: usize = 2048;

pub struct GraphTexture {
    pub texture: Texture,
    pub prev_access: vk_sync::AccessType,
}

pub struct GraphResources {
    pub buffers: Vec<Buffer>,
    pub textures: Vec<GraphTexture>,
    pub pipelines: Vec<Pipeline>,
}

#[derive(Copy, Clone)]
pub struct Attachment {
    pub texture: TextureId,
    pub load_op: vk::AttachmentLoadOp,
}

#[derive(Copy, Clone)]
pub struct TextureResource {
    pub texture: TextureId,
    pub access_type: vk_sync::AccessType,
}

#[derive(Copy, Clone)]
pub struct UniformData {
    pub data: [u8; MAX_UNIFORMS_SIZE],
    pub size: u64,
}

impl GraphResources {
    fn new() -> GraphResources {
        GraphResources {
            buffers: vec![],
            textures: vec![],
            pipelines: vec![],
        }
    }

    pub fn buffer(&self, id: BufferId) -> &Buffer {
        &self.buffers[id]
    }

    pub fn texture(&self, id: TextureId) -> &GraphTexture {
        &self.textures[id]
    }

    pub fn pipeline(&self, id: PipelineId) -> &Pipeline {
        &self.pipelines[id]
    }
}

fn find_or_push_pipeline_desc(
    pipeline_descs: &mut Vec<PipelineDesc>,
    pipeline_desc: PipelineDesc,
) -> PipelineId {
    if let Some(existing_pipeline_id) = pipeline_descs
        .iter()
        .position(|desc| *desc == pipeline_desc)
    {
        existing_pipeline_id
    } else {
        pipeline_descs.push(pipeline_desc);
        pipeline_descs.len() - 1
    }
}

/// Holds every GPU resource the frame touches and replays the registered
/// passes with the layout transitions they need. Passes are re-registered
/// every frame; textures, buffers and pipelines persist across frames keyed
/// by their debug name or descriptor.
pub struct RenderGraph {
    pub passes: Vec<RenderPass>,
    pub resources: GraphResources,
    pub pipeline_descs: Vec<PipelineDesc>,
    pub device: Arc<Device>,
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        unsafe { self.device.ash_device.device_wait_idle().ok() };

        self.release_pass_descriptor_sets();
        for buffer in self.resources.buffers.drain(..) {
            buffer.destroy();
        }
        for pipeline in &self.resources.pipelines {
            pipeline.clean_vk_resources(&self.device);
        }
        for texture in &self.resources.textures {
            texture.texture.clean_vk_resources();
        }
    }
}

impl RenderGraph {
    pub fn new(device: Arc<Device>) -> Self {
        RenderGraph {
            passes: vec![],
            resources: GraphResources::new(),
            pipeline_descs: vec![],
            device,
        }
    }

    fn release_pass_descriptor_sets(&self) {
        for pass in &self.passes {
            if let Some(descriptor_set) = &pass.read_resources_descriptor_set {
                descriptor_set.clean_vk_resources();
            }
            if let Some(descriptor_set) = &pass.uniform_descriptor_set {
                descriptor_set.clean_vk_resources();
            }
        }
    }

    /// Drops the registered passes so the next frame can re-register them.
    pub fn clear(&mut self) {
        self.release_pass_descriptor_sets();
        self.passes.clear();
    }

    pub fn add_pass_from_desc(
        &mut self,
        name: &str,
        desc_builder: PipelineDescBuilder,
    ) -> RenderPassBuilder {
        let pipeline_handle =
            find_or_push_pipeline_desc(&mut self.pipeline_descs, desc_builder.build());

        RenderPassBuilder {
            name: name.to_string(),
            pipeline_handle,
            reads: vec![],
            writes: vec![],
            render_func: None,
            uniforms: None,
        }
    }

    /// Returns the render target with this debug name, creating it on first
    /// use.
    pub fn create_texture(
        &mut self,
        debug_name: &str,
        device: Arc<Device>,
        image_desc: ImageDesc,
    ) -> TextureId {
        self.resources
            .textures
            .iter()
            .position(|entry| entry.texture.image.debug_name == debug_name)
            .unwrap_or_else(|| {
                let texture = Texture::create(device, None, image_desc, debug_name);

                self.resources.textures.push(GraphTexture {
                    texture,
                    prev_access: vk_sync::AccessType::Nothing,
                });

                self.resources.textures.len() - 1
            })
    }

    /// Adopts a texture whose contents were already uploaded; it enters the
    /// graph in the sampled-read state `Texture::create` leaves it in.
    pub fn import_texture(&mut self, texture: Texture) -> TextureId {
        self.resources.textures.push(GraphTexture {
            texture,
            prev_access: vk_sync::AccessType::AnyShaderReadSampledImageOrUniformTexelBuffer,
        });

        self.resources.textures.len() - 1
    }

    pub fn get_or_create_buffer(
        &mut self,
        debug_name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        memory_location: gpu_allocator::MemoryLocation,
    ) -> BufferId {
        self.resources
            .buffers
            .iter()
            .position(|buffer| buffer.debug_name == debug_name)
            .unwrap_or_else(|| {
                let buffer = Buffer::new::<u8>(
                    self.device.clone(),
                    None,
                    size,
                    usage,
                    memory_location,
                    Some(String::from(debug_name)),
                );

                self.resources.buffers.push(buffer);

                self.resources.buffers.len() - 1
            })
    }

    /// Instantiates pipelines and per-pass descriptor sets for the registered
    /// passes and uploads their uniform data.
    pub fn prepare(&mut self) {
        for (i, desc) in self.pipeline_descs.iter().enumerate() {
            if self.resources.pipelines.len() <= i {
                self.resources
                    .pipelines
                    .push(Pipeline::new(&self.device, desc.clone()));
            }
        }

        for pass in &mut self.passes {
            pass.try_create_read_resources_descriptor_set(
                &self.resources.pipelines,
                &self.resources.textures,
            );
            pass.try_create_uniform_buffer_descriptor_set(
                &self.resources.pipelines,
                &self.resources.buffers,
            );
            pass.update_uniform_buffer_memory(&mut self.resources.buffers);
        }
    }

    pub fn render(&mut self, command_buffer: &vk::CommandBuffer) {
        for pass in &self.passes {
            for read in &pass.reads {
                let next_access = image_pipeline_barrier(
                    &self.device,
                    *command_buffer,
                    &self.resources.textures[read.texture].texture.image,
                    self.resources.textures[read.texture].prev_access,
                    read.access_type,
                    false,
                );

                self.resources
                    .textures
                    .get_mut(read.texture)
                    .unwrap()
                    .prev_access = next_access;
            }

            for write in &pass.writes {
                let next_access = image_pipeline_barrier(
                    &self.device,
                    *command_buffer,
                    &self.resources.textures[write.texture].texture.image,
                    self.resources.textures[write.texture].prev_access,
                    vk_sync::AccessType::ColorAttachmentWrite,
                    false,
                );

                self.resources
                    .textures
                    .get_mut(write.texture)
                    .unwrap()
                    .prev_access = next_access;
            }

            let write_attachments: Vec<(_, vk::AttachmentLoadOp)> = pass
                .writes
                .iter()
                .map(|write| {
                    (
                        self.resources.textures[write.texture].texture.image.clone(),
                        write.load_op,
                    )
                })
                .collect();

            let extent = match pass.writes.first() {
                Some(write) => vk::Extent2D {
                    width: self.resources.textures[write.texture].texture.image.width(),
                    height: self.resources.textures[write.texture]
                        .texture
                        .image
                        .height(),
                },
                None => vk::Extent2D {
                    width: 1,
                    height: 1,
                },
            };

            pass.prepare_render(
                command_buffer,
                write_attachments.as_slice(),
                extent,
                &self.resources.pipelines,
            );

            let pass_pipeline = &self.resources.pipelines[pass.pipeline_handle];
            unsafe {
                if let Some(read_textures_descriptor_set) = &pass.read_resources_descriptor_set {
                    self.device.device().cmd_bind_descriptor_sets(
                        *command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        pass_pipeline.pipeline_layout,
                        DESCRIPTOR_SET_INDEX_INPUT_TEXTURES,
                        &[read_textures_descriptor_set.handle],
                        &[],
                    );
                }

                if let Some(uniforms_descriptor_set) = &pass.uniform_descriptor_set {
                    self.device.device().cmd_bind_descriptor_sets(
                        *command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        pass_pipeline.pipeline_layout,
                        DESCRIPTOR_SET_INDEX_UNIFORMS,
                        &[uniforms_descriptor_set.handle],
                        &[],
                    );
                }
            }

            if let Some(render_func) = &pass.render_func {
                render_func(&self.device, command_buffer, pass, &self.resources);
            }

            unsafe { self.device.device().cmd_end_rendering(*command_buffer) };
        }
    }

    /// Copies a graph texture back into host memory, using the access state
    /// the graph tracked for it.
    pub fn read_back_texture(&self, id: TextureId) -> Vec<u8> {
        let graph_texture = &self.resources.textures[id];
        graph_texture
            .texture
            .image
            .read_pixels(&self.device, graph_texture.prev_access)
    }
}

pub struct RenderPassBuilder {
    pub name: String,
    pub pipeline_handle: PipelineId,
    pub reads: Vec<TextureResource>,
    pub writes: Vec<Attachment>,
    pub render_func:
        Option<Box<dyn Fn(&Device, &vk::CommandBuffer, &RenderPass, &GraphResources)>>,
    pub uniforms: Option<(String, UniformData)>,
}

impl RenderPassBuilder {
    pub fn read(mut self, resource_id: TextureId) -> Self {
        self.reads.push(TextureResource {
            texture: resource_id,
            access_type: vk_sync::AccessType::AnyShaderReadSampledImageOrUniformTexelBuffer,
        });
        self
    }

    pub fn write(mut self, resource_id: TextureId) -> Self {
        self.writes.push(Attachment {
            texture: resource_id,
            load_op: vk::AttachmentLoadOp::CLEAR,
        });
        self
    }

    pub fn load_write(mut self, resource_id: TextureId) -> Self {
        self.writes.push(Attachment {
            texture: resource_id,
            load_op: vk::AttachmentLoadOp::LOAD,
        });
        self
    }

    /// Snapshots `data` as the pass's uniform block. One block per pass;
    /// setting it again replaces the previous contents.
    pub fn uniforms<T: Copy>(mut self, name: &str, data: &T) -> Self {
        let size = std::mem::size_of::<T>();
        assert!(
            size <= MAX_UNIFORMS_SIZE,
            "Uniform block \"{}\" exceeds {} bytes",
            name,
            MAX_UNIFORMS_SIZE
        );

        let mut uniform_data = UniformData {
            data: [0; MAX_UNIFORMS_SIZE],
            size: size as u64,
        };
        let bytes = unsafe { std::slice::from_raw_parts(data as *const T as *const u8, size) };
        uniform_data.data[..size].copy_from_slice(bytes);

        self.uniforms = Some((name.to_string(), uniform_data));
        self
    }

    pub fn record_render(
        mut self,
        render_func: impl Fn(&Device, &vk::CommandBuffer, &RenderPass, &GraphResources) + 'static,
    ) -> Self {
        self.render_func.replace(Box::new(render_func));
        self
    }

    pub fn build(self, graph: &mut RenderGraph) {
        let uniform_buffer = self.uniforms.as_ref().map(|_| {
            graph.get_or_create_buffer(
                &format!("{}_uniform_buffer", self.name),
                MAX_UNIFORMS_SIZE as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                gpu_allocator::MemoryLocation::CpuToGpu,
            )
        });

        let pass = RenderPass::new(
            self.name,
            self.pipeline_handle,
            self.reads,
            self.writes,
            self.uniforms,
            uniform_buffer,
            self.render_func,
            graph.device.clone(),
        );

        graph.passes.push(pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_builder() -> RenderPassBuilder {
        RenderPassBuilder {
            name: "test_pass".to_string(),
            pipeline_handle: 0,
            reads: vec![],
            writes: vec![],
            render_func: None,
            uniforms: None,
        }
    }

    #[test]
    fn reads_and_writes_keep_declaration_order() {
        let builder = empty_builder().read(3).read(1).read(8).write(5).load_write(6);

        let reads: Vec<TextureId> = builder.reads.iter().map(|r| r.texture).collect();
        assert_eq!(reads, vec![3, 1, 8]);

        assert_eq!(builder.writes[0].texture, 5);
        assert_eq!(builder.writes[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(builder.writes[1].texture, 6);
        assert_eq!(builder.writes[1].load_op, vk::AttachmentLoadOp::LOAD);
    }

    #[test]
    fn uniforms_snapshot_raw_bytes() {
        #[repr(C)]
        #[derive(Copy, Clone)]
        struct Params {
            color: [f32; 4],
            flags: u32,
            _pad: [u32; 3],
        }

        let params = Params {
            color: [1.0, 0.5, 0.25, 0.0],
            flags: 7,
            _pad: [0; 3],
        };

        let builder = empty_builder().uniforms("shading_params", &params);
        let (name, data) = builder.uniforms.expect("uniforms were not recorded");

        assert_eq!(name, "shading_params");
        assert_eq!(data.size as usize, std::mem::size_of::<Params>());
        assert_eq!(f32::from_ne_bytes(data.data[0..4].try_into().unwrap()), 1.0);
        assert_eq!(
            f32::from_ne_bytes(data.data[4..8].try_into().unwrap()),
            0.5
        );
        assert_eq!(
            u32::from_ne_bytes(data.data[16..20].try_into().unwrap()),
            7
        );
    }

    #[test]
    fn setting_uniforms_twice_replaces_the_block() {
        let builder = empty_builder()
            .uniforms("shading_params", &1.0_f32)
            .uniforms("shading_params", &2.0_f32);

        let (_, data) = builder.uniforms.unwrap();
        assert_eq!(f32::from_ne_bytes(data.data[0..4].try_into().unwrap()), 2.0);
    }

    #[test]
    fn identical_pipeline_descs_share_one_handle() {
        let desc = || {
            PipelineDesc::builder()
                .vertex_path("assets/shaders/fullscreen_quad.vert")
                .fragment_path("assets/shaders/shading.frag")
                .build()
        };
        let other = PipelineDesc::builder()
            .vertex_path("assets/shaders/fullscreen_quad.vert")
            .fragment_path("assets/shaders/other.frag")
            .build();

        let mut descs = vec![];
        assert_eq!(find_or_push_pipeline_desc(&mut descs, desc()), 0);
        assert_eq!(find_or_push_pipeline_desc(&mut descs, desc()), 0);
        assert_eq!(find_or_push_pipeline_desc(&mut descs, other), 1);
        assert_eq!(descs.len(), 2);
    }
}
