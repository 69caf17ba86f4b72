mod buffer;
mod descriptor;
mod device;
mod image;
mod pipeline;
mod render_pass;
pub mod shader;

use ash::vk;

pub use buffer::Buffer;
pub use descriptor::{DescriptorIdentifier, DescriptorSet};
pub use device::Device;
pub use image::{Image, ImageDesc, ImageType};
pub use pipeline::{Pipeline, PipelineDesc, PipelineDescBuilder};
pub use render_pass::RenderPass;

/// Transitions `image` between two access states and reports the state the
/// image is in afterwards, for the caller to track.
pub fn image_pipeline_barrier(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: &Image,
    prev_access: vk_sync::AccessType,
    next_access: vk_sync::AccessType,
    discard_contents: bool,
) -> vk_sync::AccessType {
    vk_sync::cmd::pipeline_barrier(
        device.device(),
        command_buffer,
        None,
        &[],
        &[vk_sync::ImageBarrier {
            previous_accesses: &[prev_access],
            next_accesses: &[next_access],
            previous_layout: vk_sync::ImageLayout::Optimal,
            next_layout: vk_sync::ImageLayout::Optimal,
            discard_contents,
            src_queue_family_index: device.queue_family_index,
            dst_queue_family_index: device.queue_family_index,
            image: image.image,
            range: vk::ImageSubresourceRange {
                aspect_mask: image.desc.aspect_flags,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            },
        }],
    );

    next_access
}
