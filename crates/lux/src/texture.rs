use std::sync::Arc;

use ash::vk;

use crate::vulkan::{image_pipeline_barrier, Buffer, Device, Image, ImageDesc};

pub struct Texture {
    pub device: Arc<Device>,
    pub image: Image,
    pub sampler: vk::Sampler,
    pub descriptor_info: vk::DescriptorImageInfo,
}

/// Decodes an image file into tightly packed RGBA8 pixels. A missing or
/// unreadable file is fatal; the lookup textures loaded through this are
/// required for shading.
pub fn load_image_rgba(path: &str) -> (Vec<u8>, u32, u32) {
    let image = match image::open(path) {
        Ok(image) => image,
        Err(err) => panic!("Failed to load image: {} ({})", path, err),
    };

    let image = image.to_rgba8();
    let (width, height) = (image.width(), image.height());

    (image.into_raw(), width, height)
}

impl Texture {
    pub fn load(device: Arc<Device>, path: &str) -> Texture {
        let (image_data, width, height) = load_image_rgba(path);

        Texture::create(
            device,
            Some(&image_data),
            ImageDesc::new_2d(width, height, vk::Format::R8G8B8A8_UNORM),
            path,
        )
    }

    /// Creates a texture, uploads `pixels` when given (layers tightly packed
    /// for cubemaps) and leaves the image ready for sampling.
    pub fn create(
        device: Arc<Device>,
        pixels: Option<&[u8]>,
        image_desc: ImageDesc,
        debug_name: &str,
    ) -> Texture {
        let mut image = Image::new_from_desc(device.clone(), image_desc);
        image.set_debug_name(debug_name);

        // Staging buffers must outlive the submission; they are destroyed
        // once the upload has drained the queue.
        let mut staging_buffers: Vec<Buffer> = vec![];
        device.execute_and_submit(|cb| {
            image_pipeline_barrier(
                &device,
                cb,
                &image,
                vk_sync::AccessType::Nothing,
                vk_sync::AccessType::TransferWrite,
                true,
            );

            if let Some(pixels) = pixels {
                let staging_buffer = Buffer::new(
                    device.clone(),
                    Some(pixels),
                    std::mem::size_of_val(pixels) as u64,
                    vk::BufferUsageFlags::TRANSFER_SRC,
                    gpu_allocator::MemoryLocation::CpuToGpu,
                    Some(format!("staging_{}", debug_name)),
                );

                staging_buffer.copy_to_image(cb, &image);
                staging_buffers.push(staging_buffer);
            }

            image_pipeline_barrier(
                &device,
                cb,
                &image,
                vk_sync::AccessType::TransferWrite,
                vk_sync::AccessType::AnyShaderReadSampledImageOrUniformTexelBuffer,
                false,
            );
        });

        while let Some(staging_buffer) = staging_buffers.pop() {
            staging_buffer.destroy();
        }

        let sampler_info = vk::SamplerCreateInfo {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            max_anisotropy: 1.0,
            border_color: vk::BorderColor::FLOAT_OPAQUE_WHITE,
            compare_op: vk::CompareOp::NEVER,
            min_lod: 0.0,
            max_lod: image_desc.mip_levels as f32,
            ..Default::default()
        };

        let sampler = unsafe {
            device
                .ash_device
                .create_sampler(&sampler_info, None)
                .expect("Unable to create sampler")
        };

        let descriptor_info = vk::DescriptorImageInfo {
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            image_view: image.image_view,
            sampler,
        };

        Texture {
            device,
            image,
            sampler,
            descriptor_info,
        }
    }

    pub fn clean_vk_resources(&self) {
        self.image.clean_vk_resources();

        unsafe {
            self.device.ash_device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Failed to load image")]
    fn missing_texture_file_is_fatal() {
        load_image_rgba("assets/textures/does_not_exist.png");
    }
}
