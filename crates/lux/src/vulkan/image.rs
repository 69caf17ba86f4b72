use std::sync::Arc;

use ash::vk;

use super::{image_pipeline_barrier, Buffer, Device};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    Tex2d,
    Cube,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub format: vk::Format,
    pub image_type: ImageType,
    pub aspect_flags: vk::ImageAspectFlags,
    pub usage: vk::ImageUsageFlags,
    pub mip_levels: u32,
}

impl ImageDesc {
    fn common_usage_flags() -> vk::ImageUsageFlags {
        vk::ImageUsageFlags::TRANSFER_DST
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::COLOR_ATTACHMENT
    }

    pub fn new_2d(width: u32, height: u32, format: vk::Format) -> Self {
        ImageDesc {
            width,
            height,
            array_layers: 1,
            format,
            image_type: ImageType::Tex2d,
            aspect_flags: vk::ImageAspectFlags::COLOR,
            usage: Self::common_usage_flags() | vk::ImageUsageFlags::TRANSFER_SRC,
            mip_levels: 1,
        }
    }

    pub fn new_cubemap(width: u32, height: u32, format: vk::Format) -> Self {
        ImageDesc {
            width,
            height,
            array_layers: 6,
            format,
            image_type: ImageType::Cube,
            aspect_flags: vk::ImageAspectFlags::COLOR,
            usage: Self::common_usage_flags(),
            mip_levels: 1,
        }
    }

    pub fn bytes_per_texel(&self) -> u32 {
        match self.format {
            vk::Format::R32G32B32A32_SFLOAT => 16,
            vk::Format::R16G16_SFLOAT => 4,
            vk::Format::R32_SFLOAT => 4,
            vk::Format::R8G8B8A8_UNORM => 4,
            format => unimplemented!("No texel size known for {:?}", format),
        }
    }
}

#[derive(Clone)]
pub struct Image {
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub device_memory: vk::DeviceMemory,
    pub desc: ImageDesc,
    pub debug_name: String,
    pub device: Arc<Device>,
}

impl Image {
    pub fn new_from_desc(device: Arc<Device>, desc: ImageDesc) -> Image {
        unsafe {
            let image_create_info = vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format: desc.format,
                extent: vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                },
                mip_levels: desc.mip_levels,
                array_layers: desc.array_layers,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: desc.usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                flags: if desc.image_type == ImageType::Cube {
                    vk::ImageCreateFlags::CUBE_COMPATIBLE
                } else {
                    vk::ImageCreateFlags::empty()
                },
                ..Default::default()
            };
            let image = device
                .ash_device
                .create_image(&image_create_info, None)
                .expect("Unable to create image");

            let image_memory_req = device.ash_device.get_image_memory_requirements(image);
            let image_memory_index = device
                .find_memory_type_index(&image_memory_req, vk::MemoryPropertyFlags::DEVICE_LOCAL)
                .expect("Unable to find suitable memory index for image");
            let image_allocate_info = vk::MemoryAllocateInfo {
                allocation_size: image_memory_req.size,
                memory_type_index: image_memory_index,
                ..Default::default()
            };
            let device_memory = device
                .ash_device
                .allocate_memory(&image_allocate_info, None)
                .expect("Unable to allocate image device memory");

            device
                .ash_device
                .bind_image_memory(image, device_memory, 0)
                .expect("Unable to bind device memory to image");

            let view_type = match desc.image_type {
                ImageType::Tex2d => vk::ImageViewType::TYPE_2D,
                ImageType::Cube => vk::ImageViewType::CUBE,
            };

            let image_view = Image::create_image_view(
                &device,
                image,
                desc.format,
                desc.aspect_flags,
                view_type,
                desc.array_layers,
                desc.mip_levels,
            );

            Image {
                image,
                image_view,
                device_memory,
                desc,
                debug_name: "unnamed_image".to_string(),
                device,
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_image_view(
        device: &Arc<Device>,
        image: vk::Image,
        format: vk::Format,
        aspect_flags: vk::ImageAspectFlags,
        view_type: vk::ImageViewType,
        layer_count: u32,
        mip_levels: u32,
    ) -> vk::ImageView {
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_flags,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count,
            });

        unsafe {
            device
                .ash_device
                .create_image_view(&view_info, None)
                .expect("Unable to create image view")
        }
    }

    pub fn set_debug_name(&mut self, debug_name: &str) {
        self.debug_name = debug_name.to_string();
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Copies the first layer of the image into host memory and returns the
    /// raw texel bytes. The image is left in the access state it was in.
    pub fn read_pixels(&self, device: &Arc<Device>, current_access: vk_sync::AccessType) -> Vec<u8> {
        let size = (self.desc.width * self.desc.height * self.desc.bytes_per_texel()) as u64;
        let readback_buffer = Buffer::new::<u8>(
            device.clone(),
            None,
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            gpu_allocator::MemoryLocation::GpuToCpu,
            Some(String::from("readback_buffer")),
        );

        device.execute_and_submit(|cb| {
            image_pipeline_barrier(
                device,
                cb,
                self,
                current_access,
                vk_sync::AccessType::TransferRead,
                false,
            );

            let region = vk::BufferImageCopy::builder()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: self.desc.aspect_flags,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width: self.desc.width,
                    height: self.desc.height,
                    depth: 1,
                })
                .build();

            unsafe {
                device.ash_device.cmd_copy_image_to_buffer(
                    cb,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    readback_buffer.buffer,
                    &[region],
                );
            }

            image_pipeline_barrier(
                device,
                cb,
                self,
                vk_sync::AccessType::TransferRead,
                current_access,
                false,
            );
        });

        let mut pixels = vec![0u8; size as usize];
        unsafe {
            let mapped = readback_buffer
                .allocation
                .mapped_ptr()
                .expect("Readback buffer is not host visible")
                .as_ptr() as *const u8;
            std::ptr::copy_nonoverlapping(mapped, pixels.as_mut_ptr(), size as usize);
        }

        readback_buffer.destroy();

        pixels
    }

    pub fn clean_vk_resources(&self) {
        unsafe {
            self.device
                .ash_device
                .destroy_image_view(self.image_view, None);
            self.device.ash_device.destroy_image(self.image, None);
            self.device.ash_device.free_memory(self.device_memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_desc_2d_defaults() {
        let desc = ImageDesc::new_2d(1280, 720, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(desc.array_layers, 1);
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.image_type, ImageType::Tex2d);
        assert!(desc.usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(desc.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));
    }

    #[test]
    fn image_desc_cubemap_has_six_layers() {
        let desc = ImageDesc::new_cubemap(1, 1, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(desc.array_layers, 6);
        assert_eq!(desc.image_type, ImageType::Cube);
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(
            ImageDesc::new_2d(1, 1, vk::Format::R32G32B32A32_SFLOAT).bytes_per_texel(),
            16
        );
        assert_eq!(
            ImageDesc::new_2d(1, 1, vk::Format::R32_SFLOAT).bytes_per_texel(),
            4
        );
        assert_eq!(
            ImageDesc::new_2d(1, 1, vk::Format::R8G8B8A8_UNORM).bytes_per_texel(),
            4
        );
    }
}
