use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc};
use log::debug;

use super::{Device, Image};

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub allocation: Allocation,
    pub memory_req: vk::MemoryRequirements,
    pub memory_location: gpu_allocator::MemoryLocation,
    pub size: u64,
    pub debug_name: String,
    pub device: Arc<Device>,
}

impl Buffer {
    pub fn new<T: Copy>(
        device: Arc<Device>,
        initial_data: Option<&[T]>,
        size: u64,
        usage_flags: vk::BufferUsageFlags,
        location: gpu_allocator::MemoryLocation,
        debug_name: Option<String>,
    ) -> Buffer {
        let mut buffer = Buffer::create_buffer(
            device,
            size,
            usage_flags | vk::BufferUsageFlags::TRANSFER_DST,
            location,
            debug_name,
        );

        if let Some(initial_data) = initial_data {
            buffer.update_memory(initial_data);
        }

        buffer
    }

    fn create_buffer(
        device: Arc<Device>,
        size: u64,
        usage_flags: vk::BufferUsageFlags,
        memory_location: gpu_allocator::MemoryLocation,
        debug_name: Option<String>,
    ) -> Buffer {
        unsafe {
            let buffer_info = vk::BufferCreateInfo::builder()
                .size(size)
                .usage(usage_flags)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = device
                .ash_device
                .create_buffer(&buffer_info, None)
                .expect("Failed to create buffer");

            let buffer_memory_req = device.ash_device.get_buffer_memory_requirements(buffer);

            let debug_name = debug_name.unwrap_or_else(|| String::from("unnamed_buffer"));

            let allocation = device
                .gpu_allocator
                .lock()
                .unwrap()
                .allocate(&AllocationCreateDesc {
                    name: &debug_name,
                    requirements: buffer_memory_req,
                    location: memory_location,
                    linear: true,
                })
                .expect("Failed to allocate buffer memory");

            device
                .ash_device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .expect("Failed to bind buffer memory");

            Buffer {
                buffer,
                allocation,
                memory_req: buffer_memory_req,
                memory_location,
                size,
                debug_name,
                device,
            }
        }
    }

    pub fn update_memory<T: Copy>(&mut self, data: &[T]) {
        unsafe {
            let src = data.as_ptr() as *const u8;
            let src_bytes = std::mem::size_of_val(data);

            if self.memory_location != gpu_allocator::MemoryLocation::GpuOnly {
                let dst = self.allocation.mapped_ptr().unwrap().as_ptr() as *mut u8;
                let dst_bytes = self.allocation.size() as usize;
                std::ptr::copy_nonoverlapping(src, dst, std::cmp::min(src_bytes, dst_bytes));
            } else {
                debug!("Creating staging buffer for {}", self.debug_name);
                let staging_buffer = Buffer::create_buffer(
                    self.device.clone(),
                    self.size,
                    vk::BufferUsageFlags::TRANSFER_SRC,
                    gpu_allocator::MemoryLocation::CpuToGpu,
                    Some(format!("staging_{}", self.debug_name)),
                );
                let dst = staging_buffer.allocation.mapped_ptr().unwrap().as_ptr() as *mut u8;
                let dst_bytes = staging_buffer.allocation.size() as usize;
                std::ptr::copy_nonoverlapping(src, dst, std::cmp::min(src_bytes, dst_bytes));

                self.device.execute_and_submit(|cb| {
                    let regions = vk::BufferCopy::builder()
                        .size(self.size)
                        .src_offset(0)
                        .dst_offset(0)
                        .build();

                    self.device.ash_device.cmd_copy_buffer(
                        cb,
                        staging_buffer.buffer,
                        self.buffer,
                        &[regions],
                    );
                });

                staging_buffer.destroy();
            }
        }
    }

    /// Records a copy of the whole buffer into `image`. The image must be in
    /// `TRANSFER_DST_OPTIMAL`; for array images the buffer holds the layers
    /// tightly packed.
    pub fn copy_to_image(&self, command_buffer: vk::CommandBuffer, image: &Image) {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: image.desc.aspect_flags,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: image.desc.array_layers,
            })
            .image_extent(vk::Extent3D {
                width: image.desc.width,
                height: image.desc.height,
                depth: 1,
            })
            .build();

        unsafe {
            self.device.ash_device.cmd_copy_buffer_to_image(
                command_buffer,
                self.buffer,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }

    pub fn set_debug_name(&mut self, debug_name: &str) {
        self.debug_name = debug_name.to_string();
    }

    pub fn destroy(self) {
        let Buffer {
            buffer,
            allocation,
            device,
            ..
        } = self;

        device.gpu_allocator.lock().unwrap().free(allocation).ok();
        unsafe { device.ash_device.destroy_buffer(buffer, None) };
    }
}
