use std::sync::Arc;

use ash::vk;

use super::shader::{to_vk_descriptor_type, BindingMap};
use super::{Buffer, Device};
use crate::Texture;

pub enum DescriptorIdentifier {
    Name(String),
    Index(u32),
}

pub struct DescriptorSet {
    pub handle: vk::DescriptorSet,
    pub pool: vk::DescriptorPool,
    binding_map: BindingMap,
    device: Arc<Device>,
}

impl DescriptorSet {
    pub fn new(device: Arc<Device>, layout: vk::DescriptorSetLayout, binding_map: BindingMap) -> DescriptorSet {
        let descriptor_pool_sizes: Vec<vk::DescriptorPoolSize> = binding_map
            .values()
            .map(|binding| {
                vk::DescriptorPoolSize::builder()
                    .ty(to_vk_descriptor_type(&binding.info.ty))
                    .descriptor_count(1)
                    .build()
            })
            .collect();

        let pool = {
            let descriptor_pool_info = vk::DescriptorPoolCreateInfo::builder()
                .pool_sizes(&descriptor_pool_sizes)
                .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
                .max_sets(1);

            unsafe {
                device
                    .device()
                    .create_descriptor_pool(&descriptor_pool_info, None)
                    .expect("Error creating descriptor pool")
            }
        };

        let layouts = [layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let handle = unsafe {
            device
                .device()
                .allocate_descriptor_sets(&allocate_info)
                .expect("Error allocating descriptor set")[0]
        };

        DescriptorSet {
            handle,
            pool,
            binding_map,
            device,
        }
    }

    fn resolve_binding(&self, identifier: &DescriptorIdentifier) -> u32 {
        match identifier {
            DescriptorIdentifier::Name(name) => {
                self.binding_map
                    .get(name)
                    .unwrap_or_else(|| panic!("Descriptor set has no binding named \"{}\"", name))
                    .binding
            }
            DescriptorIdentifier::Index(index) => *index,
        }
    }

    pub fn write_combined_image(&self, identifier: DescriptorIdentifier, texture: &Texture) {
        let binding = self.resolve_binding(&identifier);

        let image_info = [texture.descriptor_info];
        let descriptor_write = vk::WriteDescriptorSet::builder()
            .dst_set(self.handle)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info)
            .build();

        unsafe {
            self.device
                .device()
                .update_descriptor_sets(&[descriptor_write], &[]);
        }
    }

    pub fn write_uniform_buffer(&self, identifier: DescriptorIdentifier, buffer: &Buffer) {
        let binding = self.resolve_binding(&identifier);

        let buffer_info = [vk::DescriptorBufferInfo::builder()
            .buffer(buffer.buffer)
            .offset(0)
            .range(buffer.size)
            .build()];
        let descriptor_write = vk::WriteDescriptorSet::builder()
            .dst_set(self.handle)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info)
            .build();

        unsafe {
            self.device
                .device()
                .update_descriptor_sets(&[descriptor_write], &[]);
        }
    }

    pub fn clean_vk_resources(&self) {
        unsafe {
            self.device.ash_device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
