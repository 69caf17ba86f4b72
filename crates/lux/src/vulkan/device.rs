use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

pub struct Device {
    pub ash_device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub cmd_pool: vk::CommandPool,
    pub setup_cmd_buf: vk::CommandBuffer,
    pub queue: vk::Queue,
    pub device_memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_family_index: u32,
    pub gpu_allocator: ManuallyDrop<Mutex<Allocator>>,
    instance: ash::Instance,
    _entry: ash::Entry,
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.ash_device.device_wait_idle().ok();
            // The allocator frees its memory blocks through the device, so it
            // has to go before the device does.
            ManuallyDrop::drop(&mut self.gpu_allocator);
            self.ash_device.destroy_command_pool(self.cmd_pool, None);
            self.ash_device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

impl Device {
    /// Creates a headless device on the first physical device that exposes a
    /// graphics queue. No surface or swapchain is involved; every pass in this
    /// crate renders offscreen.
    pub fn new() -> Arc<Device> {
        unsafe {
            let entry = ash::Entry::load().expect("Failed to load the Vulkan loader");

            let app_name = CString::new("candela").unwrap();
            let engine_name = CString::new("lux").unwrap();
            let app_info = vk::ApplicationInfo::builder()
                .application_name(app_name.as_c_str())
                .application_version(vk::make_api_version(0, 0, 1, 0))
                .engine_name(engine_name.as_c_str())
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let instance_create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);

            let instance = entry
                .create_instance(&instance_create_info, None)
                .expect("Failed to create Vulkan instance");

            let physical_devices = instance
                .enumerate_physical_devices()
                .expect("Failed to enumerate physical devices");

            let (physical_device, queue_family_index) = physical_devices
                .into_iter()
                .find_map(|physical_device| {
                    instance
                        .get_physical_device_queue_family_properties(physical_device)
                        .iter()
                        .position(|info| info.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                        .map(|index| (physical_device, index as u32))
                })
                .expect("Did not find any device with a graphics queue");

            let properties = instance.get_physical_device_properties(physical_device);
            log::debug!("Selected device: {:?}", CStr::from_ptr(
                properties.device_name.as_ptr()
            ));

            let queue_priorities = [1.0];
            let queue_info = vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities);

            // Dynamic rendering is core in 1.3 but still has to be enabled.
            let mut dynamic_rendering_features = vk::PhysicalDeviceDynamicRenderingFeatures {
                dynamic_rendering: vk::TRUE,
                ..Default::default()
            };

            let device_create_info = vk::DeviceCreateInfo::builder()
                .queue_create_infos(std::slice::from_ref(&queue_info))
                .push_next(&mut dynamic_rendering_features);

            let ash_device: ash::Device = instance
                .create_device(physical_device, &device_create_info, None)
                .expect("Failed to create logical Vulkan device");

            let queue = ash_device.get_device_queue(queue_family_index, 0);

            let device_memory_properties =
                instance.get_physical_device_memory_properties(physical_device);

            let (cmd_pool, setup_cmd_buf) =
                Device::create_setup_command_buffer(&ash_device, queue_family_index);

            let gpu_allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: ash_device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
            })
            .expect("Failed to create GPU allocator");

            Arc::new(Device {
                ash_device,
                physical_device,
                cmd_pool,
                setup_cmd_buf,
                queue,
                device_memory_properties,
                queue_family_index,
                gpu_allocator: ManuallyDrop::new(Mutex::new(gpu_allocator)),
                instance,
                _entry: entry,
            })
        }
    }

    pub fn device(&self) -> &ash::Device {
        &self.ash_device
    }

    fn create_setup_command_buffer(
        device: &ash::Device,
        queue_family_index: u32,
    ) -> (vk::CommandPool, vk::CommandBuffer) {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .expect("Failed to create command pool")
        };

        let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_buffer_count(1)
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY);

        let command_buffers = unsafe {
            device
                .allocate_command_buffers(&command_buffer_allocate_info)
                .expect("Failed to allocate command buffer")
        };

        (pool, command_buffers[0])
    }

    pub fn find_memory_type_index(
        &self,
        memory_req: &vk::MemoryRequirements,
        flags: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        self.device_memory_properties.memory_types
            [..self.device_memory_properties.memory_type_count as usize]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                (1 << index) & memory_req.memory_type_bits != 0
                    && memory_type.property_flags & flags == flags
            })
            .map(|(index, _)| index as u32)
    }

    /// Records `record` into the setup command buffer, submits it and waits
    /// for the queue to drain. Used for uploads, readbacks and one-shot frames.
    pub fn execute_and_submit<F: FnOnce(vk::CommandBuffer)>(&self, record: F) {
        unsafe {
            self.ash_device
                .reset_command_buffer(self.setup_cmd_buf, vk::CommandBufferResetFlags::empty())
                .expect("Failed to reset setup command buffer");

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ash_device
                .begin_command_buffer(self.setup_cmd_buf, &begin_info)
                .expect("Failed to begin setup command buffer");

            record(self.setup_cmd_buf);

            self.ash_device
                .end_command_buffer(self.setup_cmd_buf)
                .expect("Failed to end setup command buffer");

            let command_buffers = [self.setup_cmd_buf];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            self.ash_device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .expect("Failed to submit setup command buffer");
            self.ash_device
                .queue_wait_idle(self.queue)
                .expect("Failed to wait for setup submission");
        }
    }
}
