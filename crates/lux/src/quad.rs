use std::sync::Arc;

use ash::vk;
use memoffset::offset_of;

use crate::vulkan::{Buffer, Device};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Screen-covering strip, wound to match a flipped viewport.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 1.0],
    },
];

/// The shared full-screen quad geometry the shading pass rasterizes.
pub struct FullscreenQuad {
    pub vertex_buffer: Buffer,
}

impl FullscreenQuad {
    pub fn new(device: Arc<Device>) -> FullscreenQuad {
        let vertex_buffer = Buffer::new(
            device,
            Some(&QUAD_VERTICES),
            std::mem::size_of_val(&QUAD_VERTICES) as u64,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            gpu_allocator::MemoryLocation::GpuOnly,
            Some(String::from("fullscreen_quad_vertex_buffer")),
        );

        FullscreenQuad { vertex_buffer }
    }

    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<QuadVertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()]
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(QuadVertex, position) as u32)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(QuadVertex, uv) as u32)
                .build(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);

        let bindings = FullscreenQuad::binding_descriptions();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 16);

        let attributes = FullscreenQuad::attribute_descriptions();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 8);
    }

    #[test]
    fn strip_covers_clip_space() {
        let xs: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.position[1]).collect();

        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -1.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 1.0);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -1.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 1.0);
    }

    #[test]
    fn uvs_follow_the_corners() {
        for vertex in &QUAD_VERTICES {
            assert_eq!(vertex.uv[0], (vertex.position[0] + 1.0) * 0.5);
            assert_eq!(vertex.uv[1], (vertex.position[1] + 1.0) * 0.5);
        }
    }
}
