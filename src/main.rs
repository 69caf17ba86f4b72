mod settings;

use std::sync::Arc;

use ash::vk;
use glam::Vec3;
use log::info;

use lux::render_graph::{RenderGraph, TextureId};
use lux::render_tools::{GBufferInput, ShadingPass};
use lux::vulkan::{Device, ImageDesc};
use lux::{Camera, Light, Texture};

use settings::RenderSettingsBuilder;

/// Uploads a 2x2 texture holding one constant texel. Sampling it anywhere
/// returns that value, which is all the synthetic G-buffer needs.
fn upload_constant_texture(
    device: &Arc<Device>,
    graph: &mut RenderGraph,
    name: &str,
    format: vk::Format,
    texel: &[f32],
) -> TextureId {
    let mut pixels = Vec::with_capacity(4 * texel.len() * 4);
    for _ in 0..4 {
        for value in texel {
            pixels.extend_from_slice(&value.to_ne_bytes());
        }
    }

    graph.import_texture(Texture::create(
        device.clone(),
        Some(&pixels),
        ImageDesc::new_2d(2, 2, format),
        name,
    ))
}

fn main() {
    env_logger::init();

    let settings = RenderSettingsBuilder::new().build();

    let device = Device::new();
    let mut graph = RenderGraph::new(device.clone());

    // Synthetic G-buffer: a flat surface at the origin facing +Z, mid-grey
    // dielectric with a touch of emissive. Alphas carry metalness and
    // roughness.
    let gbuffer = GBufferInput {
        position: upload_constant_texture(
            &device,
            &mut graph,
            "gbuffer_position",
            vk::Format::R32G32B32A32_SFLOAT,
            &[0.0, 0.0, 0.0, 1.0],
        ),
        normal: upload_constant_texture(
            &device,
            &mut graph,
            "gbuffer_normal",
            vk::Format::R32G32B32A32_SFLOAT,
            &[0.0, 0.0, 1.0, 0.0],
        ),
        albedo: upload_constant_texture(
            &device,
            &mut graph,
            "gbuffer_albedo",
            vk::Format::R32G32B32A32_SFLOAT,
            &[0.5, 0.5, 0.5, 0.0],
        ),
        emissive: upload_constant_texture(
            &device,
            &mut graph,
            "gbuffer_emissive",
            vk::Format::R32G32B32A32_SFLOAT,
            &[0.05, 0.02, 0.0, 0.4],
        ),
    };

    // A shadow map at the far plane everywhere leaves the scene unshadowed.
    let shadow_map = upload_constant_texture(
        &device,
        &mut graph,
        "shadow_map",
        vk::Format::R32_SFLOAT,
        &[1.0],
    );

    let light = Light::directional(Vec3::new(-0.4, -1.0, -0.6), 25.0, shadow_map);
    let camera = Camera::new_look_at(
        Vec3::new(0.0, 1.5, 5.0),
        Vec3::ZERO,
        60.0,
        settings.width as f32 / settings.height as f32,
    );

    let mut shading_pass = ShadingPass::new(
        device.clone(),
        &mut graph,
        settings.width,
        settings.height,
        gbuffer,
    );
    shading_pass.disable_ssao();

    shading_pass.run(&mut graph, camera.position(), &light);
    graph.prepare();
    device.execute_and_submit(|cb| graph.render(&cb));

    let pixels = graph.read_back_texture(shading_pass.result());
    let bytes: Vec<u8> = pixels
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
        .collect();

    image::save_buffer(
        &settings.output_path,
        &bytes,
        settings.width,
        settings.height,
        image::ColorType::Rgba8,
    )
    .expect("Failed to write the shading output image");

    info!(
        "Wrote {}x{} shading output to {}",
        settings.width, settings.height, settings.output_path
    );
}
