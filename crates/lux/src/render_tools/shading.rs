use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3, Vec4};

use crate::light::Light;
use crate::quad::{FullscreenQuad, QUAD_VERTICES};
use crate::render_graph::{RenderGraph, TextureId};
use crate::vulkan::{Device, ImageDesc, PipelineDesc};
use crate::Texture;

pub const SHADING_OUTPUT_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

const BRDF_LUT_PATH: &str = "assets/textures/ibl_brdf_lut.png";

/// The geometry-buffer textures an earlier stage rendered. Albedo alpha
/// carries metalness, emissive alpha carries roughness.
#[derive(Copy, Clone)]
pub struct GBufferInput {
    pub position: TextureId,
    pub normal: TextureId,
    pub albedo: TextureId,
    pub emissive: TextureId,
}

/// Per-frame uniform block of the shading pass. Layout matches the
/// `shading_params` block in `shading.frag` (std140: two vec4s and a mat4).
#[repr(C)]
#[derive(Copy, Clone)]
struct ShadingParams {
    view_pos: Vec4,
    light_direction: Vec4,
    light_matrix: Mat4,
}

/// The selectable inputs of the pass, separated from the GPU objects so the
/// fallback rules stay plain data.
struct ShadingInputs {
    gbuffer: GBufferInput,
    brdf_lut: TextureId,
    placeholder_ao: TextureId,
    placeholder_env: TextureId,
    irradiance_map: Option<TextureId>,
    prefilter_map: Option<TextureId>,
    ao_map: Option<TextureId>,
}

impl ShadingInputs {
    /// Resolves the inputs into the binding order of `shading.frag`'s
    /// input-texture set. The pass's `read` declarations must follow this
    /// exact order.
    fn bindings(&self, shadow_map: TextureId) -> [TextureId; 9] {
        [
            self.gbuffer.position,
            self.gbuffer.normal,
            self.gbuffer.albedo,
            self.gbuffer.emissive,
            self.brdf_lut,
            self.ao_map.unwrap_or(self.placeholder_ao),
            shadow_map,
            self.irradiance_map.unwrap_or(self.placeholder_env),
            self.prefilter_map.unwrap_or(self.placeholder_env),
        ]
    }
}

/// Deferred shading stage: reads the G-buffer, a shadow map and the
/// image-based-lighting inputs, and produces the shaded HDR image together
/// with the thresholded bright image the bloom stage feeds on.
pub struct ShadingPass {
    inputs: ShadingInputs,
    result: TextureId,
    bright: TextureId,
    quad: FullscreenQuad,
}

impl ShadingPass {
    pub fn new(
        device: Arc<Device>,
        graph: &mut RenderGraph,
        width: u32,
        height: u32,
        gbuffer: GBufferInput,
    ) -> ShadingPass {
        let brdf_lut = graph.import_texture(Texture::load(device.clone(), BRDF_LUT_PATH));

        // Constant white occlusion, bound whenever SSAO is disabled.
        let ao_values: [f32; 4] = [1.0; 4];
        let ao_bytes: Vec<u8> = ao_values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let placeholder_ao = graph.import_texture(Texture::create(
            device.clone(),
            Some(&ao_bytes),
            ImageDesc::new_2d(2, 2, vk::Format::R32_SFLOAT),
            "placeholder_ao",
        ));

        // Black 1x1 cubemap standing in for the environment maps until the
        // caller provides them.
        let env_bytes = vec![0u8; 6 * 4];
        let placeholder_env = graph.import_texture(Texture::create(
            device.clone(),
            Some(&env_bytes),
            ImageDesc::new_cubemap(1, 1, vk::Format::R8G8B8A8_UNORM),
            "placeholder_env",
        ));

        let output_desc = ImageDesc::new_2d(width, height, SHADING_OUTPUT_FORMAT);
        let result = graph.create_texture("shading_output", device.clone(), output_desc);
        let bright = graph.create_texture("shading_bright", device.clone(), output_desc);

        let quad = FullscreenQuad::new(device);

        ShadingPass {
            inputs: ShadingInputs {
                gbuffer,
                brdf_lut,
                placeholder_ao,
                placeholder_env,
                irradiance_map: None,
                prefilter_map: None,
                ao_map: None,
            },
            result,
            bright,
            quad,
        }
    }

    pub fn set_irradiance_map(&mut self, irradiance_map: TextureId) {
        self.inputs.irradiance_map = Some(irradiance_map);
    }

    pub fn set_prefilter_map(&mut self, prefilter_map: TextureId) {
        self.inputs.prefilter_map = Some(prefilter_map);
    }

    pub fn enable_ssao(&mut self, ao_map: TextureId) {
        self.inputs.ao_map = Some(ao_map);
    }

    pub fn disable_ssao(&mut self) {
        self.inputs.ao_map = None;
    }

    /// The shaded HDR image.
    pub fn result(&self) -> TextureId {
        self.result
    }

    /// The luminance-thresholded image for bloom extraction.
    pub fn bright(&self) -> TextureId {
        self.bright
    }

    /// Registers the shading pass for this frame.
    pub fn run(&self, graph: &mut RenderGraph, view_pos: Vec3, light: &Light) {
        let shading_params = ShadingParams {
            view_pos: view_pos.extend(1.0),
            light_direction: light.direction.extend(0.0),
            light_matrix: light.matrix,
        };

        let vertex_buffer = self.quad.vertex_buffer.buffer;
        let vertex_count = QUAD_VERTICES.len() as u32;

        let mut builder = graph.add_pass_from_desc(
            "shading_pass",
            PipelineDesc::builder()
                .vertex_path("assets/shaders/fullscreen_quad.vert")
                .fragment_path("assets/shaders/shading.frag")
                .topology(vk::PrimitiveTopology::TRIANGLE_STRIP)
                .vertex_bindings(
                    FullscreenQuad::binding_descriptions(),
                    FullscreenQuad::attribute_descriptions(),
                )
                .color_attachment_formats(vec![SHADING_OUTPUT_FORMAT; 2]),
        );

        for input in self.inputs.bindings(light.shadow_map) {
            builder = builder.read(input);
        }

        builder
            .write(self.result)
            .write(self.bright)
            .uniforms("shading_params", &shading_params)
            .record_render(move |device, command_buffer, _pass, _resources| unsafe {
                device
                    .device()
                    .cmd_bind_vertex_buffers(*command_buffer, 0, &[vertex_buffer], &[0]);
                device
                    .device()
                    .cmd_draw(*command_buffer, vertex_count, 1, 0, 0);
            })
            .build(graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ShadingInputs {
        ShadingInputs {
            gbuffer: GBufferInput {
                position: 0,
                normal: 1,
                albedo: 2,
                emissive: 3,
            },
            brdf_lut: 4,
            placeholder_ao: 5,
            placeholder_env: 6,
            irradiance_map: None,
            prefilter_map: None,
            ao_map: None,
        }
    }

    #[test]
    fn gbuffer_comes_first_in_shader_binding_order() {
        let bindings = inputs().bindings(7);
        assert_eq!(&bindings[..4], &[0, 1, 2, 3]);
        assert_eq!(bindings[4], 4);
        assert_eq!(bindings[6], 7);
    }

    #[test]
    fn disabled_ssao_falls_back_to_the_placeholder() {
        let mut inputs = inputs();
        assert_eq!(inputs.bindings(7)[5], inputs.placeholder_ao);

        inputs.ao_map = Some(42);
        assert_eq!(inputs.bindings(7)[5], 42);

        inputs.ao_map = None;
        assert_eq!(inputs.bindings(7)[5], inputs.placeholder_ao);
    }

    #[test]
    fn unset_environment_maps_fall_back_to_the_black_cubemap() {
        let mut inputs = inputs();
        let bindings = inputs.bindings(7);
        assert_eq!(bindings[7], inputs.placeholder_env);
        assert_eq!(bindings[8], inputs.placeholder_env);

        inputs.irradiance_map = Some(40);
        inputs.prefilter_map = Some(41);
        let bindings = inputs.bindings(7);
        assert_eq!(bindings[7], 40);
        assert_eq!(bindings[8], 41);
    }

    #[test]
    fn uniform_block_matches_the_std140_layout() {
        assert_eq!(std::mem::size_of::<ShadingParams>(), 2 * 16 + 64);
    }
}
