use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;

use ash::util::read_spv;
use ash::vk;
use log::debug;
use rspirv_reflect::DescriptorInfo;

type DescriptorSetMap = BTreeMap<u32, BTreeMap<u32, DescriptorInfo>>;
pub type BindingMap = BTreeMap<String, Binding>;

#[derive(Debug, Clone)]
pub struct Binding {
    pub set: u32,
    pub binding: u32,
    pub info: DescriptorInfo,
}

/// Merged descriptor reflection for all stages of one pipeline.
#[derive(Default)]
pub struct ShaderReflect {
    pub descriptor_set_reflections: DescriptorSetMap,
    pub binding_mappings: BindingMap,
}

impl ShaderReflect {
    pub fn get_set_mappings(&self, set: u32) -> BindingMap {
        self.binding_mappings
            .iter()
            .filter(|(_, binding)| binding.set == set)
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect()
    }
}

pub(crate) fn to_vk_descriptor_type(ty: &rspirv_reflect::DescriptorType) -> vk::DescriptorType {
    match *ty {
        rspirv_reflect::DescriptorType::COMBINED_IMAGE_SAMPLER => {
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        }
        rspirv_reflect::DescriptorType::SAMPLED_IMAGE => vk::DescriptorType::SAMPLED_IMAGE,
        rspirv_reflect::DescriptorType::STORAGE_IMAGE => vk::DescriptorType::STORAGE_IMAGE,
        rspirv_reflect::DescriptorType::UNIFORM_BUFFER => vk::DescriptorType::UNIFORM_BUFFER,
        rspirv_reflect::DescriptorType::STORAGE_BUFFER => vk::DescriptorType::STORAGE_BUFFER,
        _ => panic!("Unsupported descriptor type"),
    }
}

/// Compiles a GLSL source file into SPIR-V. Compilation problems are fatal;
/// there is nothing sensible to render without the shader.
pub fn compile_glsl_shader(path: &str, kind: shaderc::ShaderKind) -> Vec<u8> {
    debug!("Compiling shader: {}", path);

    let source = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("Failed to read shader \"{}\": {}", path, err));

    let compiler = shaderc::Compiler::new().expect("Failed to initialize shader compiler");

    let artifact = compiler
        .compile_into_spirv(&source, kind, path, "main", None)
        .unwrap_or_else(|err| panic!("Failed to compile \"{}\": {}", path, err));

    artifact.as_binary_u8().to_vec()
}

/// Reflects the descriptor interface of each stage and merges them. Stages
/// sharing a (set, binding) pair must agree on the resource, which holds for
/// pipelines compiled from one shader pair.
pub fn reflect_shader_stages(stage_spirv: &[&[u8]]) -> ShaderReflect {
    let mut descriptor_set_reflections: DescriptorSetMap = BTreeMap::new();

    for spirv in stage_spirv {
        let reflection =
            rspirv_reflect::Reflection::new_from_spirv(spirv).expect("Failed to reflect shader");

        for (set, bindings) in reflection
            .get_descriptor_sets()
            .expect("Failed to enumerate shader descriptor sets")
        {
            let set_entry = descriptor_set_reflections.entry(set).or_default();
            for (binding, info) in bindings {
                set_entry.insert(binding, info);
            }
        }
    }

    let mut binding_mappings: BindingMap = BTreeMap::new();
    for (set, bindings) in &descriptor_set_reflections {
        for (binding, info) in bindings {
            binding_mappings.insert(
                info.name.clone(),
                Binding {
                    set: *set,
                    binding: *binding,
                    info: info.clone(),
                },
            );
        }
    }

    ShaderReflect {
        descriptor_set_reflections,
        binding_mappings,
    }
}

/// Builds the pipeline layout and one descriptor set layout per reflected set.
/// The caller owns the returned handles.
#[must_use]
pub fn create_layouts_from_reflection(
    device: &ash::Device,
    reflection: &ShaderReflect,
) -> (vk::PipelineLayout, Vec<vk::DescriptorSetLayout>) {
    let descriptor_set_layouts: Vec<vk::DescriptorSetLayout> = reflection
        .descriptor_set_reflections
        .values()
        .map(|descriptor_set| {
            let descriptor_set_layout_bindings: Vec<vk::DescriptorSetLayoutBinding> =
                descriptor_set
                    .iter()
                    .map(|(binding, descriptor_info)| {
                        vk::DescriptorSetLayoutBinding::builder()
                            .binding(*binding)
                            .descriptor_type(to_vk_descriptor_type(&descriptor_info.ty))
                            .descriptor_count(1)
                            .stage_flags(vk::ShaderStageFlags::ALL)
                            .build()
                    })
                    .collect();

            let descriptor_sets_layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
                .bindings(&descriptor_set_layout_bindings)
                .build();

            unsafe {
                device
                    .create_descriptor_set_layout(&descriptor_sets_layout_info, None)
                    .expect("Error creating descriptor set layout")
            }
        })
        .collect();

    let pipeline_layout_create_info =
        vk::PipelineLayoutCreateInfo::builder().set_layouts(&descriptor_set_layouts);

    let pipeline_layout = unsafe {
        device
            .create_pipeline_layout(&pipeline_layout_create_info, None)
            .expect("Error creating pipeline layout")
    };

    (pipeline_layout, descriptor_set_layouts)
}

pub fn create_shader_module(mut spv_file: Cursor<&[u8]>, device: &ash::Device) -> vk::ShaderModule {
    let shader_code = read_spv(&mut spv_file).expect("Failed to read shader spv data");
    let shader_info = vk::ShaderModuleCreateInfo::builder().code(&shader_code);
    unsafe {
        device
            .create_shader_module(&shader_info, None)
            .expect("Error creating shader module")
    }
}
