//! Implements shader reflection to derive descriptor set layouts and push constant ranges automatically.
//!
//! The reflection result of a single module is a [`ModuleReflection`]. Backends produce these through
//! [`Backend::reflect_module`](crate::core::traits::Backend::reflect_module); with the `shader-reflection`
//! feature enabled, [`Device`](crate::Device) uses SPIRV-Cross for this.

#[cfg(feature = "shader-reflection")]
use anyhow::Result;
use ash::vk;
#[cfg(feature = "shader-reflection")]
use spv_cross::spirv::{Decoration, ExecutionModel, Resource, Type};

#[cfg(feature = "shader-reflection")]
use crate::Error;

/// Descriptor count used for runtime-sized arrays.
pub const UNBOUNDED_ARRAY_SIZE: u32 = 4096;

#[cfg(all(feature = "shader-reflection", not(feature = "hlsl")))]
type Ast = spv_cross::spirv::Ast<spv_cross::glsl::Target>;

#[cfg(all(feature = "shader-reflection", feature = "hlsl"))]
type Ast = spv_cross::spirv::Ast<spv_cross::hlsl::Target>;

/// A descriptor binding declared by a shader module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    /// Name of the variable in the shader.
    pub name: String,
    pub set: u32,
    pub binding: u32,
    /// Descriptor type as inferred from the shader. Reflection cannot always tell combined image samplers
    /// and sampled images apart, which is why effects accept overrides.
    pub ty: vk::DescriptorType,
    /// Array dimensions, outermost first. Empty for scalar bindings, `0` for runtime-sized dimensions.
    pub array_dims: Vec<u32>,
}

impl ReflectedBinding {
    /// Number of descriptors this binding takes: the product of all array dimensions.
    pub fn descriptor_count(&self) -> u32 {
        self.array_dims
            .iter()
            .map(|&dim| if dim == 0 { UNBOUNDED_ARRAY_SIZE } else { dim })
            .product()
    }
}

/// The push constant block of a shader module.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReflectedPushConstants {
    pub offset: u32,
    pub size: u32,
}

/// Stores reflection information about a single shader module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReflection {
    /// Stage of the module's entry point.
    pub stage: vk::ShaderStageFlags,
    /// All descriptor bindings, in declaration order.
    pub bindings: Vec<ReflectedBinding>,
    /// The push constant block, if the module declares one.
    pub push_constants: Option<ReflectedPushConstants>,
}

#[cfg(feature = "shader-reflection")]
fn invalid(err: spv_cross::ErrorCode) -> Error {
    Error::InvalidSpirv(format!("{err:?}"))
}

#[cfg(feature = "shader-reflection")]
fn get_shader_stage(ast: &Ast) -> Result<vk::ShaderStageFlags> {
    let entry = ast
        .get_entry_points()
        .map_err(invalid)?
        .first()
        .cloned()
        .ok_or(Error::NoEntryPoint)?;
    Ok(match entry.execution_model {
        ExecutionModel::Vertex => vk::ShaderStageFlags::VERTEX,
        ExecutionModel::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ExecutionModel::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ExecutionModel::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ExecutionModel::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ExecutionModel::GlCompute => vk::ShaderStageFlags::COMPUTE,
        ExecutionModel::RayGenerationKHR => vk::ShaderStageFlags::RAYGEN_KHR,
        ExecutionModel::IntersectionKHR => vk::ShaderStageFlags::INTERSECTION_KHR,
        ExecutionModel::AnyHitKHR => vk::ShaderStageFlags::ANY_HIT_KHR,
        ExecutionModel::ClosestHitKHR => vk::ShaderStageFlags::CLOSEST_HIT_KHR,
        ExecutionModel::MissKHR => vk::ShaderStageFlags::MISS_KHR,
        ExecutionModel::Kernel => {
            return Err(Error::InvalidSpirv("OpenCL kernels cannot be used in a Vulkan pipeline".to_string()).into());
        }
    })
}

#[cfg(feature = "shader-reflection")]
fn array_dims(ty: &Type) -> Vec<u32> {
    match ty {
        Type::Struct {
            array, ..
        }
        | Type::Image {
            array, ..
        }
        | Type::SampledImage {
            array, ..
        }
        | Type::Sampler {
            array, ..
        } => array.clone(),
        _ => Vec::new(),
    }
}

#[cfg(feature = "shader-reflection")]
fn find_bindings(
    ast: &mut Ast,
    resources: &[Resource],
    ty: vk::DescriptorType,
    out: &mut Vec<ReflectedBinding>,
) -> Result<()> {
    for resource in resources {
        let binding = ast.get_decoration(resource.id, Decoration::Binding).map_err(invalid)?;
        let set = ast.get_decoration(resource.id, Decoration::DescriptorSet).map_err(invalid)?;
        let array_dims = array_dims(&ast.get_type(resource.type_id).map_err(invalid)?);
        out.push(ReflectedBinding {
            name: ast.get_name(resource.id).map_err(invalid)?,
            set,
            binding,
            ty,
            array_dims,
        });
    }
    Ok(())
}

#[cfg(feature = "shader-reflection")]
fn find_push_constants(ast: &mut Ast, resources: &[Resource]) -> Result<Option<ReflectedPushConstants>> {
    // Vulkan allows a single push constant block per entry point.
    let Some(block) = resources.first() else { return Ok(None); };
    // The range covers the whole declared block, not just the members this stage reads.
    let member_count = match ast.get_type(block.base_type_id).map_err(invalid)? {
        Type::Struct {
            member_types, ..
        } => member_types.len() as u32,
        _ => return Err(Error::InvalidSpirv("push constant block is not a struct".to_string()).into()),
    };
    let offset = (0..member_count)
        .map(|member| ast.get_member_decoration(block.base_type_id, member, Decoration::Offset))
        .collect::<Result<Vec<u32>, _>>()
        .map_err(invalid)?
        .into_iter()
        .min()
        .unwrap_or(0);
    let declared = ast.get_declared_struct_size(block.base_type_id).map_err(invalid)?;
    Ok(Some(ReflectedPushConstants {
        offset,
        size: declared.saturating_sub(offset),
    }))
}

/// Reflect a SPIR-V module using SPIRV-Cross.
/// # Errors
/// Fails with [`Error::InvalidSpirv`] if the module cannot be parsed, and with [`Error::NoEntryPoint`]
/// if it declares no entry point.
#[cfg(feature = "shader-reflection")]
pub(crate) fn reflect_spirv(code: &[u32]) -> Result<ModuleReflection> {
    let module = spv_cross::spirv::Module::from_words(code);
    let mut ast: Ast = Ast::parse(&module).map_err(invalid)?;
    let resources = ast.get_shader_resources().map_err(invalid)?;
    let stage = get_shader_stage(&ast)?;

    let mut bindings = Vec::new();
    find_bindings(&mut ast, &resources.uniform_buffers, vk::DescriptorType::UNIFORM_BUFFER, &mut bindings)?;
    find_bindings(&mut ast, &resources.storage_buffers, vk::DescriptorType::STORAGE_BUFFER, &mut bindings)?;
    find_bindings(&mut ast, &resources.sampled_images, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, &mut bindings)?;
    find_bindings(&mut ast, &resources.separate_images, vk::DescriptorType::SAMPLED_IMAGE, &mut bindings)?;
    find_bindings(&mut ast, &resources.separate_samplers, vk::DescriptorType::SAMPLER, &mut bindings)?;
    find_bindings(&mut ast, &resources.storage_images, vk::DescriptorType::STORAGE_IMAGE, &mut bindings)?;
    find_bindings(&mut ast, &resources.subpass_inputs, vk::DescriptorType::INPUT_ATTACHMENT, &mut bindings)?;
    find_bindings(
        &mut ast,
        &resources.acceleration_structures,
        vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
        &mut bindings,
    )?;
    let push_constants = find_push_constants(&mut ast, &resources.push_constant_buffers)?;

    debug!(
        "Reflected {stage:?} module: {} bindings, push constants: {push_constants:?}",
        bindings.len()
    );

    Ok(ModuleReflection {
        stage,
        bindings,
        push_constants,
    })
}
