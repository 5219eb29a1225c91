//! Re-exports all commonly used types.

pub use ash::vk;

pub use crate::core::device::Device;
pub use crate::core::error::Error;
pub use crate::core::traits::Backend;

pub use crate::descriptor::allocator::{AllocatorEpoch, DescriptorAllocator};
pub use crate::descriptor::binder::{PendingWrite, ShaderDescriptorBinder};
pub use crate::descriptor::descriptor_pool::DescriptorPoolSizes;
pub use crate::descriptor::descriptor_set::DescriptorBufferWrite;
pub use crate::descriptor::settings::{AllocatorBuilder, AllocatorSettings};

pub use crate::pipeline::effect::{EffectBinding, ReflectionOverride, ShaderEffect, MAX_DESCRIPTOR_SETS};
pub use crate::pipeline::pipeline_layout::{PipelineLayout, PushConstantRange};
pub use crate::pipeline::set_layout::{LayoutBinding, LayoutCache, LayoutDescriptor};
pub use crate::pipeline::shader::{load_spirv_file, ShaderCache, ShaderModule};
pub use crate::pipeline::shader_reflection::{ModuleReflection, ReflectedBinding, ReflectedPushConstants};

pub use crate::resource::buffer::BufferView;
