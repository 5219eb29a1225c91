//! Defines traits for core

use anyhow::Result;
use ash::vk;

use crate::descriptor::descriptor_set::DescriptorBufferWrite;
use crate::pipeline::pipeline_layout::PushConstantRange;
use crate::pipeline::set_layout::LayoutBinding;
use crate::pipeline::shader_reflection::ModuleReflection;

/// The set of graphics backend operations descriptor management is built on.
///
/// [`Device`](crate::Device) implements this on top of `ash`. All objects handed out by a backend are
/// plain Vulkan handles, ownership is tracked by the structures that created them.
/// Implementations are expected to be cheap to clone, since every owning structure keeps a copy
/// to destroy its objects on drop.
pub trait Backend: Clone {
    /// Create a descriptor pool able to serve `max_sets` sets with the given per-type capacity.
    fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> Result<vk::DescriptorPool>;
    /// Destroy a descriptor pool, implicitly freeing all sets allocated from it.
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// Allocate a single descriptor set. The raw result is returned so callers can tell
    /// pool exhaustion apart from fatal errors.
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> std::result::Result<vk::DescriptorSet, vk::Result>;
    /// Reset a pool, reclaiming every set allocated from it.
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()>;

    fn create_descriptor_set_layout(&self, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constants: &[PushConstantRange],
    ) -> Result<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Reflect compiled SPIR-V, recovering its stage, descriptor bindings and push constant block.
    /// # Errors
    /// Fails if the bytecode cannot be parsed.
    fn reflect_module(&self, code: &[u32]) -> Result<ModuleReflection>;

    /// Write buffer descriptors into an allocated set.
    fn write_buffer_descriptors(&self, set: vk::DescriptorSet, writes: &[DescriptorBufferWrite]);

    /// Record a `vkCmdBindDescriptorSets` command.
    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );
}
