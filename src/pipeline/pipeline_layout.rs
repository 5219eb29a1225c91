//! Wrapper structs around `VkPipelineLayout` objects.

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::Device;

/// A fully built Vulkan pipeline layout, owned by the [`ShaderEffect`](crate::ShaderEffect) it was reflected for.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PipelineLayout<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    handle: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constants: Vec<PushConstantRange>,
}

/// The part of the push constant block a shader stage reads.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    /// Stage reading this range.
    pub stage_flags: vk::ShaderStageFlags,
    /// First byte used by the stage.
    pub offset: u32,
    /// Number of bytes used, starting at `offset`.
    pub size: u32,
}

impl<B: Backend> PipelineLayout<B> {
    /// Create a pipeline layout from set layouts, in set order, and push constant ranges.
    pub fn new(backend: B, set_layouts: Vec<vk::DescriptorSetLayout>, push_constants: Vec<PushConstantRange>) -> Result<Self> {
        let handle = backend.create_pipeline_layout(set_layouts.as_slice(), push_constants.as_slice())?;
        Ok(Self {
            backend,
            handle,
            set_layouts,
            push_constants,
        })
    }

    /// Get unsafe access to the internal `VkPipelineLayout`.
    /// # Safety
    /// The layout is destroyed when this is dropped. Pipelines created with it must not outlive it.
    pub unsafe fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Get the descriptor set layouts of this pipeline layout.
    pub fn set_layouts(&self) -> &[vk::DescriptorSetLayout] {
        self.set_layouts.as_slice()
    }

    /// Get the push constant ranges of this pipeline layout.
    pub fn push_constants(&self) -> &[PushConstantRange] {
        self.push_constants.as_slice()
    }
}

impl<B: Backend> Drop for PipelineLayout<B> {
    fn drop(&mut self) {
        self.backend.destroy_pipeline_layout(self.handle);
    }
}

impl PushConstantRange {
    pub fn to_vk(&self) -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: self.stage_flags,
            offset: self.offset,
            size: self.size,
        }
    }
}
