//! Descriptor pool sizing. Pools are created and recycled by the [`DescriptorAllocator`](crate::DescriptorAllocator),
//! so you never create one manually.

use std::fmt::{Display, Formatter};

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;

/// Defines how many descriptors of each type a pool holds, relative to the number of sets it can serve.
/// A pool for `n` sets gets `ratio * n` descriptors of every listed type.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorPoolSizes(Vec<(vk::DescriptorType, f32)>);

impl DescriptorPoolSizes {
    /// Create a new ratio table from `(type, descriptors per set)` pairs.
    pub fn new(sizes: impl Into<Vec<(vk::DescriptorType, f32)>>) -> Self {
        Self(sizes.into())
    }

    /// The `(type, descriptors per set)` pairs in this table.
    pub fn ratios(&self) -> &[(vk::DescriptorType, f32)] {
        self.0.as_slice()
    }

    /// Absolute pool sizes for a pool serving `set_count` sets. Every listed type gets room for at least one descriptor.
    pub fn pool_sizes(&self, set_count: u32) -> Vec<vk::DescriptorPoolSize> {
        self.0
            .iter()
            .map(|(ty, ratio)| vk::DescriptorPoolSize {
                ty: *ty,
                descriptor_count: ((ratio * set_count as f32) as u32).max(1),
            })
            .collect()
    }
}

impl Default for DescriptorPoolSizes {
    fn default() -> Self {
        Self(vec![
            (vk::DescriptorType::SAMPLER, 0.5),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4.0),
            (vk::DescriptorType::SAMPLED_IMAGE, 4.0),
            (vk::DescriptorType::STORAGE_IMAGE, 1.0),
            (vk::DescriptorType::UNIFORM_TEXEL_BUFFER, 1.0),
            (vk::DescriptorType::STORAGE_TEXEL_BUFFER, 1.0),
            (vk::DescriptorType::UNIFORM_BUFFER, 2.0),
            (vk::DescriptorType::STORAGE_BUFFER, 2.0),
            (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1.0),
            (vk::DescriptorType::STORAGE_BUFFER_DYNAMIC, 1.0),
            (vk::DescriptorType::INPUT_ATTACHMENT, 0.5),
        ])
    }
}

impl Display for DescriptorPoolSizes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut result = writeln!(f, "DescriptorPoolSizes (");
        for (ty, ratio) in &self.0 {
            result = result.and_then(|_| writeln!(f, "{ty:?} => {ratio} per set"))
        }
        result.and_then(|_| write!(f, ")"))
    }
}

/// Create a pool serving `set_count` sets, sized by `sizes`.
pub(super) fn create_pool<B: Backend>(
    backend: &B,
    sizes: &DescriptorPoolSizes,
    set_count: u32,
    flags: vk::DescriptorPoolCreateFlags,
) -> Result<vk::DescriptorPool> {
    let pool_sizes = sizes.pool_sizes(set_count);
    backend.create_descriptor_pool(pool_sizes.as_slice(), set_count, flags)
}
