//! Exposes the settings used to configure a [`DescriptorAllocator`](crate::DescriptorAllocator).

use ash::vk;

use crate::descriptor::descriptor_pool::DescriptorPoolSizes;

/// Number of descriptor sets a freshly created pool can serve, unless configured otherwise.
pub const DEFAULT_SETS_PER_POOL: u32 = 1000;

/// Configuration of a [`DescriptorAllocator`](crate::DescriptorAllocator).
/// Use [`AllocatorBuilder`] to construct this.
#[derive(Debug, Clone)]
pub struct AllocatorSettings {
    /// Descriptor type ratios used for every new pool.
    pub pool_sizes: DescriptorPoolSizes,
    /// Maximum number of sets a single pool can serve.
    pub sets_per_pool: u32,
    /// Creation flags for new pools. Sets are only ever reclaimed by resetting the whole pool, so
    /// `FREE_DESCRIPTOR_SET` is never needed.
    pub pool_flags: vk::DescriptorPoolCreateFlags,
    /// How many fresh pools to try after an allocation failed with pool exhaustion or fragmentation,
    /// before giving up. Must be at least one.
    pub max_grow_retries: u32,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            pool_sizes: DescriptorPoolSizes::default(),
            sets_per_pool: DEFAULT_SETS_PER_POOL,
            pool_flags: vk::DescriptorPoolCreateFlags::empty(),
            max_grow_retries: 1,
        }
    }
}

/// The allocator builder is a convenience struct to easily create [`AllocatorSettings`].
///
/// For information about each of the fields, see [`AllocatorSettings`].
/// # Example
/// ```ignore
/// # use descriptors::*;
/// let settings = AllocatorBuilder::new()
///     .sets_per_pool(256)
///     .pool_sizes(DescriptorPoolSizes::new([
///         (vk::DescriptorType::UNIFORM_BUFFER, 2.0),
///         (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4.0),
///     ]))
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct AllocatorBuilder {
    inner: AllocatorSettings,
}

impl AllocatorBuilder {
    /// Create a new allocator builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the descriptor type ratio table.
    pub fn pool_sizes(mut self, sizes: DescriptorPoolSizes) -> Self {
        self.inner.pool_sizes = sizes;
        self
    }

    /// Sets the number of descriptor sets each pool can serve.
    pub fn sets_per_pool(mut self, count: u32) -> Self {
        self.inner.sets_per_pool = count;
        self
    }

    /// Sets the pool creation flags.
    pub fn pool_flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.inner.pool_flags = flags;
        self
    }

    /// Sets how many fresh pools are tried before an allocation is reported as failed.
    pub fn max_grow_retries(mut self, retries: u32) -> Self {
        self.inner.max_grow_retries = retries;
        self
    }

    /// Build the resulting allocator settings.
    pub fn build(self) -> AllocatorSettings {
        self.inner
    }
}
