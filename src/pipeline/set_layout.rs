//! Deduplicated descriptor set layouts.
//!
//! Many shaders share the same set shapes (a per-frame uniform buffer in set 0 is the classic example).
//! The [`LayoutCache`] makes sure every distinct shape results in exactly one `VkDescriptorSetLayout`,
//! no matter how many effects or call sites request it, or in which order they list the bindings.

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::util::cache::{Cache, Resource};
use crate::Device;

/// A single binding slot in a descriptor set layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    /// Binding index inside the set.
    pub binding: u32,
    /// Type of descriptor at this binding.
    pub ty: vk::DescriptorType,
    /// Number of descriptors in this binding (array length).
    pub count: u32,
    /// Shader stages that can access this binding.
    pub stages: vk::ShaderStageFlags,
}

impl LayoutBinding {
    pub fn new(binding: u32, ty: vk::DescriptorType, count: u32, stages: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            ty,
            count,
            stages,
        }
    }

    pub fn to_vk(&self) -> vk::DescriptorSetLayoutBinding {
        vk::DescriptorSetLayoutBinding::builder()
            .binding(self.binding)
            .descriptor_type(self.ty)
            .descriptor_count(self.count)
            .stage_flags(self.stages)
            .build()
    }
}

/// Canonical description of a descriptor set layout. Bindings are always sorted by binding index,
/// so two descriptors built from the same bindings in a different order compare and hash equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LayoutDescriptor {
    bindings: Vec<LayoutBinding>,
}

impl LayoutDescriptor {
    /// Canonicalize a list of bindings.
    pub fn new(bindings: impl Into<Vec<LayoutBinding>>) -> Self {
        let mut bindings = bindings.into();
        // Most callers already pass sorted bindings, only sort when needed.
        let sorted = bindings.windows(2).all(|pair| pair[0].binding < pair[1].binding);
        if !sorted {
            bindings.sort_by_key(|binding| binding.binding);
        }
        Self {
            bindings,
        }
    }

    /// The bindings in this layout, sorted by binding index.
    pub fn bindings(&self) -> &[LayoutBinding] {
        self.bindings.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A fully built Vulkan descriptor set layout. This is a managed resource, owned by the [`LayoutCache`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorSetLayout<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    handle: vk::DescriptorSetLayout,
}

impl<B: Backend> DescriptorSetLayout<B> {
    /// Get unsafe access to the underlying `VkDescriptorSetLayout`.
    /// # Safety
    /// The layout is owned by the cache and must not be destroyed manually.
    pub unsafe fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl<B: Backend> Resource<B> for DescriptorSetLayout<B> {
    type Key = LayoutDescriptor;
    type ExtraParams<'a> = ();

    fn create(backend: B, key: &Self::Key, _: Self::ExtraParams<'_>) -> Result<Self> {
        let handle = backend.create_descriptor_set_layout(key.bindings())?;
        Ok(Self {
            backend,
            handle,
        })
    }
}

impl<B: Backend> Drop for DescriptorSetLayout<B> {
    fn drop(&mut self) {
        self.backend.destroy_descriptor_set_layout(self.handle);
    }
}

/// Deduplicating cache of descriptor set layouts. Create one per device and pass it to everything
/// that needs set layouts. Dropping the cache destroys every layout it created.
///
/// # Example
/// ```ignore
/// # use descriptors::*;
/// let mut cache = LayoutCache::new(device.clone());
/// let a = cache.get_or_create(&[
///     LayoutBinding::new(0, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::VERTEX),
///     LayoutBinding::new(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT),
/// ])?;
/// let b = cache.get_or_create(&[
///     LayoutBinding::new(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT),
///     LayoutBinding::new(0, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::VERTEX),
/// ])?;
/// assert_eq!(a, b);
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct LayoutCache<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    layouts: Cache<B, DescriptorSetLayout<B>>,
}

impl<B: Backend> LayoutCache<B> {
    /// Create a new, empty layout cache.
    pub fn new(backend: B) -> Self {
        Self {
            layouts: Cache::new(backend),
        }
    }

    /// Get the layout for a set of bindings, creating it if this shape was never requested before.
    /// The order of `bindings` does not matter.
    /// # Errors
    /// - Fails if the backend could not create the layout.
    pub fn get_or_create(&mut self, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        self.get_or_create_descriptor(&LayoutDescriptor::new(bindings))
    }

    /// Get the layout for an already canonical layout descriptor.
    pub fn get_or_create_descriptor(&mut self, descriptor: &LayoutDescriptor) -> Result<vk::DescriptorSetLayout> {
        let layout = self.layouts.get_or_create(descriptor, ())?;
        Ok(unsafe { layout.handle() })
    }

    /// Number of distinct layouts created so far.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
