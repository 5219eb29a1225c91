use ash::vk;

use crate::BufferView;

/// A single buffer descriptor to write into a descriptor set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorBufferWrite {
    /// Binding index inside the set.
    pub binding: u32,
    /// Descriptor type of the binding.
    pub ty: vk::DescriptorType,
    /// Buffer range to reference.
    pub buffer: BufferView,
}

impl DescriptorBufferWrite {
    /// The `VkDescriptorBufferInfo` for this write.
    pub fn buffer_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: unsafe { self.buffer.handle() },
            offset: self.buffer.offset(),
            range: self.buffer.size(),
        }
    }
}

/// Whether a descriptor type takes a dynamic offset at bind time.
pub fn is_dynamic(ty: vk::DescriptorType) -> bool {
    ty == vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC || ty == vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
}
