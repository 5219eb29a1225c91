//! Views into buffers owned by the engine.
//!
//! Buffer creation and memory management live outside of descriptor management. Descriptor writes
//! only need to know which range of which buffer to reference, which is exactly what a [`BufferView`] is.

use ash::vk;

/// View into a specific offset and range of a `VkBuffer`.
/// Care should be taken with the lifetime of this, as there is no checking that the buffer
/// is not destroyed while a descriptor set still references it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferView {
    handle: vk::Buffer,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
}

impl BufferView {
    /// Create a view of `size` bytes starting at `offset`.
    pub fn new(handle: vk::Buffer, offset: impl Into<vk::DeviceSize>, size: impl Into<vk::DeviceSize>) -> Self {
        Self {
            handle,
            offset: offset.into(),
            size: size.into(),
        }
    }

    /// View an entire buffer.
    pub fn whole(handle: vk::Buffer) -> Self {
        Self {
            handle,
            offset: 0,
            size: vk::WHOLE_SIZE,
        }
    }

    /// Get unsafe access to the underlying `VkBuffer`.
    /// # Safety
    /// The buffer is owned elsewhere, destroying it invalidates every descriptor set that references it.
    pub unsafe fn handle(&self) -> vk::Buffer {
        self.handle
    }

    /// Offset of this view into the buffer, in bytes.
    pub fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    /// Size of this view, in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Same range, but starting at offset zero. Used for dynamic descriptors, where the real offset
    /// is supplied when binding.
    pub(crate) fn at_zero_offset(&self) -> Self {
        Self {
            offset: 0,
            ..*self
        }
    }
}
