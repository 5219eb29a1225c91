//! Binds resources to descriptor sets by the names used in shaders.
//!
//! # Example
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let mut binder = ShaderDescriptorBinder::new(device.clone());
//! binder.set_shader(effect.clone())?;
//! binder.bind_dynamic_buffer("camera", frame_index * camera_stride, BufferView::new(camera_buffer, 0u64, camera_size))?;
//! // Not every shader variant samples shadows, binding it anyway is fine.
//! binder.bind_buffer("shadow_params", BufferView::whole(shadow_buffer))?;
//! binder.build_sets(&mut frame_allocator)?;
//! binder.apply_binds(cmd)?;
//! ```

use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::descriptor::allocator::{AllocatorEpoch, DescriptorAllocator};
use crate::descriptor::descriptor_set::{is_dynamic, DescriptorBufferWrite};
use crate::pipeline::effect::{ShaderEffect, MAX_DESCRIPTOR_SETS};
use crate::{BufferView, Device, Error};

/// A buffer write waiting to be applied to a descriptor set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub set: u32,
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub buffer: BufferView,
    /// Offset passed at bind time. Only present for dynamic descriptor types.
    pub dynamic_offset: Option<u32>,
}

/// Resolves named buffer bindings against a [`ShaderEffect`], builds descriptor sets for them and records the
/// bind commands.
///
/// Built sets are cached per set index and only rebuilt when one of their writes changes, the effect changes
/// or the allocator they came from was reset.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ShaderDescriptorBinder<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    #[derivative(Debug = "ignore")]
    effect: Option<Arc<ShaderEffect<B>>>,
    writes: Vec<PendingWrite>,
    cached: [Option<vk::DescriptorSet>; MAX_DESCRIPTOR_SETS],
    offsets: [Vec<u32>; MAX_DESCRIPTOR_SETS],
    epoch: Option<AllocatorEpoch>,
}

impl<B: Backend> ShaderDescriptorBinder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            effect: None,
            writes: Vec::new(),
            cached: [None; MAX_DESCRIPTOR_SETS],
            offsets: Default::default(),
            epoch: None,
        }
    }

    fn invalidate(&mut self) {
        self.cached = [None; MAX_DESCRIPTOR_SETS];
    }

    /// Target a shader effect. Cached sets are always invalidated. Switching to a different effect
    /// also drops all queued writes, since they were resolved against the old effect's bindings.
    /// # Errors
    /// - Fails with [`Error::EffectNotReflected`] if the effect's layout was not reflected yet.
    pub fn set_shader(&mut self, effect: Arc<ShaderEffect<B>>) -> Result<()> {
        if !effect.is_reflected() {
            return Err(Error::EffectNotReflected.into());
        }
        let same = self.effect.as_ref().map_or(false, |current| Arc::ptr_eq(current, &effect));
        if !same {
            self.writes.clear();
            self.offsets.iter_mut().for_each(Vec::clear);
        }
        self.invalidate();
        self.effect = Some(effect);
        Ok(())
    }

    /// Bind a buffer to the descriptor called `name`. Names the active effect does not use are ignored.
    /// # Errors
    /// - Fails with [`Error::NoShaderEffect`] if no effect was set.
    pub fn bind_buffer(&mut self, name: &str, buffer: BufferView) -> Result<()> {
        self.bind(name, buffer, None)
    }

    /// Bind a buffer to the dynamic descriptor called `name`, using `offset` as its dynamic offset.
    /// Names the active effect does not use are ignored.
    /// # Errors
    /// - Fails with [`Error::NoShaderEffect`] if no effect was set.
    pub fn bind_dynamic_buffer(&mut self, name: &str, offset: u32, buffer: BufferView) -> Result<()> {
        self.bind(name, buffer, Some(offset))
    }

    fn bind(&mut self, name: &str, buffer: BufferView, offset: Option<u32>) -> Result<()> {
        let effect = self.effect.as_ref().ok_or(Error::NoShaderEffect)?;
        let Some(binding) = effect.binding(name).copied() else { return Ok(()); };

        let dynamic_offset = match (is_dynamic(binding.ty), offset) {
            (true, Some(offset)) => Some(offset),
            (true, None) => {
                warn!("Descriptor `{name}` is {:?} but was bound without a dynamic offset, using 0", binding.ty);
                Some(0)
            }
            (false, Some(_)) => {
                warn!("Descriptor `{name}` is {:?} and does not take a dynamic offset, ignoring it", binding.ty);
                None
            }
            (false, None) => None,
        };

        let existing = self
            .writes
            .iter_mut()
            .find(|write| write.set == binding.set && write.binding == binding.binding);
        match existing {
            Some(write) if write.buffer == buffer => {
                // Dynamic offsets are supplied at bind time, the set itself stays valid.
                write.dynamic_offset = dynamic_offset;
            }
            Some(write) => {
                write.ty = binding.ty;
                write.buffer = buffer;
                write.dynamic_offset = dynamic_offset;
                self.cached[binding.set as usize] = None;
            }
            None => {
                self.writes.push(PendingWrite {
                    set: binding.set,
                    binding: binding.binding,
                    ty: binding.ty,
                    buffer,
                    dynamic_offset,
                });
                self.cached[binding.set as usize] = None;
            }
        }
        Ok(())
    }

    /// Allocate and write descriptor sets for every set index with queued writes. Sets that did not change since
    /// the last call are reused, unless `allocator` was reset in the meantime.
    /// # Errors
    /// - Fails with [`Error::NoShaderEffect`] if no effect was set.
    /// - Fails if allocating a set fails.
    pub fn build_sets(&mut self, allocator: &mut DescriptorAllocator<B>) -> Result<()> {
        let effect = self.effect.clone().ok_or(Error::NoShaderEffect)?;

        let epoch = allocator.epoch();
        if self.epoch != Some(epoch) {
            self.invalidate();
            self.epoch = Some(epoch);
        }

        self.writes.sort_by_key(|write| (write.set, write.binding));
        self.offsets.iter_mut().for_each(Vec::clear);

        let mut per_set: [Vec<DescriptorBufferWrite>; MAX_DESCRIPTOR_SETS] = Default::default();
        for write in &self.writes {
            let set = write.set as usize;
            if effect.set_layout(set) == vk::DescriptorSetLayout::null() {
                warn!("Skipping write to set {} binding {}, the shader effect has no layout for this set", write.set, write.binding);
                continue;
            }
            if let Some(offset) = write.dynamic_offset {
                self.offsets[set].push(offset);
            }
            let buffer = if is_dynamic(write.ty) {
                write.buffer.at_zero_offset()
            } else {
                write.buffer
            };
            per_set[set].push(DescriptorBufferWrite {
                binding: write.binding,
                ty: write.ty,
                buffer,
            });
        }

        for (index, writes) in per_set.iter().enumerate() {
            if writes.is_empty() || self.cached[index].is_some() {
                continue;
            }
            let set = allocator.allocate(effect.set_layout(index))?;
            self.backend.write_buffer_descriptors(set, writes.as_slice());
            self.cached[index] = Some(set);
        }
        Ok(())
    }

    /// Record one bind command per built set, along with its dynamic offsets in binding order.
    /// # Errors
    /// - Fails with [`Error::NoShaderEffect`] if no effect was set.
    pub fn apply_binds(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let effect = self.effect.as_ref().ok_or(Error::NoShaderEffect)?;
        let layout = effect.pipeline_layout()?;
        let bind_point = effect.bind_point();
        let set_layouts = effect.set_layouts();
        for (index, set) in self.cached.iter().enumerate() {
            let Some(set) = set else { continue; };
            // Unused sets are compacted out of the pipeline layout, so the layout index can be lower than the set index.
            let first_set = set_layouts
                .iter()
                .take(index)
                .filter(|layout| **layout != vk::DescriptorSetLayout::null())
                .count() as u32;
            self.backend
                .cmd_bind_descriptor_sets(cmd, bind_point, layout, first_set, &[*set], self.offsets[index].as_slice());
        }
        Ok(())
    }

    /// The built descriptor set for set index `set`, if any.
    pub fn descriptor_set(&self, set: usize) -> Option<vk::DescriptorSet> {
        self.cached.get(set).copied().flatten()
    }

    /// Dynamic offsets of set index `set`, ordered by binding. Updated by [`build_sets`](Self::build_sets).
    pub fn dynamic_offsets(&self, set: usize) -> &[u32] {
        self.offsets.get(set).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_writes(&self) -> &[PendingWrite] {
        self.writes.as_slice()
    }

    /// The active shader effect.
    pub fn effect(&self) -> Option<&Arc<ShaderEffect<B>>> {
        self.effect.as_ref()
    }
}
