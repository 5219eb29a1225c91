//! This module handles allocating, writing and binding descriptor sets.
//!
//! Descriptor sets are allocated from a [`DescriptorAllocator`](crate::DescriptorAllocator), which grabs fresh pools
//! whenever the current one runs out, and reclaims everything at once with
//! [`reset_pools`](crate::DescriptorAllocator::reset_pools). Use one allocator per frame in flight.
//!
//! Instead of writing sets by hand, a [`ShaderDescriptorBinder`](crate::ShaderDescriptorBinder) resolves bindings by the
//! names used in shader source, using the reflection information of a [`ShaderEffect`](crate::ShaderEffect).
//!
//! # Example
//!
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let settings = AllocatorBuilder::new()
//!     .sets_per_pool(500)
//!     .pool_sizes(DescriptorPoolSizes::new(vec![
//!         (vk::DescriptorType::UNIFORM_BUFFER, 2.0),
//!         (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1.0),
//!     ]))
//!     .build();
//! let mut allocators = (0..frames_in_flight)
//!     .map(|_| DescriptorAllocator::new(device.clone(), settings.clone()))
//!     .collect::<anyhow::Result<Vec<_>>>()?;
//!
//! let mut binder = ShaderDescriptorBinder::new(device.clone());
//! binder.set_shader(effect)?;
//! binder.bind_buffer("scene", BufferView::whole(scene_buffer))?;
//! binder.build_sets(&mut allocators[frame])?;
//! binder.apply_binds(cmd)?;
//! ```

pub mod allocator;
pub mod binder;
pub mod descriptor_pool;
pub mod descriptor_set;
pub mod settings;
