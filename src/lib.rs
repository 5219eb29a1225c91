//! Descriptor set management for Vulkan renderers
//!
//! This crate takes care of the parts of Vulkan that connect shaders to the resources they read: descriptor pools,
//! descriptor set layouts, pipeline layouts and descriptor sets. Layouts are derived from SPIR-V reflection, deduplicated,
//! and resources are bound by the names used in shader source.
//!
//! To get started, import the prelude
//! ```
//! use descriptors::prelude::*;
//! ```
//!
//! # Example
//!
//! Device creation is left to the engine. Wrap the `ash::Device` it created, and create the long-lived caches.
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let device = Device::new(ash_device);
//! let mut shaders = ShaderCache::new(device.clone());
//! let mut layouts = LayoutCache::new(device.clone());
//! ```
//! Shader stages are combined into an effect, which reflects their bindings into a pipeline layout.
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let mut effect = ShaderEffect::new(device.clone());
//! effect.add_stage(shaders.get_shader("shaders/mesh.vert.spv")?, vk::ShaderStageFlags::VERTEX)?;
//! effect.add_stage(shaders.get_shader("shaders/mesh.frag.spv")?, vk::ShaderStageFlags::FRAGMENT)?;
//! effect.reflect_layout(&mut layouts, &[])?;
//! let effect = std::sync::Arc::new(effect);
//! // Pass `effect.pipeline_layout()?` and `effect.stage_create_infos(..)` to your pipeline builder.
//! ```
//! Every frame, buffers are bound by name and descriptor sets are built from a per-frame allocator.
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let mut allocator = DescriptorAllocator::new(device.clone(), AllocatorBuilder::new().build())?;
//! let mut binder = ShaderDescriptorBinder::new(device.clone());
//!
//! // Wait for the fence of this frame before reclaiming its descriptor sets.
//! allocator.reset_pools()?;
//! binder.set_shader(effect.clone())?;
//! binder.bind_dynamic_buffer("camera", camera_offset, BufferView::whole(camera_buffer))?;
//! binder.bind_buffer("objects", BufferView::whole(object_buffer))?;
//! binder.build_sets(&mut allocator)?;
//! binder.apply_binds(cmd)?;
//! ```
//! For further example code, check out the following modules
//! - [`descriptor`] for descriptor set allocation and binding.
//! - [`pipeline`] for shader loading, reflection and layout derivation.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

pub mod prelude;
pub use crate::prelude::*;

pub mod core;
pub mod descriptor;
pub mod pipeline;
pub mod resource;
pub mod util;
