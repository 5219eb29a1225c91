//! The pipeline module derives pipeline layouts from shaders.
//!
//! Shader modules are loaded through a [`ShaderCache`](crate::ShaderCache), combined into a
//! [`ShaderEffect`](crate::ShaderEffect), and reflected. Reflection merges the bindings of all stages into at most
//! [`MAX_DESCRIPTOR_SETS`](crate::pipeline::effect::MAX_DESCRIPTOR_SETS) set layouts, deduplicated through a
//! [`LayoutCache`](crate::LayoutCache), and builds the pipeline layout.
//!
//! # Example
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let mut shaders = ShaderCache::new(device.clone());
//! let mut layouts = LayoutCache::new(device.clone());
//!
//! let mut effect = ShaderEffect::new(device.clone());
//! effect.add_stage(shaders.get_shader("shaders/cull.comp.spv")?, vk::ShaderStageFlags::COMPUTE)?;
//! effect.reflect_layout(&mut layouts, &[])?;
//!
//! let entry = std::ffi::CString::new("main")?;
//! let stage = effect.stage_create_infos(&entry)[0];
//! let info = vk::ComputePipelineCreateInfo::builder()
//!     .stage(stage)
//!     .layout(effect.pipeline_layout()?)
//!     .build();
//! ```

pub mod effect;
pub mod pipeline_layout;
pub mod set_layout;
pub mod shader;
pub mod shader_reflection;
